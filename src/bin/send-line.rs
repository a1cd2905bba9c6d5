use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

#[derive(Parser)]
#[command(name = "send-line")]
#[command(about = "Send one line to the dual-listener TLS port", long_about = None)]
struct Cli {
    /// Address of the secure listener.
    #[arg(short, long, default_value = "127.0.0.1:10443")]
    address: String,

    /// PEM file with the certificate(s) to trust.
    #[arg(long, default_value = "certs/server.crt")]
    ca: PathBuf,

    /// Name to verify the server certificate against.
    #[arg(long, default_value = "localhost")]
    server_name: String,

    /// The line to send.
    message: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut roots = RootCertStore::empty();
    let mut reader = BufReader::new(File::open(&cli.ca)?);
    for cert in rustls_pemfile::certs(&mut reader) {
        roots.add(cert?)?;
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let server_name = ServerName::try_from(cli.server_name)?;
    let stream = TcpStream::connect(&cli.address).await?;
    let mut tls = connector.connect(server_name, stream).await?;

    tls.write_all(cli.message.as_bytes()).await?;
    tls.write_all(b"\n").await?;
    tls.shutdown().await?;

    println!("sent {} bytes to {}", cli.message.len() + 1, cli.address);
    Ok(())
}
