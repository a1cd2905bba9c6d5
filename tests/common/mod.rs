//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dual_listener::config::ServiceConfig;
use dual_listener::net::TlsCredentials;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Config with ephemeral ports and the fixture credentials.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.http.bind_address = "127.0.0.1:0".into();
    config.secure.bind_address = "127.0.0.1:0".into();
    config.secure.cert_path = fixture("server.crt").display().to_string();
    config.secure.key_path = fixture("server.key").display().to_string();
    config.http.shutdown_grace_secs = 1;
    config.secure.read_timeout_secs = 2;
    config
}

pub async fn credentials() -> TlsCredentials {
    TlsCredentials::load(&fixture("server.crt"), &fixture("server.key"))
        .await
        .unwrap()
}

/// Connector trusting the self-signed fixture certificate.
pub fn connector() -> TlsConnector {
    let pem = std::fs::read(fixture("server.crt")).unwrap();
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
        roots.add(cert.unwrap()).unwrap();
    }
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

pub async fn connect_tls(addr: SocketAddr) -> TlsStream<TcpStream> {
    let stream = TcpStream::connect(addr).await.unwrap();
    let name = ServerName::try_from("localhost").unwrap();
    connector().connect(name, stream).await.unwrap()
}

/// Send `line` and wait for the server to close the connection.
/// Returns whatever the server wrote back (normally nothing).
pub async fn send_line(addr: SocketAddr, line: &str) -> Vec<u8> {
    let mut tls = connect_tls(addr).await;
    tls.write_all(line.as_bytes()).await.unwrap();
    tls.write_all(b"\n").await.unwrap();
    tls.flush().await.unwrap();

    let mut rest = Vec::new();
    // The server closes right after reading the line.
    let _ = tls.read_to_end(&mut rest).await;
    rest
}
