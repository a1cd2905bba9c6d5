use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use dual_listener::config::load_or_default;
use dual_listener::lifecycle::{OsSignals, Service};
use dual_listener::net::TlsCredentials;
use dual_listener::observability::{init_logging, metrics};

#[derive(Parser)]
#[command(name = "dual-listener")]
#[command(about = "HTTP and TLS line listeners under one run group", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults are used when omitted).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level / filter.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("dual-listener: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("dual-listener: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dual-listener starting");

    if config.observability.metrics_enabled {
        // Validation already checked the address.
        if let Ok(addr) = config.observability.metrics_address.parse::<SocketAddr>() {
            metrics::init_metrics(addr);
        }
    }

    let credentials = match TlsCredentials::load(
        Path::new(&config.secure.cert_path),
        Path::new(&config.secure.key_path),
    )
    .await
    {
        Ok(credentials) => credentials,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load TLS credentials");
            return ExitCode::FAILURE;
        }
    };

    let signals = match OsSignals::subscribe() {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install signal handlers");
            return ExitCode::FAILURE;
        }
    };

    let service = match Service::assemble(&config, &credentials, signals, None).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    match service.run().await {
        Ok(()) => {
            tracing::info!(exit = "clean", "Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) if e.is_signal() => {
            tracing::info!(exit = %e, "Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(exit = %e, "Shutdown complete");
            ExitCode::FAILURE
        }
    }
}
