//! TLS Relay Command Line Tool
//!
//! This binary is the command-line interface for TLS Relay.

use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use tls_relay::common::{init_logger, Result};
use tls_relay::config::{self, ConfigBuilder, ConfigValues, TlsVerifyMode, ENV_PREFIX};
use tls_relay::{Proxy, APP_NAME, VERSION};

/// TLS Relay: plaintext in, TLS to a fixed upstream out
#[derive(Parser, Debug)]
#[command(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long)]
    listen: Option<String>,

    /// Upstream address every connection is relayed to (host:port)
    #[arg(short, long)]
    upstream: Option<String>,

    /// Upstream certificate verification (strict, insecure)
    #[arg(long)]
    tls_verify: Option<TlsVerifyMode>,

    /// Additional PEM file of trusted CA certificates
    #[arg(long)]
    ca_file: Option<PathBuf>,

    /// TLS server name for SNI and certificate checks (defaults to the upstream host)
    #[arg(long)]
    server_name: Option<String>,

    /// Relay buffer size in bytes
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Upstream dial and handshake timeout in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Seconds the remaining direction may stay idle after the other reached end-of-stream
    #[arg(long)]
    drain_timeout: Option<u64>,

    /// Seconds to wait for active sessions on shutdown
    #[arg(long)]
    shutdown_timeout: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// JSON configuration file
    #[arg(long, env = "TLS_RELAY_CONFIG_FILE")]
    config_file: Option<PathBuf>,
}

impl Args {
    fn into_values(self) -> ConfigValues {
        ConfigValues {
            listen: self.listen,
            upstream: self.upstream,
            tls_verify: self.tls_verify,
            ca_file: self.ca_file,
            server_name: self.server_name,
            buffer_size: self.buffer_size,
            connect_timeout: self.connect_timeout,
            drain_timeout: self.drain_timeout,
            shutdown_timeout: self.shutdown_timeout,
            log_level: self.log_level,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The logger may not be up yet if configuration failed
            init_logger("error");
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    // Priority: defaults < file < environment < command line
    let mut builder = ConfigBuilder::new();
    if let Some(ref path) = args.config_file {
        builder = builder.with_file(path);
    }
    let config = builder
        .with_env(ENV_PREFIX)
        .with_values(args.into_values())
        .build()?;

    init_logger(&config.log_level);
    info!("Starting {} v{}", APP_NAME, VERSION);
    config::log_config(&config);

    let proxy = Proxy::bind(&config).await?;

    info!("Relay ready, press Ctrl+C to stop");
    proxy.run_until(shutdown_signal()).await
}

/// Resolves on SIGINT, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
