//! ingress-guard binary.
//!
//! Startup order: tracing, configuration, metrics exporter, listener,
//! shutdown wiring, serve.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ingress_guard::config::{load_config, GuardConfig};
use ingress_guard::{GuardServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "ingress-guard", about = "Admission-control guard for telemetry ingestion")]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "ingress_guard={}",
                    config.observability.log_level
                ))
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("ingress-guard v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        admission_enabled = config.admission.enabled,
        cleanup_interval_secs = config.admission.cleanup_interval_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => ingress_guard::observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = std::sync::Arc::new(Shutdown::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_shutdown.trigger();
        }
    });

    let server = GuardServer::new(config);
    server.run(listener, &shutdown).await?;

    shutdown.trigger();
    tracing::info!("Shutdown complete");
    Ok(())
}
