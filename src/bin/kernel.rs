use aegis_core::{gateway, init_platform, PlatformConfig};
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Aegis assistant-orchestrator kernel", long_about = None)]
struct Args {
    /// Path to the bootstrap TOML configuration
    #[arg(short, long, default_value = "aegis.toml")]
    config: PathBuf,

    /// Address the gateway surface listens on
    #[arg(short, long, default_value = "127.0.0.1:8700")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Aegis Kernel");

    let config = match tokio::fs::read_to_string(&args.config).await {
        Ok(raw) => toml::from_str::<PlatformConfig>(&raw)?,
        Err(e) => {
            warn!(config = %args.config.display(), error = %e, "config not readable, using defaults");
            PlatformConfig::default()
        }
    };

    let platform = Arc::new(init_platform(config).await?);
    platform.start().await;

    let app = gateway::router(Arc::clone(&platform));
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!(listen = %args.listen, "gateway surface listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    platform.stop().await;
    info!("Aegis Kernel stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}
