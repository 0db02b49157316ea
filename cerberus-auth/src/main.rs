use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cerberus_auth::grpc::server;
use cerberus_auth::{CheckMetrics, Checker, Config, StaticChecker};

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23 requires selecting a CryptoProvider at runtime
    if let Err(err) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("Failed to install rustls crypto provider: {:?}", err);
        return Err(anyhow!("Unable to install TLS crypto provider: {:?}", err));
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cerberus_auth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cerberus auth adapter");

    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;

    info!(
        "Configuration loaded: gRPC port = {}, TLS = {}",
        config.server.grpc_port,
        config.tls.cert_path.is_some()
    );

    let metrics = Arc::new(
        CheckMetrics::register(prometheus::default_registry())
            .context("Failed to register check metrics")?,
    );

    // Placeholder decision engine; the embedding system swaps in its own
    // Checker implementation here.
    let checker: Arc<dyn Checker> = Arc::new(StaticChecker::new(&config.static_checker_reason));

    server::serve(&config, checker, metrics, shutdown_signal())
        .await
        .context("auth server terminated with error")?;

    info!("Cerberus auth adapter stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
