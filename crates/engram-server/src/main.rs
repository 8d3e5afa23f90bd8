//! engram-server - REST API server binary.

use std::net::SocketAddr;

use engram_core::EngineConfig;
use engram_server::{create_engine, create_server, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn load_config() -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match std::env::var("ENGRAM_CONFIG") {
        Ok(path) => {
            let mut config = EngineConfig::from_file(&path)?;
            config.apply_env(|key| std::env::var(key).ok());
            config.validate()?;
            info!("Loaded configuration from {}", path);
            Ok(config)
        }
        Err(_) => Ok(EngineConfig::from_env()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,engram_server=debug"))?;
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = load_config()?;

    let host = std::env::var("ENGRAM_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("ENGRAM_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .map_err(|e| format!("ENGRAM_PORT must be a valid port number: {}", e))?;

    let engine = create_engine(config).await?;
    let app = create_server(AppState::new(engine.clone()));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting engram-server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Shutdown signal received, stopping activation worker...");
        })
        .await?;

    engine.shutdown().await?;

    info!("Server stopped cleanly");
    Ok(())
}
