use dotenv::dotenv;
use std::net::SocketAddr;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use neon_pay_backend::config::AppConfig;
use neon_pay_backend::{app, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if available
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    let state = AppState::from_config(&config).await?;

    let recorded = state.ledger.records().await.map(|r| r.len()).unwrap_or(0);
    tracing::info!(
        path = %state.ledger.path().display(),
        records = recorded,
        "[LEDGER] 📒 Ledger ready"
    );
    tracing::info!(
        bkash = ?config.bkash,
        "💳 bKash API: {}",
        if config.bkash.is_configured() { "Configured" } else { "Not configured" }
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("🚀 Neon Pay server listening on {}", addr);
    tracing::info!("   - bKash API:    http://{}/api/bkash/{{token,create,execute}}", addr);
    tracing::info!("   - Ledger:       http://{}/api/payment/record", addr);
    tracing::info!("   - Health Check: http://{}/api/health", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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

    tracing::info!("shutdown signal received, draining connections");
}
