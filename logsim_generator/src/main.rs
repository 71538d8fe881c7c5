use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use logsim_generator::config::GeneratorConfig;
use logsim_generator::controller::TaskController;
use logsim_generator::handlers::{self, AppState};
use logsim_generator::shipper::Shipper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(GeneratorConfig::load()?);
    let shipper = Arc::new(Shipper::new(config.parser_api.clone())?);
    let controller = Arc::new(TaskController::new(shipper));

    let app = handlers::create_router(AppState {
        config: config.clone(),
        controller,
    });

    let addr = format!("0.0.0.0:{}", config.port);
    info!("starting log generator server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
