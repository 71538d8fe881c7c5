use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use logsim_parser::config::ParserConfig;
use logsim_parser::database::Database;
use logsim_parser::handlers::{self, AppState};
use logsim_parser::ml::service::MlService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(ParserConfig::load()?);

    // an unreachable store at boot is fatal
    let db = Database::connect(&config)
        .await
        .map_err(|e| anyhow::anyhow!("store unreachable at boot: {}", e))?;
    db.ensure_schema(&config.logs)
        .await
        .map_err(|e| anyhow::anyhow!("schema bootstrap failed: {}", e))?;

    let ml = Arc::new(MlService::new(db.clone(), config.logs.table_name.clone()));
    let app = handlers::create_router(AppState {
        config: config.clone(),
        db,
        ml,
    });

    let addr = format!("0.0.0.0:{}", config.port);
    info!("starting log parser server on {}", addr);
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
