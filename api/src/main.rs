mod error;
mod routes;
mod state;

use std::sync::Arc;

use anyhow::Result;
use collector::{DataCollectionService, Scheduler};
use migration::{Migrator, MigratorTrait};
use shared::{get_db_connection, Config};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_format);

    info!("Starting candle collector API server...");

    let db = Arc::new(get_db_connection(&config.database_url).await?);
    info!("Connected to database");

    if config.run_migrations {
        Migrator::up(db.as_ref(), None).await?;
        info!("Database migrations applied");
    }

    let service = Arc::new(DataCollectionService::new(
        Arc::clone(&db),
        config.collection_settings(),
    ));
    let scheduler = Scheduler::new(service);
    scheduler.start().await;

    let app = routes::app_router(AppState::new(Arc::clone(&scheduler), &config.static_dir));

    let listener = tokio::net::TcpListener::bind(&config.api_bind_addr).await?;
    info!("API server listening on http://{}", config.api_bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
    info!("Shutdown signal received, stopping scheduler...");
}
