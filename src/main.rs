//! Main entry point for the Prompt-to-Image Service

use prompt_image_service::{
    api,
    backend,
    config::{LoggingConfig, Settings},
    history::{HistoryRepository, InMemoryHistoryRepository, PgHistoryRepository},
    storage::FileArtifactStore,
    AppState,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "pretty" {
        registry.with(fmt::layer().pretty()).init();
    } else {
        registry.with(fmt::layer().json()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::load()?;
    settings.validate()?;

    init_logging(&settings.logging);

    info!(
        "Loaded configuration: server={}:{}",
        settings.server.host, settings.server.port
    );

    let backend = backend::from_settings(&settings)?;

    let artifacts = FileArtifactStore::new(
        settings.storage.media_root.clone(),
        settings.storage.url_prefix.clone(),
    );
    artifacts.ensure_storage_dir().await?;

    let history: Arc<dyn HistoryRepository> = match settings.database.url.as_deref() {
        Some(url) => {
            let repo = PgHistoryRepository::connect(url, settings.database.max_connections).await?;
            repo.migrate().await?;
            info!("Using Postgres history store");
            Arc::new(repo)
        }
        None => {
            warn!("DATABASE_URL not set; generation history is kept in memory only");
            Arc::new(InMemoryHistoryRepository::new())
        }
    };

    let addr = format!("{}:{}", settings.server.host, settings.server.port);

    let app_state = Arc::new(AppState::new(settings, backend, Arc::new(artifacts), history));

    // Build the router
    let app = api::create_router(app_state);

    info!("Server listening on {}", addr);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
