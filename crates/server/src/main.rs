use anyhow::{self, Error as AnyhowError};
use db::{DBService, DbErr};
use server::{AppState, http};
use services::services::{
    blob_deletion::BlobDeletionWorker,
    blob_store::{self, BlobStoreError},
    config::load_config,
    events::EventService,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Debug, Error)]
pub enum TaskerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    BlobStore(#[from] BlobStoreError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

fn init_tracing() -> Result<(), AnyhowError> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},db={level},domain_event={level},tower_http={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string)
        .map_err(|err| anyhow::anyhow!("invalid RUST_LOG filter: {err}"))?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), TaskerError> {
    init_tracing()?;

    let config = load_config().await;
    let db = DBService::new(&config.database_url).await?;
    let store = blob_store::from_config(&config.storage).await?;
    tracing::info!(
        backend = ?config.storage.backend,
        bucket = %config.storage.bucket,
        "blob storage ready"
    );

    let shutdown = CancellationToken::new();
    let publisher = EventService::new(db.clone(), &config.workers).spawn(shutdown.clone());
    let blob_worker =
        BlobDeletionWorker::new(db.clone(), store.clone(), &config.workers).spawn(shutdown.clone());

    let state = AppState::new(db, store, &config);
    let app_router = http::router(state, config.request_timeout());

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let actual_port = listener.local_addr()?.port();
    tracing::info!("Server running on http://{}:{actual_port}", config.host);

    axum::serve(listener, app_router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, waiting for background workers");
    shutdown.cancel();
    for (name, handle) in [("event publisher", publisher), ("blob deletion", blob_worker)] {
        if let Err(err) = handle.await {
            tracing::warn!(worker = name, error = %err, "background worker did not stop cleanly");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
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
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
