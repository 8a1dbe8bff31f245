//! Server startup, shutdown, and worker spawning logic.
//!
//! `run_server` opens the configured store, builds the optional geolocation
//! and image hosting collaborators, starts the click worker and serves the
//! router until a shutdown signal arrives. The worker drains its queue after
//! the listener closes.

use crate::auth::AuthService;
use crate::config::{Config, StoreBackend};
use crate::db::Repository;
use crate::error::{AppError, AppResult};
use crate::jobs::{create_job_channel, Worker};
use crate::routes;
use crate::services::classifier::RequestClassifier;
use crate::services::geoip::GeoResolver;
use crate::services::image_host::{ImageHost, S3ImageHost};
use crate::state::AppState;
use crate::store::{MemoryStore, Store};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Router plus the background worker it feeds.
pub struct App {
    pub router: Router,
    pub worker: JoinHandle<()>,
}

/// Open the store selected by `STORE_BACKEND`.
pub async fn open_store(config: &Config, should_migrate: bool) -> AppResult<Arc<dyn Store>> {
    match config.database.backend {
        StoreBackend::Postgres => {
            info!("Connecting to database...");
            let repository = Repository::from_config(&config.database).await?;

            if should_migrate {
                info!("Running database migrations...");
                repository.run_migrations().await?;
                info!("Migrations completed successfully");
            }

            Ok(Arc::new(repository))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Wire state, router and click worker around an already opened store.
///
/// Must be called inside a tokio runtime; the worker is spawned immediately.
pub fn build_app(
    config: &Config,
    store: Arc<dyn Store>,
    image_host: Option<Arc<dyn ImageHost>>,
    geo: GeoResolver,
) -> AppResult<App> {
    let auth_service = AuthService::new(
        config.auth.jwt_secret.clone(),
        config.auth.jwt_expiration_hours,
    );

    let (job_sender, job_receiver) = create_job_channel();
    let worker = Worker::new(store.clone(), RequestClassifier::new(geo), job_receiver);
    let worker = tokio::spawn(worker.run());

    let state = Arc::new(AppState {
        store,
        auth_service,
        job_sender,
        image_host,
        base_url: config.url.base_url.clone(),
        default_expiry_hours: config.url.default_expiry_hours,
        short_code_length: config.url.short_code_length,
        short_code_max_attempts: config.url.short_code_max_attempts,
        strict_url_validation: config.url.strict_url_validation,
    });

    let router = routes::create_router(
        state,
        &config.cors,
        &config.rate_limit,
        config.server.max_body_bytes,
    )?;

    Ok(App { router, worker })
}

/// Run the web server with the given configuration.
///
/// # Errors
///
/// Fails if the store cannot be opened or migrated, the image host
/// configuration is invalid, or the listener cannot bind.
pub async fn run_server(config: Config, addr: String, should_migrate: bool) -> AppResult<()> {
    info!("Starting snaplink server...");

    let store = open_store(&config, should_migrate).await?;
    let image_host = S3ImageHost::from_config(&config.images)?
        .map(|host| Arc::new(host) as Arc<dyn ImageHost>);
    if image_host.is_none() {
        info!("No S3_BUCKET configured; QR image uploads are disabled");
    }
    let geo = GeoResolver::from_config(&config.geoip);

    let App { router, worker } = build_app(&config, store, image_host, geo)?;

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to address {}: {}", addr, e)))?;

    info!("Server listening on {}", addr);
    info!("Base URL: {}", config.url.base_url);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    // The router (and every job sender) is gone; let the worker finish its queue
    info!("Draining click queue...");
    worker.await.unwrap_or_else(|e| {
        error!("Worker task failed: {:?}", e);
    });

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
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

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    #[cfg(not(unix))]
    ctrl_c.await;

    info!("Shutdown signal received");
}
