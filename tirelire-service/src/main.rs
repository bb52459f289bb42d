use service_core::error::{set_expose_diagnostics, AppError};
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tirelire_service::{
    build_router,
    config::{StoreBackend, TirelireConfig},
    services::{
        metrics::init_metrics, Datastore, EmailService, FaceMatcher, HttpFaceMatcher,
        ImageStorage, InMemoryStore, JwtService, LocalImageStorage, MongoDb,
    },
    AppState,
};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Fail fast on invalid configuration
    let config = TirelireConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );
    set_expose_diagnostics(!config.is_prod());
    init_metrics()?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        store = ?config.store,
        "Starting tirelire service"
    );

    let email = Arc::new(EmailService::new(&config.smtp)?);
    tracing::info!(host = %config.smtp.host, "Email service initialized");

    let matcher: Arc<dyn FaceMatcher> = Arc::new(HttpFaceMatcher::new(&config.face_match)?);

    let storage: Arc<dyn ImageStorage> = Arc::new(
        LocalImageStorage::new(
            &config.uploads.dir,
            &config.urls.api_url,
            config.uploads.max_image_bytes,
        )
        .await?,
    );
    tracing::info!(dir = %config.uploads.dir, "Upload storage ready");

    let jwt = JwtService::new(&config.jwt)?;
    tracing::info!("JWT service initialized");

    let state = match config.store {
        StoreBackend::Mongo => {
            let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database).await?;
            db.initialize_indexes().await?;
            db.health_check().await?;
            tracing::info!(database = %config.mongodb.database, "Database initialized");
            AppState::build(config.clone(), Arc::new(db), email, matcher, storage, jwt)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store, data will not survive a restart");
            AppState::build(
                config.clone(),
                Arc::new(InMemoryStore::new()),
                email,
                matcher,
                storage,
                jwt,
            )
        }
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
