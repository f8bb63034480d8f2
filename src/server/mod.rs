//! HTTP-сервер: маршруты, состояние, обработчики

pub mod error;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::ServiceConfig;

pub use error::ServerError;
pub use state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let max_upload = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .route("/retrain", post(handlers::retrain))
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(DefaultBodyLimit::max(max_upload)),
        )
        .with_state(state)
}

/// Запуск сервера. Дообучение выполняется прямо в задаче запроса и
/// не выносится в отдельный пул; параллельные запросы видят старую или новую модель целиком.
pub async fn run_server(config: ServiceConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;
    let state = Arc::new(AppState::load(config));

    info!(
        models_dir = %state.store.dir().display(),
        model_loaded = state.model_loaded().await,
        "Artifacts loaded"
    );

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
