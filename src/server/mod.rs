//! HTTP gateway in front of the orchestrator
//!
//! - GET  /api/status  - health, backend chain and provider readiness
//! - GET  /api/agents  - hosted specialists
//! - POST /api/process - one orchestrator cycle

mod error;
pub mod handlers;

pub use error::{ApiError, ApiResult};
pub use handlers::{ProcessRequest, ProcessResponse};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header},
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::state::AppState;

/// Max request body (64KB)
const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/api/status", get(handlers::status))
        .route("/api/agents", get(handlers::agents))
        .route("/api/process", post(handlers::process))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: AppState) -> Result<()> {
    let bind_address = state.config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {}", bind_address))?;
    info!("Listening on http://{}", bind_address);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("server error")?;
    Ok(())
}
