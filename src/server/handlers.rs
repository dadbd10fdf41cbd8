// src/server/handlers.rs

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ApiResult};
use crate::backend::{ProviderDiagnostic, diagnostics};
use crate::session::SessionContext;
use crate::specialist::SpecialistInfo;
use crate::state::AppState;

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backends: Vec<String>,
    pub invoke_mode: &'static str,
    pub auto_fallback: bool,
    pub cooling_backends: Vec<String>,
    pub specialists: usize,
    pub providers: Vec<ProviderDiagnostic>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user: String,
    pub text: String,
}

fn default_platform() -> String {
    "web".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub response: String,
    pub session_id: String,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let invoker = state.orchestrator.invoker();
    Json(StatusResponse {
        status: "ok",
        version: API_VERSION,
        backends: invoker.chain().names(),
        invoke_mode: invoker.effective_mode().as_str(),
        auto_fallback: state.config.auto_fallback,
        cooling_backends: invoker.cooling_backends(),
        specialists: state.roster.len(),
        providers: diagnostics(&state.config),
    })
}

pub async fn agents(State(state): State<AppState>) -> Json<Vec<SpecialistInfo>> {
    Json(state.roster.describe())
}

pub async fn process(
    State(state): State<AppState>,
    Json(req): Json<ProcessRequest>,
) -> ApiResult<Json<ProcessResponse>> {
    if req.text.trim().is_empty() {
        return Err(ApiError::bad_request("text must not be empty"));
    }

    let session = SessionContext::route(&req.platform, &req.channel, &req.user);
    info!("POST /api/process for session {}", session.short_id());
    let response = state.orchestrator.process_session(&session, &req.text).await;

    Ok(Json(ProcessResponse {
        response,
        session_id: session.session_id,
    }))
}
