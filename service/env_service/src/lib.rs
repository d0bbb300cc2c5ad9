//! HTTP front end for registered gridlab environments.
//! Each `/initialize` call creates an instance keyed by a generated id; later
//! step/checkpoint/terminate calls address it by that id.

use std::{collections::HashMap, sync::{Arc, atomic::{AtomicU64, Ordering}}};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::{get, post}, Json, Router};
use gridlab_core::{create_environment_with_config, list_environments, Environment, EngineError, Observation, Snapshot, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    store: Arc<RwLock<HashMap<String, Box<dyn Environment>>>>,
    id_ctr: Arc<AtomicU64>,
}

impl AppState {
    fn new() -> Self {
        Self { store: Arc::new(RwLock::new(HashMap::new())), id_ctr: Arc::new(AtomicU64::new(1)) }
    }
    fn next_id(&self) -> String { format!("env-{}", self.id_ctr.fetch_add(1, Ordering::Relaxed)) }
}

#[derive(Deserialize)]
pub struct InitRequest {
    pub env_type: String,
    #[serde(default)]
    pub config: Option<JsonValue>,
}

#[derive(Serialize)]
pub struct InitResponse {
    pub env_id: String,
    pub observation: Observation,
}

#[derive(Deserialize)]
pub struct StepRequest {
    pub env_id: String,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize)]
pub struct IdRequest { pub env_id: String }

type ApiError = (StatusCode, String);

async fn list_envs() -> impl IntoResponse { Json(list_environments()) }

async fn initialize(State(state): State<AppState>, Json(req): Json<InitRequest>) -> Result<Json<InitResponse>, ApiError> {
    let mut env = create_environment_with_config(&req.env_type, req.config).map_err(map_engine_err)?;
    let obs = env.initialize().await.map_err(map_engine_err)?;
    let id = state.next_id();
    info!(env_id = %id, env_type = %req.env_type, "environment initialized");
    state.store.write().await.insert(id.clone(), env);
    Ok(Json(InitResponse { env_id: id, observation: obs }))
}

async fn step(State(state): State<AppState>, Json(req): Json<StepRequest>) -> Result<Json<Observation>, ApiError> {
    let mut guard = state.store.write().await;
    let env = guard.get_mut(&req.env_id).ok_or_else(|| not_found(&req.env_id))?;
    let obs = env.step(req.tool_calls).await.map_err(map_engine_err)?;
    Ok(Json(obs))
}

async fn checkpoint(State(state): State<AppState>, Json(req): Json<IdRequest>) -> Result<Json<Snapshot>, ApiError> {
    let guard = state.store.read().await;
    let env = guard.get(&req.env_id).ok_or_else(|| not_found(&req.env_id))?;
    let snap = env.checkpoint().await.map_err(map_engine_err)?;
    Ok(Json(snap))
}

async fn terminate(State(state): State<AppState>, Json(req): Json<IdRequest>) -> Result<Json<Observation>, ApiError> {
    let mut env = state.store.write().await.remove(&req.env_id).ok_or_else(|| not_found(&req.env_id))?;
    let obs = env.terminate().await.map_err(map_engine_err)?;
    info!(env_id = %req.env_id, "environment terminated");
    Ok(Json(obs))
}

fn not_found(env_id: &str) -> ApiError { (StatusCode::NOT_FOUND, format!("env {env_id} not found")) }

fn map_engine_err(err: EngineError) -> ApiError {
    warn!(error = %err, "engine error");
    match err {
        EngineError::Validation(s) => (StatusCode::BAD_REQUEST, s),
        EngineError::NotFound(s) => (StatusCode::NOT_FOUND, s),
        EngineError::Internal(s) => (StatusCode::INTERNAL_SERVER_ERROR, s),
    }
}

pub fn make_app() -> Router {
    let state = AppState::new();
    Router::new()
        .route("/envs", get(list_envs))
        .route("/initialize", post(initialize))
        .route("/step", post(step))
        .route("/checkpoint", post(checkpoint))
        .route("/terminate", post(terminate))
        .with_state(state)
}
