//! Core traits and types shared by gridlab environments and services.
//! Contracts: ToolCall, Observation, Snapshot, Environment, plus a name -> factory registry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

/// Canonical tool call: tool name and JSON-serializable arguments.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Json,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, args: Json) -> Self {
        Self { tool: tool.into(), args }
    }
}

/// Observation contract. Enforces presence of terminated/truncated; additional fields live in `data`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub terminated: bool,
    pub truncated: bool,
    /// Per-environment fields (agent position, score, events, ...).
    #[serde(default)]
    pub data: Json,
}

/// Snapshot contract for checkpoint/restore.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub version: u32,
    pub engine: String,
    pub data: Json,
}

/// Environment errors mapped to HTTP responses by services.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Core async environment trait.
#[async_trait]
pub trait Environment: Send + Sync {
    async fn initialize(&mut self) -> Result<Observation, EngineError>;
    async fn step(&mut self, tool_calls: Vec<ToolCall>) -> Result<Observation, EngineError>;
    async fn checkpoint(&self) -> Result<Snapshot, EngineError>;
    async fn terminate(&mut self) -> Result<Observation, EngineError>;
}

// ---------------------------------
// Environment factory + registry
// ---------------------------------

/// Config-aware factory for constructing environment instances.
pub type EnvConfigFactory = Arc<dyn Fn(Option<Json>) -> Result<Box<dyn Environment>, EngineError> + Send + Sync + 'static>;

static ENV_REGISTRY: OnceLock<Mutex<HashMap<String, EnvConfigFactory>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<String, EnvConfigFactory>> {
    ENV_REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Register a config-aware environment factory under a unique name.
/// Overwrites any existing entry.
pub fn register_environment_with_config(name: &str, factory: EnvConfigFactory) {
    let mut reg = registry().lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    debug!(env = name, "registering environment factory");
    reg.insert(name.to_string(), factory);
}

/// Instantiate a registered environment by name with optional JSON config.
pub fn create_environment_with_config(name: &str, config: Option<Json>) -> Result<Box<dyn Environment>, EngineError> {
    let f = {
        let reg = registry()
            .lock()
            .map_err(|_| EngineError::Internal("env registry poisoned".into()))?;
        reg.get(name)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("unsupported environment: {name}")))?
    };
    f(config)
}

/// Instantiate a registered environment by name with no config.
pub fn create_environment(name: &str) -> Result<Box<dyn Environment>, EngineError> {
    create_environment_with_config(name, None)
}

/// List registered environment names, sorted.
pub fn list_environments() -> Vec<String> {
    let mut names: Vec<String> = registry()
        .lock()
        .map(|reg| reg.keys().cloned().collect())
        .unwrap_or_default();
    names.sort();
    names
}

// -----------------------
// Reproducibility traits
// -----------------------

/// Engines that support snapshotting and restoration.
pub trait ReproducibleEngine {
    fn serialize_engine(&self) -> Result<Json, EngineError>;
    fn engine_name(&self) -> String;
}

/// Helper to build Snapshots from a ReproducibleEngine.
pub fn make_snapshot(engine: &dyn ReproducibleEngine, version: u32) -> Result<Snapshot, EngineError> {
    let data = engine.serialize_engine()?;
    Ok(Snapshot { version, engine: engine.engine_name(), data })
}

// -----------------------
// Tests
// -----------------------
