use async_trait::async_trait;
use gridlab_core::{
    make_snapshot, register_environment_with_config, EngineError, Environment, Observation, ReproducibleEngine, Snapshot,
    ToolCall,
};
use gridworld_rs::{record_to_json, EnvironmentRecord, EventLog, GridEnvironment, GridError, MoveOutcome, Position, SpecialCell};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use std::sync::Arc;
use tracing::debug;

pub const ENV_NAME: &str = "GridWorld";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Seed for start-cell placement; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_layout")]
    pub layout: EnvironmentRecord,
}

impl Default for Config {
    fn default() -> Self { Self { seed: None, layout: default_layout() } }
}

/// 5x5 world with a 2x2 block of walls, a red trap and a green goal in the
/// right-hand column, and a random start.
pub fn default_layout() -> EnvironmentRecord {
    EnvironmentRecord::new(5, 5)
        .with_actions(["up", "down", "left", "right"])
        .with_specials(vec![SpecialCell::new(4, 1, "red", -1.0), SpecialCell::new(4, 0, "green", 1.0)])
        .with_walls([(1, 1), (1, 2), (2, 1), (2, 2)])
        .with_walk_reward(-0.04)
        .with_initial_score(1.0)
}

/// Movement vector for a named action.
pub fn action_delta(name: &str) -> Option<(i32, i32)> {
    Some(match name.to_ascii_lowercase().as_str() {
        "up" => (0, -1),
        "down" => (0, 1),
        "left" => (-1, 0),
        "right" => (1, 0),
        _ => return None,
    })
}

fn map_grid_err(err: GridError) -> EngineError {
    match err {
        GridError::NoFreeCell { .. } => EngineError::Internal(err.to_string()),
        _ => EngineError::Validation(err.to_string()),
    }
}

fn parse_position(v: &Json) -> Result<Position, EngineError> {
    serde_json::from_value(v.clone()).map_err(|e| EngineError::Validation(format!("bad position: {e}")))
}

pub struct GridWorldEnvironment {
    env: GridEnvironment<StdRng>,
    events: EventLog,
    episode: u32,
    reward_last: f64,
    total_reward: f64,
    truncated: bool,
}

impl GridWorldEnvironment {
    pub fn new(config: Config) -> Result<Self, EngineError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut env = GridEnvironment::new(config.layout, rng).map_err(map_grid_err)?;
        let events = EventLog::new();
        env.attach_observer(Box::new(events.clone()));
        Ok(Self { env, events, episode: 0, reward_last: 0.0, total_reward: 0.0, truncated: false })
    }

    pub fn engine(&self) -> &GridEnvironment<StdRng> { &self.env }

    fn resolve_action(&self, name: &str) -> Result<(i32, i32), EngineError> {
        if !self.env.actions().iter().any(|a| a.eq_ignore_ascii_case(name)) {
            return Err(EngineError::Validation(format!("action '{name}' is not in the action set")));
        }
        action_delta(name).ok_or_else(|| EngineError::Validation(format!("invalid action '{name}'")))
    }

    fn apply_move(&mut self, d_col: i32, d_row: i32) -> Result<MoveOutcome, EngineError> {
        let out = self.env.try_move(d_col, d_row).map_err(map_grid_err)?;
        if out.restarted {
            self.episode += 1;
        }
        self.reward_last = out.reward;
        self.total_reward += out.reward;
        Ok(out)
    }

    fn interact(&mut self, args: &Json) -> Result<Vec<MoveOutcome>, EngineError> {
        if let Some(a) = args.get("action").and_then(|v| v.as_str()) {
            let (dc, dr) = self.resolve_action(a)?;
            Ok(vec![self.apply_move(dc, dr)?])
        } else if let Some(arr) = args.get("actions").and_then(|v| v.as_array()) {
            // Resolve everything up front so a bad name leaves the state untouched.
            let deltas = arr
                .iter()
                .map(|v| {
                    let name = v.as_str().ok_or_else(|| EngineError::Validation("actions entries must be strings".into()))?;
                    self.resolve_action(name)
                })
                .collect::<Result<Vec<_>, _>>()?;
            let mut outcomes = Vec::with_capacity(deltas.len());
            for (dc, dr) in deltas {
                let out = self.apply_move(dc, dr)?;
                outcomes.push(out);
                if out.pending_restart { break; }
            }
            Ok(outcomes)
        } else if let Some(delta) = args.get("delta") {
            let (dc, dr): (i32, i32) = serde_json::from_value(delta.clone())
                .map_err(|e| EngineError::Validation(format!("bad delta: {e}")))?;
            Ok(vec![self.apply_move(dc, dr)?])
        } else {
            Err(EngineError::Validation("missing 'action', 'actions' or 'delta'".into()))
        }
    }

    fn snapshot_obs(&self, event: &str, extra: Json) -> Observation {
        let terminated = self.env.has_pending_restart();
        let data = json!({
            "agent_pos": self.env.current_position(),
            "original_pos": self.env.original_position(),
            "width": self.env.width(),
            "height": self.env.height(),
            "score": self.env.score(),
            "max_score": self.env.high_water_score(),
            "successful": self.env.is_successful(),
            "pending_restart": terminated,
            "blocked_moves": self.env.blocked_moves(),
            "episode": self.episode,
            "reward_last": self.reward_last,
            "total_reward": self.total_reward,
            "events": self.events.drain(),
            "terminated": terminated,
            "truncated": self.truncated,
            "event": event,
            "extra": extra,
        });
        Observation { terminated, truncated: self.truncated, data }
    }
}

impl ReproducibleEngine for GridWorldEnvironment {
    fn serialize_engine(&self) -> Result<Json, EngineError> {
        Ok(json!({
            "record": record_to_json(&self.env),
            "agent_pos": self.env.current_position(),
            "score": self.env.score(),
            "max_score": self.env.high_water_score(),
            "pending_restart": self.env.has_pending_restart(),
            "episode": self.episode,
            "total_reward": self.total_reward,
        }))
    }

    fn engine_name(&self) -> String { "gridworld".into() }
}

#[async_trait]
impl Environment for GridWorldEnvironment {
    async fn initialize(&mut self) -> Result<Observation, EngineError> {
        Ok(self.snapshot_obs("initialize", Json::Null))
    }

    async fn step(&mut self, tool_calls: Vec<ToolCall>) -> Result<Observation, EngineError> {
        if tool_calls.is_empty() {
            return Err(EngineError::Validation("no tool_calls provided".into()));
        }
        let call = &tool_calls[0];
        debug!(tool = %call.tool, "gridworld step");
        match call.tool.as_str() {
            "interact" | "move" => {
                let outcomes = self.interact(&call.args)?;
                Ok(self.snapshot_obs("step", json!({ "outcomes": outcomes })))
            }
            "reposition" => {
                let target = match call.args.get("position") {
                    Some(Json::Null) | None => None,
                    Some(v) => Some(parse_position(v)?),
                };
                let p = self.env.reposition_agent(target).map_err(map_grid_err)?;
                Ok(self.snapshot_obs("reposition", json!({ "position": p })))
            }
            "restart" => {
                let p = self.env.restart_episode().map_err(map_grid_err)?;
                self.episode += 1;
                Ok(self.snapshot_obs("restart", json!({ "position": p })))
            }
            "score_cell" => {
                let position = parse_position(call.args.get("position").unwrap_or(&Json::Null))?;
                let action = call.args.get("action").and_then(|v| v.as_str()).ok_or_else(|| EngineError::Validation("missing action".into()))?;
                let value = call.args.get("value").and_then(|v| v.as_f64()).ok_or_else(|| EngineError::Validation("missing value".into()))?;
                self.env.set_cell_score(position, action, value);
                Ok(self.snapshot_obs("score_cell", Json::Null))
            }
            _ => Err(EngineError::Validation(format!("unknown tool: {}", call.tool))),
        }
    }

    async fn checkpoint(&self) -> Result<Snapshot, EngineError> {
        make_snapshot(self, 1)
    }

    async fn terminate(&mut self) -> Result<Observation, EngineError> {
        self.truncated = true;
        self.env.stop_display();
        Ok(self.snapshot_obs("terminate", Json::Null))
    }
}

// Registration helper for registry-based construction
pub fn register_default_env() {
    register_environment_with_config(
        ENV_NAME,
        Arc::new(|cfg| {
            let cfg: Config = match cfg {
                Some(v) => serde_json::from_value(v).map_err(|e| EngineError::Validation(format!("bad config: {e}")))?,
                None => Config::default(),
            };
            Ok(Box::new(GridWorldEnvironment::new(cfg)?))
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_start(col: i32, row: i32) -> Config {
        Config { seed: Some(1), layout: default_layout().with_player(Position::new(col, row)) }
    }

    fn interact(args: Json) -> Vec<ToolCall> { vec![ToolCall::new("interact", args)] }

    #[tokio::test]
    async fn walk_to_green_goal_terminates() {
        let mut env = GridWorldEnvironment::new(fixed_start(0, 0)).unwrap();
        let obs = env.initialize().await.unwrap();
        assert_eq!(obs.data["agent_pos"], json!([0, 0]));
        assert!(!obs.terminated);

        let obs = env.step(interact(json!({"actions": ["right", "right", "right", "right"]}))).await.unwrap();
        assert!(obs.terminated);
        assert_eq!(obs.data["agent_pos"], json!([4, 0]));
        assert_eq!(obs.data["extra"]["outcomes"].as_array().unwrap().len(), 4);
        let score = obs.data["score"].as_f64().unwrap();
        assert!((score - 1.88).abs() < 1e-9, "score {score}");
        assert_eq!(obs.data["events"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn next_step_after_goal_starts_new_episode() {
        let mut env = GridWorldEnvironment::new(fixed_start(3, 0)).unwrap();
        env.step(interact(json!({"action": "right"}))).await.unwrap();
        let obs = env.step(interact(json!({"delta": [-9, 0]}))).await.unwrap();
        assert_eq!(obs.data["episode"], 1);
        assert!(!obs.terminated);
        let max = obs.data["max_score"].as_f64().unwrap();
        assert!((max - 2.0).abs() < 1e-9);
        assert_eq!(obs.data["events"][0]["kind"], "episode_restarted");
    }

    #[tokio::test]
    async fn actions_batch_stops_at_episode_end() {
        let mut env = GridWorldEnvironment::new(fixed_start(4, 2)).unwrap();
        let obs = env.step(interact(json!({"actions": ["up", "up", "up"]}))).await.unwrap();
        assert_eq!(obs.data["extra"]["outcomes"].as_array().unwrap().len(), 1);
        assert_eq!(obs.data["agent_pos"], json!([4, 1]));
        assert!(obs.terminated);
    }

    #[tokio::test]
    async fn unknown_actions_and_tools_are_rejected() {
        let mut env = GridWorldEnvironment::new(fixed_start(0, 0)).unwrap();
        assert!(matches!(env.step(interact(json!({"action": "jump"}))).await, Err(EngineError::Validation(_))));
        assert!(matches!(env.step(interact(json!({"actions": ["right", 3]}))).await, Err(EngineError::Validation(_))));
        assert!(matches!(env.step(interact(json!({}))).await, Err(EngineError::Validation(_))));
        assert!(matches!(env.step(vec![ToolCall::new("fly", Json::Null)]).await, Err(EngineError::Validation(_))));
        assert!(matches!(env.step(vec![]).await, Err(EngineError::Validation(_))));
        // Nothing moved.
        assert_eq!(env.engine().current_position(), Position::new(0, 0));
    }

    #[tokio::test]
    async fn action_must_belong_to_the_action_set() {
        let mut cfg = fixed_start(0, 0);
        cfg.layout = cfg.layout.with_actions(["right"]);
        let mut env = GridWorldEnvironment::new(cfg).unwrap();
        assert!(env.step(interact(json!({"action": "right"}))).await.is_ok());
        assert!(env.step(interact(json!({"action": "left"}))).await.is_err());
    }

    #[tokio::test]
    async fn reposition_restart_and_cell_scores() {
        let mut env = GridWorldEnvironment::new(fixed_start(0, 0)).unwrap();
        let obs = env.step(vec![ToolCall::new("reposition", json!({"position": [3, 3]}))]).await.unwrap();
        assert_eq!(obs.data["agent_pos"], json!([3, 3]));
        assert_eq!(obs.data["original_pos"], json!([3, 3]));

        let obs = env.step(vec![ToolCall::new("restart", Json::Null)]).await.unwrap();
        assert_eq!(obs.data["original_pos"], json!([3, 3]));
        assert_eq!(obs.data["episode"], 1);

        let obs = env
            .step(vec![ToolCall::new("score_cell", json!({"position": [0, 0], "action": "up", "value": 0.25}))])
            .await
            .unwrap();
        assert_eq!(obs.data["events"][0]["kind"], "cell_scored");
        assert_eq!(obs.data["events"][0]["value"], 0.25);
    }

    #[tokio::test]
    async fn checkpoint_contains_round_trippable_record() {
        let mut env = GridWorldEnvironment::new(fixed_start(0, 4)).unwrap();
        env.step(interact(json!({"action": "up"}))).await.unwrap();
        let snap = env.checkpoint().await.unwrap();
        assert_eq!(snap.engine, "gridworld");
        assert_eq!(snap.data["agent_pos"], json!([0, 3]));
        let record = EnvironmentRecord::from_json(snap.data["record"].clone()).unwrap();
        assert_eq!(record.player, Some(Position::new(0, 4)));
        assert_eq!(record, default_layout().with_player(Position::new(0, 4)));
    }

    #[tokio::test]
    async fn terminate_marks_truncated() {
        let mut env = GridWorldEnvironment::new(Config { seed: Some(3), ..Default::default() }).unwrap();
        let obs = env.terminate().await.unwrap();
        assert!(obs.truncated);
        assert_eq!(obs.data["events"][0]["kind"], "display_stopped");
    }

    #[tokio::test]
    async fn registry_builds_from_json_config() {
        register_default_env();
        let cfg = json!({"seed": 9, "layout": {
            "x": 3, "y": 1, "player": [0, 0], "actions": ["left", "right"],
            "specials": [[2, 0, "goal", 10.0]], "walls": [], "walk_reward": -1.0, "initial_score": 0.0
        }});
        let mut env = gridlab_core::create_environment_with_config(ENV_NAME, Some(cfg)).unwrap();
        env.initialize().await.unwrap();
        let obs = env.step(interact(json!({"actions": ["right", "right"]}))).await.unwrap();
        assert!(obs.terminated);
        assert_eq!(obs.data["score"], 9.0);

        let bad = json!({"layout": {"x": 3}});
        assert!(matches!(
            gridlab_core::create_environment_with_config(ENV_NAME, Some(bad)).err(),
            Some(EngineError::Validation(_))
        ));
    }
}
