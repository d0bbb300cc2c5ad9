//! Persisted configuration of a [`GridEnvironment`].
//!
//! A record captures the layout and the agent's *original* starting cell. Live
//! state (score, current position, restart flags) is deliberately absent, so a
//! round trip yields a fresh environment with the same configuration.

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as Json;

use crate::engine::GridEnvironment;
use crate::error::GridError;
use crate::types::{Position, SpecialCell};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentRecord {
    #[serde(rename = "x")]
    pub width: i32,
    #[serde(rename = "y")]
    pub height: i32,
    /// Starting cell; `null` places the agent randomly. The key itself is required.
    #[serde(deserialize_with = "required_nullable")]
    pub player: Option<Position>,
    pub actions: Vec<String>,
    pub specials: Vec<SpecialCell>,
    pub walls: Vec<Position>,
    pub walk_reward: f64,
    pub initial_score: f64,
}

// Using `deserialize_with` keeps serde from treating a missing key as `None`.
fn required_nullable<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Position>, D::Error> {
    Option::<Position>::deserialize(d)
}

impl EnvironmentRecord {
    /// Empty layout: no walls, no specials, no actions, zero rewards, random start.
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            player: None,
            actions: Vec::new(),
            specials: Vec::new(),
            walls: Vec::new(),
            walk_reward: 0.0,
            initial_score: 0.0,
        }
    }

    pub fn with_player(mut self, player: Position) -> Self { self.player = Some(player); self }

    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_specials(mut self, specials: Vec<SpecialCell>) -> Self { self.specials = specials; self }

    pub fn with_walls<I: IntoIterator<Item = (i32, i32)>>(mut self, walls: I) -> Self {
        self.walls = walls.into_iter().map(Position::from).collect();
        self
    }

    pub fn with_walk_reward(mut self, walk_reward: f64) -> Self { self.walk_reward = walk_reward; self }

    pub fn with_initial_score(mut self, initial_score: f64) -> Self { self.initial_score = initial_score; self }

    pub fn from_json(value: Json) -> Result<Self, GridError> {
        serde_json::from_value(value).map_err(|e| GridError::MalformedRecord(e.to_string()))
    }

    pub fn parse(text: &str) -> Result<Self, GridError> {
        serde_json::from_str(text).map_err(|e| GridError::MalformedRecord(e.to_string()))
    }

    pub fn to_json(&self) -> Json {
        // Plain structs of numbers, strings and arrays always serialize.
        serde_json::to_value(self).unwrap_or(Json::Null)
    }

    pub fn build<R: Rng>(self, rng: R) -> Result<GridEnvironment<R>, GridError> {
        GridEnvironment::new(self, rng)
    }
}

/// Configuration of `env`, with the original (not current) agent position and
/// the reset score (not the live score).
pub fn to_record<R>(env: &GridEnvironment<R>) -> EnvironmentRecord {
    EnvironmentRecord {
        width: env.width(),
        height: env.height(),
        player: Some(env.original_position()),
        actions: env.actions().to_vec(),
        specials: env.specials().to_vec(),
        walls: env.walls().to_vec(),
        walk_reward: env.walk_reward(),
        initial_score: env.reset_score(),
    }
}

pub fn record_to_json<R>(env: &GridEnvironment<R>) -> Json { to_record(env).to_json() }

/// Rebuild an environment through the standard constructor.
pub fn from_record<R: Rng>(value: Json, rng: R) -> Result<GridEnvironment<R>, GridError> {
    EnvironmentRecord::from_json(value)?.build(rng)
}
