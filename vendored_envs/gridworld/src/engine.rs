//! The grid-world state machine.
//!
//! An agent occupies one cell of a `width x height` grid. Every move attempt
//! costs `walk_reward`; entering a special cell replaces that cost with the
//! cell's reward and ends the episode. Ten consecutive blocked moves also end
//! the episode. A finished episode is restarted lazily, at the start of the
//! next move.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::GridError;
use crate::observer::DisplayObserver;
use crate::record::EnvironmentRecord;
use crate::types::{Position, SpecialCell};

/// Consecutive blocked moves that end an episode.
pub const BLOCKED_MOVE_LIMIT: u32 = 10;

/// Rejection-sampling draws before placement falls back to picking from the
/// enumerated free cells.
pub const MAX_PLACEMENT_ATTEMPTS: u32 = 10_000;

/// What a single [`GridEnvironment::try_move`] call did.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// A pending restart was performed before the move was processed.
    pub restarted: bool,
    /// The agent changed cell.
    pub moved: bool,
    /// Index into the special cells of the one that was matched.
    pub special: Option<usize>,
    pub pending_restart: bool,
    /// Score change caused by this move, measured after any restart.
    pub reward: f64,
}

pub struct GridEnvironment<R = StdRng> {
    width: i32,
    height: i32,
    actions: Vec<String>,
    specials: Vec<SpecialCell>,
    walls: Vec<Position>,
    wall_set: HashSet<Position>,
    walk_reward: f64,
    score: f64,
    max_score: f64,
    reset_score: f64,
    agent: Position,
    original_agent: Position,
    blocked_moves: u32,
    pending_restart: bool,
    successful: bool,
    previous_positive: bool,
    observer: Option<Box<dyn DisplayObserver>>,
    rng: R,
}

impl<R: Rng> GridEnvironment<R> {
    /// Build an environment from its configuration record.
    ///
    /// A record without a `player` places the agent on a uniformly random
    /// free cell drawn from `rng`. An explicit position is taken as given,
    /// like [`reposition_agent`](Self::reposition_agent), so any record
    /// produced by [`to_record`](crate::to_record) loads back.
    pub fn new(record: EnvironmentRecord, mut rng: R) -> Result<Self, GridError> {
        let EnvironmentRecord { width, height, player, actions, specials, walls, walk_reward, initial_score } = record;
        if width <= 0 || height <= 0 {
            return Err(GridError::InvalidDimensions { width, height });
        }
        let wall_set: HashSet<Position> = walls.iter().copied().collect();
        let start = match player {
            Some(p) => p,
            None => sample_free_cell(&mut rng, width, height, &wall_set)?,
        };
        Ok(Self {
            width,
            height,
            actions,
            specials,
            walls,
            wall_set,
            walk_reward,
            score: initial_score,
            max_score: initial_score,
            reset_score: initial_score,
            agent: start,
            original_agent: start,
            blocked_moves: 0,
            pending_restart: false,
            successful: false,
            previous_positive: false,
            observer: None,
            rng,
        })
    }

    /// Move the agent to `position` (unchecked), or to a random free cell when
    /// `None`. Both the current and the original position are replaced; score,
    /// counters and the restart flag are left alone.
    pub fn reposition_agent(&mut self, position: Option<Position>) -> Result<Position, GridError> {
        let position = match position {
            Some(p) => p,
            None => sample_free_cell(&mut self.rng, self.width, self.height, &self.wall_set)?,
        };
        self.original_agent = position;
        self.agent = position;
        Ok(position)
    }

    /// Begin a new episode: random free start cell, high-water mark update,
    /// score reset. Only the current position changes; the original position
    /// is kept for serialization.
    pub fn restart_episode(&mut self) -> Result<Position, GridError> {
        let position = sample_free_cell(&mut self.rng, self.width, self.height, &self.wall_set)?;
        self.agent = position;
        if self.score > self.max_score {
            self.max_score = self.score;
        }
        debug!(final_score = self.score, max_score = self.max_score, %position, "episode restarted");
        self.score = self.reset_score;
        self.pending_restart = false;
        if let Some(observer) = self.observer.as_mut() {
            observer.on_episode_restarted(position);
        }
        Ok(position)
    }

    /// Process one move attempt by `(d_col, d_row)`.
    ///
    /// Order matters for the score trajectory: a pending restart runs first,
    /// then the walk cost is charged, then the candidate cell is validated,
    /// then the special cells are scanned against the candidate cell. Only
    /// the first special cell in list order can match.
    ///
    /// Fails only when a pending restart cannot place the agent.
    pub fn try_move(&mut self, d_col: i32, d_row: i32) -> Result<MoveOutcome, GridError> {
        let restarted = self.pending_restart;
        if restarted {
            self.restart_episode()?;
        }
        let score_before = self.score;
        let candidate = self.agent.offset(d_col, d_row);
        self.score += self.walk_reward;

        let moved = match candidate {
            Some(cell) if self.is_free(cell) => {
                self.agent = cell;
                self.blocked_moves = 0;
                true
            }
            _ => {
                self.blocked_moves += 1;
                if self.blocked_moves == BLOCKED_MOVE_LIMIT {
                    debug!(position = %self.agent, "blocked move limit reached");
                    self.pending_restart = true;
                    self.blocked_moves = 0;
                }
                false
            }
        };

        let special = candidate.and_then(|cell| self.specials.iter().position(|s| s.position == cell));
        if let Some(index) = special {
            self.score -= self.walk_reward;
            self.score += self.specials[index].reward;
            if self.score > 0.0 {
                info!(score = self.score, "obtained a positive score");
                if self.previous_positive {
                    self.successful = true;
                }
                self.previous_positive = true;
            } else {
                warn!(score = self.score, "obtained a non-positive score");
                self.previous_positive = false;
                self.successful = false;
            }
            self.pending_restart = true;
            self.blocked_moves = 0;
        }

        if moved {
            let position = self.agent;
            if let Some(observer) = self.observer.as_mut() {
                observer.on_position_changed(position);
            }
        }

        Ok(MoveOutcome {
            restarted,
            moved,
            special,
            pending_restart: self.pending_restart,
            reward: self.score - score_before,
        })
    }
}

impl<R> GridEnvironment<R> {
    pub fn current_position(&self) -> Position { self.agent }
    pub fn original_position(&self) -> Position { self.original_agent }
    pub fn has_pending_restart(&self) -> bool { self.pending_restart }
    pub fn high_water_score(&self) -> f64 { self.max_score }
    pub fn score(&self) -> f64 { self.score }
    /// True after two consecutive special-cell visits ended with a positive score.
    pub fn is_successful(&self) -> bool { self.successful }
    pub fn blocked_moves(&self) -> u32 { self.blocked_moves }
    pub fn width(&self) -> i32 { self.width }
    pub fn height(&self) -> i32 { self.height }
    pub fn actions(&self) -> &[String] { &self.actions }
    pub fn specials(&self) -> &[SpecialCell] { &self.specials }
    pub fn walls(&self) -> &[Position] { &self.walls }
    pub fn walk_reward(&self) -> f64 { self.walk_reward }
    pub fn reset_score(&self) -> f64 { self.reset_score }

    pub fn in_bounds(&self, p: Position) -> bool { in_bounds(self.width, self.height, p) }

    /// On the grid and not a wall.
    pub fn is_free(&self, p: Position) -> bool { self.in_bounds(p) && !self.wall_set.contains(&p) }

    pub fn free_cells(&self) -> Vec<Position> {
        cells(self.width, self.height).filter(|p| !self.wall_set.contains(p)).collect()
    }

    /// Install an observer, returning the one it replaces.
    pub fn attach_observer(&mut self, observer: Box<dyn DisplayObserver>) -> Option<Box<dyn DisplayObserver>> {
        self.observer.replace(observer)
    }

    pub fn detach_observer(&mut self) -> Option<Box<dyn DisplayObserver>> { self.observer.take() }

    pub fn has_observer(&self) -> bool { self.observer.is_some() }

    /// Forward a value annotation for `(position, action)` to the observer.
    pub fn set_cell_score(&mut self, position: Position, action: &str, value: f64) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_cell_scored(position, action, value);
        }
    }

    pub fn run_display(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_display_started();
        }
    }

    pub fn stop_display(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_display_stopped();
        }
    }
}

impl<R> fmt::Debug for GridEnvironment<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridEnvironment")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("agent", &self.agent)
            .field("original_agent", &self.original_agent)
            .field("score", &self.score)
            .field("max_score", &self.max_score)
            .field("blocked_moves", &self.blocked_moves)
            .field("pending_restart", &self.pending_restart)
            .field("successful", &self.successful)
            .field("has_observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

fn in_bounds(width: i32, height: i32, p: Position) -> bool {
    p.col >= 0 && p.col < width && p.row >= 0 && p.row < height
}

fn cells(width: i32, height: i32) -> impl Iterator<Item = Position> {
    (0..height).flat_map(move |row| (0..width).map(move |col| Position::new(col, row)))
}

fn sample_free_cell<R: Rng>(rng: &mut R, width: i32, height: i32, walls: &HashSet<Position>) -> Result<Position, GridError> {
    for _ in 0..MAX_PLACEMENT_ATTEMPTS {
        let p = Position::new(rng.gen_range(0..width), rng.gen_range(0..height));
        if !walls.contains(&p) {
            return Ok(p);
        }
    }
    let free: Vec<Position> = cells(width, height).filter(|p| !walls.contains(p)).collect();
    if free.is_empty() {
        return Err(GridError::NoFreeCell { width, height });
    }
    Ok(free[rng.gen_range(0..free.len())])
}
