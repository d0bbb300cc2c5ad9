//! Pure grid-world logic crate.
//! - Positions and special reward cells
//! - GridEnvironment state machine (moves, walls, specials, restarts)
//! - Observer hooks for presentation layers
//! - Configuration record with serde (de)serialization

mod engine;
mod error;
mod observer;
mod record;
mod types;

pub use engine::{GridEnvironment, MoveOutcome, BLOCKED_MOVE_LIMIT, MAX_PLACEMENT_ATTEMPTS};
pub use error::GridError;
pub use observer::{DisplayEvent, DisplayObserver, EventLog};
pub use record::{from_record, record_to_json, to_record, EnvironmentRecord};
pub use types::{Position, SpecialCell};
