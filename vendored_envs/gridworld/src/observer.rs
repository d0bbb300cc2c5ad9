//! Presentation hooks. Observers are notified of engine events but are never
//! consulted for decisions.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

use crate::types::Position;

/// Sink for position and episode events, e.g. a grid display or heat map.
pub trait DisplayObserver: Send + Sync {
    fn on_position_changed(&mut self, position: Position);
    fn on_episode_restarted(&mut self, position: Position);
    /// Value annotation for a `(cell, action)` pair, e.g. a Q-value overlay.
    fn on_cell_scored(&mut self, _position: Position, _action: &str, _value: f64) {}
    fn on_display_started(&mut self) {}
    fn on_display_stopped(&mut self) {}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayEvent {
    PositionChanged { position: Position },
    EpisodeRestarted { position: Position },
    CellScored { position: Position, action: String, value: f64 },
    DisplayStarted,
    DisplayStopped,
}

/// Recording observer. Clones share the same buffer, so a caller can keep a
/// handle while the engine owns the boxed observer.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<DisplayEvent>>>,
}

impl EventLog {
    pub fn new() -> Self { Self::default() }

    fn push(&self, event: DisplayEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<DisplayEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Take and clear the recorded events.
    pub fn drain(&self) -> Vec<DisplayEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl DisplayObserver for EventLog {
    fn on_position_changed(&mut self, position: Position) {
        self.push(DisplayEvent::PositionChanged { position });
    }

    fn on_episode_restarted(&mut self, position: Position) {
        self.push(DisplayEvent::EpisodeRestarted { position });
    }

    fn on_cell_scored(&mut self, position: Position, action: &str, value: f64) {
        self.push(DisplayEvent::CellScored { position, action: action.to_string(), value });
    }

    fn on_display_started(&mut self) { self.push(DisplayEvent::DisplayStarted); }

    fn on_display_stopped(&mut self) { self.push(DisplayEvent::DisplayStopped); }
}
