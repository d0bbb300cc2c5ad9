use serde::{Deserialize, Serialize};
use std::fmt;

/// A grid cell addressed as `(col, row)`. Serialized as `[col, row]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Position {
    pub col: i32,
    pub row: i32,
}

impl Position {
    pub const fn new(col: i32, row: i32) -> Self { Self { col, row } }

    /// Candidate cell reached by applying a move delta. `None` when the
    /// coordinate arithmetic overflows; such a candidate is off the grid.
    pub fn offset(self, d_col: i32, d_row: i32) -> Option<Position> {
        Some(Position { col: self.col.checked_add(d_col)?, row: self.row.checked_add(d_row)? })
    }
}

impl From<(i32, i32)> for Position {
    fn from((col, row): (i32, i32)) -> Self { Self { col, row } }
}

impl From<Position> for (i32, i32) {
    fn from(p: Position) -> Self { (p.col, p.row) }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// A reward cell that ends the episode when entered.
///
/// Serialized as the four-element array `[col, row, category, reward]`.
/// `category` is an opaque tag chosen by the caller (colour names in the
/// stock layouts) and is never interpreted by the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "(i32, i32, String, f64)", into = "(i32, i32, String, f64)")]
pub struct SpecialCell {
    pub position: Position,
    pub category: String,
    pub reward: f64,
}

impl SpecialCell {
    pub fn new(col: i32, row: i32, category: impl Into<String>, reward: f64) -> Self {
        Self { position: Position::new(col, row), category: category.into(), reward }
    }
}

impl From<(i32, i32, String, f64)> for SpecialCell {
    fn from((col, row, category, reward): (i32, i32, String, f64)) -> Self {
        Self { position: Position::new(col, row), category, reward }
    }
}

impl From<SpecialCell> for (i32, i32, String, f64) {
    fn from(s: SpecialCell) -> Self { (s.position.col, s.position.row, s.category, s.reward) }
}
