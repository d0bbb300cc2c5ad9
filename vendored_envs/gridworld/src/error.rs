/// Engine errors. All are recoverable at the caller's discretion.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("grid dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },
    #[error("no free cell to place the agent on a {width}x{height} grid")]
    NoFreeCell { width: i32, height: i32 },
    #[error("malformed environment record: {0}")]
    MalformedRecord(String),
}
