//! Error codes for the arena engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArenaError>;

#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("Cache key must hold two deterministic players and a turn count: {0}")]
    InvalidKey(String),

    #[error("Cache value must hold one action pair per turn: expected {expected} turns, got {actual}")]
    InvalidValue { expected: usize, actual: usize },

    #[error("Cannot update cache unless mutable is true")]
    ImmutableCache,

    #[error("Cache file exists but is not the correct format (expected {expected}). Try deleting and re-building the cache file")]
    CorruptCache { expected: &'static str },

    #[error("Invalid edge list: {0}")]
    InvalidEdges(String),

    #[error("Probability {0} is outside [0, 1]")]
    InvalidProbability(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Character must be 'C' or 'D', got {0:?}")]
    UnknownAction(char),

    #[error("Tournament worker failed: {0}")]
    WorkerFailed(String),

    #[error("Could not install logger: {0}")]
    Logger(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
