use std::path::PathBuf;

use thiserror::Error;

/// Reasons a command is ignored. The engine state is untouched whenever one is returned.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CommandRejected {
    #[error("game is over, player {winner} reached the finish")]
    GameOver { winner: usize },
    #[error("unknown player {index} (player count {count})")]
    UnknownPlayer { index: usize, count: usize },
    #[error("increment must be positive")]
    InvalidValue,
    #[error("unsupported player count {requested}")]
    InvalidPlayerCount { requested: usize },
}

/// Reasons a persisted record is refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("unsupported player count {0}")]
    PlayerCount(usize),
    #[error("expected {expected} players, found {found}")]
    PlayerMismatch { expected: usize, found: usize },
    #[error("player {player} has an invalid batch at {batch}")]
    Batch { player: usize, batch: usize },
    #[error("player {player} score {score} does not match its batches")]
    Score { player: usize, score: u32 },
    #[error("winner {0} is not at the finish")]
    Winner(usize),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize game state: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message is not a json object")]
    NotAnObject,
    #[error("missing or invalid field `{0}`")]
    Field(&'static str),
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("advance value {0} is not one of 1, 2, 5")]
    AdvanceValue(u64),
}
