//! Error types for Cadence

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid recurrence descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Date out of range: {0}")]
    DateOutOfRange(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Discovery cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
