//! Unified error handling for the protection engine.
//!
//! Everything user-recoverable (unknown region names, invalid flag words,
//! malformed documents) surfaces as a [`BlockwardError`]; credential
//! mismatches and denied actions are *not* errors, they are normal decision
//! outcomes carried by the resolvers. Construction-time invariant violations
//! (an unsupported lock type for a protection kind) are programmer errors
//! and panic instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockwardError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("unknown region: {0}")]
    RegionNotFound(String),

    #[error("there is already a protection at this position")]
    AlreadyProtected,

    #[error("lock {0} not found")]
    LockNotFound(u64),
}

pub type BlockwardResult<T> = Result<T, BlockwardError>;
