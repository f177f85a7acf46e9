//! Error types for the record stores and the habit mutator.

use crate::types::{HabitId, RecordId};
use thiserror::Error;

/// Failures reported by a record store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record not found: {0}")]
    NotFound(RecordId),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("No authenticated session")]
    Unauthenticated,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Rejected by store: {0}")]
    Rejected(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}

/// Input rejected before any store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("habit name must not be empty")]
    EmptyName,

    #[error("habit icon must not be empty")]
    EmptyIcon,

    #[error("target count must be at least 1, got {0}")]
    InvalidTarget(u32),
}

/// Errors surfaced by the mutator to its caller.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("User not authenticated")]
    AuthRequired,

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Habit not found: {0}")]
    HabitNotFound(HabitId),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Result type for mutator operations.
pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
