//! Errors returned by the storage engine.
//!
//! Allocation failure is deliberately absent: the allocator aborts the
//! process instead of reporting it per command.

use crate::storage::scalar::ScalarError;
use thiserror::Error;

/// Result type for storage engine operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Typed failures of a single engine call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The key does not exist or has expired
    #[error("key not found")]
    NotFound,

    /// The stored value has a different type than the operation needs
    #[error("WRONGTYPE operation against a key holding the wrong kind of value")]
    WrongType,

    /// A malformed or out-of-range argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl StorageError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        StorageError::InvalidArgument(msg.into())
    }
}

impl From<ScalarError> for StorageError {
    fn from(_: ScalarError) -> Self {
        // The engine sizes every region itself, so the only way to trip the
        // scalar layer is to ask a value for the wrong encoding.
        StorageError::WrongType
    }
}
