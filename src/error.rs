use thiserror::Error;

use crate::blob_store::BlobStoreError;
use crate::storage::DatabaseError;

/// Errors raised by catalog, ledger and share operations.
///
/// `NotFound` covers both "absent" and "not visible to the requester" so that
/// the existence of another user's private files is never revealed.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Not enough storage space. You have {available} bytes available.")]
    QuotaExceeded { available: u64 },
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    InvalidHierarchy(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = DriveError> = std::result::Result<T, E>;

impl From<BlobStoreError> for DriveError {
    fn from(e: BlobStoreError) -> Self {
        match e {
            BlobStoreError::NotFound(_) | BlobStoreError::InvalidKey(_) => {
                DriveError::NotFound("File content")
            }
            other => DriveError::StorageUnavailable(other.to_string()),
        }
    }
}

// redb and msgpack errors raised inside catalog transactions funnel through
// DatabaseError so `?` works in methods returning DriveError.
macro_rules! via_database_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for DriveError {
                fn from(e: $ty) -> Self {
                    DriveError::Database(DatabaseError::from(e))
                }
            }
        )*
    };
}

via_database_error!(
    redb::CommitError,
    redb::StorageError,
    redb::TableError,
    redb::TransactionError,
    rmp_serde::decode::Error,
    rmp_serde::encode::Error,
);
