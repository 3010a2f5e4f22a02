//! Store error types.

use crate::domain::PoolId;

/// Errors from the persisted store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A price or status write referenced a station that has no row.
    /// Station rows are written first, in the same transaction.
    #[error("station {0} does not exist in the store")]
    MissingStation(PoolId),

    /// A stored row could not be decoded back into domain types
    #[error("corrupt store data: {message}")]
    Corrupt { message: String },
}

impl StoreError {
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        StoreError::Corrupt {
            message: message.into(),
        }
    }
}
