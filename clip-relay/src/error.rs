//! Error types for cliplink-relay.

use cliplink_types::TypesError;
use std::fmt;
use std::path::PathBuf;

/// Top-level error for the relay binary.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Synchronization core error.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },

    /// A stored row could not be decoded into the model.
    #[error("corrupt row in {table}: {reason}")]
    Corrupt {
        /// Table the row came from.
        table: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

/// Entity kinds that can be looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// A channel.
    Channel,
    /// A device.
    Device,
    /// A device's membership in a channel.
    Membership,
    /// A clipboard item.
    ClipboardItem,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Channel => "channel",
            Entity::Device => "device",
            Entity::Membership => "membership",
            Entity::ClipboardItem => "clipboard item",
        })
    }
}

/// Errors surfaced by the synchronization core.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Referenced entity does not exist (in the given channel, where scoped).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity.
        entity: Entity,
        /// Identifier that was looked up.
        id: String,
    },

    /// Malformed identifier or missing required field.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong.
        reason: String,
    },

    /// Explicit channel creation collided with an existing id.
    #[error("channel already exists: {channel_id}")]
    AlreadyExists {
        /// The colliding channel id.
        channel_id: String,
    },

    /// Underlying persistence failed.
    #[error("storage unavailable: {0}")]
    Storage(#[from] StorageError),
}

impl SyncError {
    /// Shorthand for a not-found error.
    pub fn not_found(entity: Entity, id: impl ToString) -> Self {
        SyncError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for an invalid-input error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        SyncError::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Whether this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Storage(StorageError::Database(err))
    }
}

impl From<TypesError> for SyncError {
    fn from(err: TypesError) -> Self {
        SyncError::InvalidInput {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for core operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
