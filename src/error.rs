//! Error types for archetype_resource

use std::sync::Arc;
use thiserror::Error;

/// Main error type for resource operations
///
/// Cloneable so that a single failed load can be handed to every
/// continuation waiting on the same job.
#[derive(Error, Debug, Clone)]
pub enum ResourceError {
    #[error("No format loader supports '{path}'")]
    UnsupportedExtension { path: String },

    #[error("Failed to decode '{path}': {reason}")]
    Decode { path: String, reason: String },

    #[error("Format loader panicked while decoding '{path}'")]
    DecoderPanicked { path: String },

    #[error("Archive error for '{path}': {reason}")]
    Archive { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("Load request was cancelled")]
    Cancelled,

    #[error("Resource cache has been shut down")]
    ShutDown,
}

impl ResourceError {
    /// Convenience constructor for loader implementations
    pub fn decode(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Result type alias for resource operations
pub type Result<T> = std::result::Result<T, ResourceError>;
