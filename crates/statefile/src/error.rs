//! Error types for state persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur reading or writing state records.
#[derive(Debug, Error)]
pub enum StateError {
    /// A record file is unreadable, unparsable, or fails its checksum.
    ///
    /// Fatal: the operator must inspect the file. Corrupt records are
    /// never silently discarded.
    #[error("corrupt state record {path}: {reason}")]
    Corruption {
        /// Path of the offending record file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("failed to serialize state record: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Result type for state persistence.
pub type Result<T> = std::result::Result<T, StateError>;
