//! Provider trait - the seam between the engine and an external
//! control plane.
//!
//! The engine never talks to a cloud directly; it issues create,
//! update, and delete calls through this trait and reacts to the
//! error tag. Implementations live outside the engine crate.

use crate::resource::PropertyMap;
use thiserror::Error;

/// Errors returned by provider calls, tagged for retry logic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Rate limiting, transient network failure - worth retrying
    #[error("transient provider error: {message}")]
    Transient {
        /// Detail from the failed call
        message: String,
    },

    /// Validation, permission, unknown resource - never retried
    #[error("permanent provider error: {message}")]
    Permanent {
        /// Detail from the failed call
        message: String,
    },
}

impl ProviderError {
    /// Create a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        ProviderError::Transient {
            message: message.into(),
        }
    }

    /// Create a permanent error.
    pub fn permanent(message: impl Into<String>) -> Self {
        ProviderError::Permanent {
            message: message.into(),
        }
    }

    /// Whether this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient { .. })
    }

    /// The underlying message.
    pub fn message(&self) -> &str {
        match self {
            ProviderError::Transient { message } | ProviderError::Permanent { message } => message,
        }
    }
}

/// Result type for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// An external control plane that physically creates, updates, and
/// deletes resources.
///
/// Implementations must be safe to call from multiple worker threads:
/// the executor issues calls for independent resources concurrently.
pub trait Provider: Send + Sync {
    /// Short provider name for logging and summaries.
    fn name(&self) -> &str;

    /// Create a resource, returning its provider-assigned physical id.
    fn create(&self, resource_type: &str, properties: &PropertyMap) -> ProviderResult<String>;

    /// Update a resource in place.
    fn update(&self, physical_id: &str, properties: &PropertyMap) -> ProviderResult<()>;

    /// Delete a resource.
    fn delete(&self, physical_id: &str) -> ProviderResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_is_retryable() {
        assert!(ProviderError::transient("throttled").is_retryable());
        assert!(!ProviderError::permanent("access denied").is_retryable());
    }

    #[test]
    fn test_message() {
        assert_eq!(ProviderError::transient("throttled").message(), "throttled");
        assert_eq!(
            ProviderError::permanent("access denied").message(),
            "access denied"
        );
    }
}
