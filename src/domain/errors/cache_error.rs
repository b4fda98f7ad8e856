//! Cache error types.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Reasons an asset could not be produced.
///
/// These never cross the public asset-cache boundary; they are logged and
/// collapsed into "no asset".
#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum CacheError {
    #[error("invalid locator '{locator}': {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("network error: {0}")]
    NetworkFailure(String),

    #[error("decode error: {0}")]
    DecodeFailure(String),

    #[error("storage error: {0}")]
    StorageFailure(String),
}

impl CacheError {
    /// Creates invalid locator error.
    #[must_use]
    pub fn invalid_locator(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLocator {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure(message.into())
    }

    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::DecodeFailure(message.into())
    }

    /// Creates storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageFailure(message.into())
    }

    /// Returns true for malformed locators, which are expected input noise
    /// rather than an operational problem.
    #[must_use]
    pub const fn is_invalid_locator(&self) -> bool {
        matches!(self, Self::InvalidLocator { .. })
    }
}
