//! Storage keys derived from locators.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Longest sanitized key accepted before falling back to the digest.
pub const MAX_SANITIZED_KEY_LEN: usize = 200;

/// Fixed-length, filesystem-safe storage address for a locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for a locator string as the lowercase hex SHA-256 digest.
    ///
    /// Pure and total: the same input always yields the same 64-character key.
    #[must_use]
    pub fn derive(locator: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(locator.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Derives a readable key by replacing every character outside
    /// `[A-Za-z0-9_-]` with `-`.
    ///
    /// Distinct locators can collide under this scheme.
    #[must_use]
    pub fn sanitized(locator: &str) -> Self {
        let key = locator
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        Self(key)
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How locators are turned into storage keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    /// SHA-256 hex digest.
    #[default]
    Digest,
    /// Sanitized locator text, for inspecting a cache directory by eye.
    Sanitized,
}

impl KeyStrategy {
    /// Derives a key with this strategy.
    ///
    /// Sanitized keys that are empty or longer than [`MAX_SANITIZED_KEY_LEN`]
    /// use the digest instead so the result is always a usable filename.
    #[must_use]
    pub fn derive(self, locator: &str) -> CacheKey {
        match self {
            Self::Digest => CacheKey::derive(locator),
            Self::Sanitized => {
                let key = CacheKey::sanitized(locator);
                if key.0.is_empty() || key.0.len() > MAX_SANITIZED_KEY_LEN {
                    CacheKey::derive(locator)
                } else {
                    key
                }
            }
        }
    }
}
