//! Remote resource locator value object.

use std::fmt;

use reqwest::Url;

use crate::domain::errors::{CacheError, CacheResult};

/// A validated absolute network address for a remote asset.
///
/// Keys are derived from [`Locator::as_str`], which is the caller's string
/// with surrounding whitespace removed, not the normalized URL. Two spellings
/// of the same URL therefore map to two cache entries.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    raw: String,
    url: Url,
}

impl Locator {
    /// Parses and validates a locator string.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidLocator`] if the string is not an absolute
    /// `http`/`https` URL with a host.
    pub fn parse(input: &str) -> CacheResult<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(CacheError::invalid_locator(input, "empty locator"));
        }

        let url = Url::parse(raw).map_err(|e| CacheError::invalid_locator(input, e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(CacheError::invalid_locator(
                input,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(CacheError::invalid_locator(input, "missing host"));
        }

        Ok(Self {
            raw: raw.to_string(),
            url,
        })
    }

    /// Returns the locator string used for key derivation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the parsed URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Locator").field(&self.raw).finish()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<&str> for Locator {
    type Error = CacheError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}
