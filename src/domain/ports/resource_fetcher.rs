//! Port definition for network retrieval.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::entities::Locator;
use crate::domain::errors::{CacheError, CacheResult};

/// Fetches raw bytes for a remote locator.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Downloads the whole response body.
    ///
    /// # Errors
    /// Returns [`CacheError::NetworkFailure`] on transport errors and
    /// non-success statuses.
    async fn fetch(&self, locator: &Locator) -> CacheResult<Bytes>;

    /// Downloads the response body into `dest`, returning the byte count.
    ///
    /// The default buffers the body in memory; implementations may stream.
    ///
    /// # Errors
    /// Returns a network error if the download fails, or a storage error if
    /// `dest` cannot be written.
    async fn download_to(&self, locator: &Locator, dest: &Path) -> CacheResult<u64> {
        let bytes = self.fetch(locator).await?;
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| CacheError::storage(format!("Failed to write download: {e}")))?;
        Ok(bytes.len() as u64)
    }
}
