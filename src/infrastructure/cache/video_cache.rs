//! Video asset cache.
//!
//! Videos are only ever materialized on disk; the asset handed to consumers
//! is the local file path.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::entities::{
    AssetKind, AssetSource, CacheKey, KeyStrategy, Loaded, Locator, VideoAsset,
};
use crate::domain::errors::CacheResult;
use crate::domain::ports::{AssetCachePort, ResourceFetcher};

use super::persistent_store::{PersistentStore, StoreUsage};
use super::single_flight::InFlight;

/// File extension of cached clips.
pub const VIDEO_EXTENSION: &str = "mp4";

/// Disk-only cache for remote video clips.
pub struct VideoCache {
    disk: PersistentStore,
    fetcher: Arc<dyn ResourceFetcher>,
    keys: KeyStrategy,
    in_flight: Option<InFlight>,
}

impl std::fmt::Debug for VideoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoCache")
            .field("root", &self.disk.root())
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl VideoCache {
    /// Opens a video cache persisting under `dir`.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be created.
    pub async fn open(
        dir: PathBuf,
        keys: KeyStrategy,
        single_flight: bool,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> CacheResult<Self> {
        let disk = PersistentStore::open_with_extension(dir, Some(VIDEO_EXTENSION)).await?;
        Ok(Self {
            disk,
            fetcher,
            keys,
            in_flight: single_flight.then(InFlight::new),
        })
    }

    /// Returns the storage key for a locator.
    #[must_use]
    pub fn key_for(&self, locator: &Locator) -> CacheKey {
        self.keys.derive(locator.as_str())
    }

    async fn local_path(&self, key: &CacheKey) -> Option<PathBuf> {
        self.disk
            .exists(key)
            .await
            .then(|| self.disk.path_for(key))
    }

    /// Resolves a clip to a local file, downloading it on a miss.
    ///
    /// The body is streamed into a temp file in the cache directory and
    /// renamed into place once complete.
    ///
    /// # Errors
    /// Returns the reason no file could be produced.
    pub async fn load(&self, input: &str) -> CacheResult<Loaded<VideoAsset>> {
        let locator = Locator::parse(input)?;
        let key = self.key_for(&locator);

        if let Some(path) = self.local_path(&key).await {
            return Ok(Loaded::new(key, path, AssetSource::DiskCache));
        }

        let _flight = match &self.in_flight {
            Some(flights) => {
                let guard = flights.acquire(&key).await;
                if let Some(path) = self.local_path(&key).await {
                    return Ok(Loaded::new(key, path, AssetSource::DiskCache));
                }
                Some(guard)
            }
            None => None,
        };

        debug!(key = %key, locator = %locator, "Downloading video from network");
        let temp = self.disk.temp_path(&key);
        let size = match self.fetcher.download_to(&locator, &temp).await {
            Ok(size) => size,
            Err(e) => {
                self.disk.discard_temp(&temp).await;
                return Err(e);
            }
        };

        let path = self.disk.commit_file(&key, &temp).await?;
        debug!(key = %key, size, "Video cached");
        Ok(Loaded::new(key, path, AssetSource::Network))
    }

    /// Removes one clip.
    pub async fn evict(&self, input: &str) {
        if let Ok(locator) = Locator::parse(input) {
            self.disk.evict(&self.key_for(&locator)).await;
        }
    }

    /// Returns disk usage.
    pub async fn disk_usage(&self) -> StoreUsage {
        self.disk.usage().await
    }
}

#[async_trait]
impl AssetCachePort for VideoCache {
    type Asset = VideoAsset;

    fn kind(&self) -> AssetKind {
        AssetKind::Video
    }

    async fn lookup(&self, input: &str) -> Option<VideoAsset> {
        let locator = match Locator::parse(input) {
            Ok(locator) => locator,
            Err(e) => {
                debug!(error = %e, "Rejected video lookup");
                return None;
            }
        };
        self.local_path(&self.key_for(&locator)).await
    }

    async fn fetch_if_needed(&self, input: &str) -> Option<VideoAsset> {
        match self.load(input).await {
            Ok(loaded) => Some(loaded.asset),
            Err(e) if e.is_invalid_locator() => {
                debug!(error = %e, "Rejected video fetch");
                None
            }
            Err(e) => {
                warn!(locator = input, error = %e, "Failed to fetch video");
                None
            }
        }
    }

    async fn clear(&self) {
        if let Err(e) = self.disk.clear().await {
            warn!(error = %e, "Failed to clear video disk cache");
        }
    }
}
