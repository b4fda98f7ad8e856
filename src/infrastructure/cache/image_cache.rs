//! Image asset cache.
//!
//! Implements a three-tier lookup: Memory -> Disk -> Network

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::domain::entities::{
    AssetKind, AssetSource, CacheKey, ImageAsset, KeyStrategy, Loaded, Locator,
};
use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::{AssetCachePort, ResourceFetcher};

use super::memory_store::{CacheStats, DEFAULT_MEMORY_CAPACITY, MemoryStore};
use super::persistent_store::{PersistentStore, StoreUsage};
use super::single_flight::InFlight;
use super::transform::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION, ImageTransform, Prepared};

/// Configuration for an [`ImageCache`].
#[derive(Debug, Clone)]
pub struct ImageCacheConfig {
    /// Maximum decoded images kept in memory.
    pub memory_capacity: usize,
    /// Bound on either dimension of persisted images.
    pub max_dimension: u32,
    /// JPEG quality for re-encoded downscales.
    pub jpeg_quality: u8,
    /// How locators become storage keys.
    pub key_strategy: KeyStrategy,
    /// Share one network request between concurrent misses for a key.
    pub single_flight: bool,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            key_strategy: KeyStrategy::Digest,
            single_flight: true,
        }
    }
}

/// Two-tier cache for remote images.
///
/// The memory tier holds images as decoded from the network; the disk tier
/// may hold a downscaled re-encode (see [`ImageTransform`]), so an image
/// reloaded from disk after a restart can be smaller than the original.
pub struct ImageCache {
    memory: MemoryStore<ImageAsset>,
    disk: PersistentStore,
    fetcher: Arc<dyn ResourceFetcher>,
    transform: ImageTransform,
    keys: KeyStrategy,
    in_flight: Option<InFlight>,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("root", &self.disk.root())
            .field("transform", &self.transform)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl ImageCache {
    /// Opens an image cache persisting under `dir`.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be created.
    pub async fn open(
        dir: PathBuf,
        config: &ImageCacheConfig,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> CacheResult<Self> {
        let disk = PersistentStore::open(dir).await?;
        Ok(Self::new(disk, config, fetcher))
    }

    /// Creates an image cache over an existing store.
    #[must_use]
    pub fn new(
        disk: PersistentStore,
        config: &ImageCacheConfig,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Self {
        Self {
            memory: MemoryStore::new(config.memory_capacity),
            disk,
            fetcher,
            transform: ImageTransform::new(config.max_dimension, config.jpeg_quality),
            keys: config.key_strategy,
            in_flight: config.single_flight.then(InFlight::new),
        }
    }

    /// Returns the storage key for a locator.
    #[must_use]
    pub fn key_for(&self, locator: &Locator) -> CacheKey {
        self.keys.derive(locator.as_str())
    }

    /// Checks memory, then disk. Never touches the network and never writes
    /// on a miss.
    async fn load_cached(&self, key: &CacheKey) -> Option<Loaded<ImageAsset>> {
        if let Some(img) = self.memory.get(key) {
            return Some(Loaded::new(key.clone(), img, AssetSource::MemoryCache));
        }

        let bytes = self.disk.read(key).await?;
        let result = tokio::task::spawn_blocking(move || ImageTransform::decode(&bytes)).await;

        let img = match result {
            Ok(Ok(img)) => Arc::new(img),
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Failed to decode cached image");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Decode task panicked");
                return None;
            }
        };

        debug!(key = %key, "Decoded image from disk cache");
        self.memory.set(key.clone(), img.clone());
        Some(Loaded::new(key.clone(), img, AssetSource::DiskCache))
    }

    /// Resolves an image from cache, falling back to the network.
    ///
    /// On a network fetch both tiers are populated before returning.
    ///
    /// # Errors
    /// Returns the reason no image could be produced.
    pub async fn load(&self, input: &str) -> CacheResult<Loaded<ImageAsset>> {
        let locator = Locator::parse(input)?;
        let key = self.key_for(&locator);

        if let Some(hit) = self.load_cached(&key).await {
            return Ok(hit);
        }

        let _flight = match &self.in_flight {
            Some(flights) => {
                let guard = flights.acquire(&key).await;
                if let Some(hit) = self.load_cached(&key).await {
                    trace!(key = %key, "Served by concurrent fetch");
                    return Ok(hit);
                }
                Some(guard)
            }
            None => None,
        };

        debug!(key = %key, locator = %locator, "Downloading image from network");
        let bytes = self.fetcher.fetch(&locator).await?;
        let img = self.persist(&key, bytes).await?;

        debug!(key = %key, source = "network", "Image loaded successfully");
        Ok(Loaded::new(key, img, AssetSource::Network))
    }

    /// Stores already downloaded bytes under a locator, replacing any
    /// cached copy.
    ///
    /// # Errors
    /// Returns error if the locator is invalid, the bytes are not an image,
    /// or the disk write fails.
    pub async fn store(&self, input: &str, bytes: Bytes) -> CacheResult<ImageAsset> {
        let locator = Locator::parse(input)?;
        let key = self.key_for(&locator);
        self.persist(&key, bytes).await
    }

    /// Decodes, writes the disk tier, then the memory tier.
    async fn persist(&self, key: &CacheKey, bytes: Bytes) -> CacheResult<ImageAsset> {
        let transform = self.transform;
        let Prepared {
            original,
            persisted,
            downscaled,
        } = tokio::task::spawn_blocking(move || transform.prepare(bytes))
            .await
            .map_err(|e| CacheError::decode(format!("Decode task panicked: {e}")))??;

        self.disk.write(key, &persisted).await?;

        let img = Arc::new(original);
        self.memory.set(key.clone(), img.clone());
        debug!(key = %key, downscaled, "Cached image in both tiers");
        Ok(img)
    }

    /// Removes one image from both tiers.
    ///
    /// The memory tier has no per-key removal, so this clears memory
    /// entirely if the image was resident.
    pub async fn evict(&self, input: &str) {
        let Ok(locator) = Locator::parse(input) else {
            return;
        };
        let key = self.key_for(&locator);
        if self.memory.peek(&key).is_some() {
            self.memory.clear();
        }
        self.disk.evict(&key).await;
    }

    /// Returns memory tier statistics.
    #[must_use]
    pub fn memory_stats(&self) -> CacheStats {
        self.memory.stats()
    }

    /// Returns disk tier usage.
    pub async fn disk_usage(&self) -> StoreUsage {
        self.disk.usage().await
    }
}

#[async_trait]
impl AssetCachePort for ImageCache {
    type Asset = ImageAsset;

    fn kind(&self) -> AssetKind {
        AssetKind::Image
    }

    async fn lookup(&self, input: &str) -> Option<ImageAsset> {
        let locator = match Locator::parse(input) {
            Ok(locator) => locator,
            Err(e) => {
                debug!(error = %e, "Rejected image lookup");
                return None;
            }
        };
        let key = self.key_for(&locator);
        self.load_cached(&key).await.map(|loaded| loaded.asset)
    }

    async fn fetch_if_needed(&self, input: &str) -> Option<ImageAsset> {
        match self.load(input).await {
            Ok(loaded) => Some(loaded.asset),
            Err(e) if e.is_invalid_locator() => {
                debug!(error = %e, "Rejected image fetch");
                None
            }
            Err(e) => {
                warn!(locator = input, error = %e, "Failed to fetch image");
                None
            }
        }
    }

    async fn clear(&self) {
        self.memory.clear();
        if let Err(e) = self.disk.clear().await {
            warn!(error = %e, "Failed to clear image disk cache");
        }
    }
}
