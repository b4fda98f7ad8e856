//! Wires the caches, the fetcher, the warm flag and the orchestrator together.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::application::PrefetchOrchestrator;
use crate::domain::errors::CacheResult;
use crate::domain::ports::{AssetCachePort, ResourceFetcher, WarmFlagPort};
use crate::infrastructure::cache::{CacheStats, ImageCache, StoreUsage, VideoCache};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http::HttpFetcher;
use crate::infrastructure::settings::WarmFlag;

/// Cache usage snapshot.
#[derive(Debug, Clone)]
pub struct MediaStats {
    /// Image memory tier.
    pub memory: CacheStats,
    /// Image disk tier.
    pub images: StoreUsage,
    /// Video disk tier.
    pub videos: StoreUsage,
}

/// Explicitly constructed cache instances shared by every consumer.
#[derive(Clone)]
pub struct MediaServices {
    images: Arc<ImageCache>,
    videos: Arc<VideoCache>,
    prefetch: PrefetchOrchestrator,
}

impl MediaServices {
    /// Builds the services from configuration.
    ///
    /// `settings_path` is the warm flag file; it must live outside the cache root.
    ///
    /// # Errors
    /// Returns error if the HTTP client or a cache directory cannot be created.
    pub async fn from_config(
        config: &AppConfig,
        settings_path: std::path::PathBuf,
    ) -> CacheResult<Self> {
        let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(
            config.network.timeout_secs,
        ))?);
        let warm_flag = Arc::new(WarmFlag::at(settings_path));
        Self::with_parts(config, fetcher, warm_flag).await
    }

    /// Builds the services around an existing fetcher and warm flag.
    ///
    /// # Errors
    /// Returns error if a cache directory cannot be created.
    pub async fn with_parts(
        config: &AppConfig,
        fetcher: Arc<dyn ResourceFetcher>,
        warm_flag: Arc<dyn WarmFlagPort>,
    ) -> CacheResult<Self> {
        let cache = &config.cache;
        let images = Arc::new(
            ImageCache::open(cache.images_path(), &cache.image_cache(), Arc::clone(&fetcher))
                .await?,
        );
        let videos = Arc::new(
            VideoCache::open(
                cache.videos_path(),
                cache.key_strategy,
                cache.single_flight,
                fetcher,
            )
            .await?,
        );

        let prefetch = PrefetchOrchestrator::new(
            images.clone(),
            videos.clone(),
            warm_flag,
            config.network.max_concurrent_fetches,
        );

        info!(root = %cache.effective_root().display(), "Media caches ready");
        Ok(Self {
            images,
            videos,
            prefetch,
        })
    }

    /// Returns the image cache.
    #[must_use]
    pub fn images(&self) -> &Arc<ImageCache> {
        &self.images
    }

    /// Returns the video cache.
    #[must_use]
    pub fn videos(&self) -> &Arc<VideoCache> {
        &self.videos
    }

    /// Returns the prefetch orchestrator.
    #[must_use]
    pub fn prefetch(&self) -> &PrefetchOrchestrator {
        &self.prefetch
    }

    /// Clears both caches. The warm flag is left as is.
    pub async fn clear_all(&self) {
        self.images.clear().await;
        self.videos.clear().await;
    }

    /// Returns memory and disk usage of both caches.
    pub async fn stats(&self) -> MediaStats {
        MediaStats {
            memory: self.images.memory_stats(),
            images: self.images.disk_usage().await,
            videos: self.videos.disk_usage().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::PrefetchRequest;
    use crate::domain::ports::mocks::{MemoryWarmFlag, MockFetcher};
    use crate::infrastructure::cache::transform::tests::png_bytes;
    use tempfile::TempDir;

    const COVER: &str = "https://cdn.example.com/covers/1.jpg";
    const CLIP: &str = "https://cdn.example.com/slides/1.mp4";

    async fn services(temp: &TempDir, flag: MemoryWarmFlag) -> MediaServices {
        let mut config = AppConfig::default();
        config.cache.root = Some(temp.path().join("cache"));
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_response(COVER, png_bytes(16, 16, false))
                .with_response(CLIP, &b"ftypmp42"[..]),
        );
        MediaServices::with_parts(&config, fetcher, Arc::new(flag))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_layout_under_cache_root() {
        let temp = TempDir::new().unwrap();
        let services = services(&temp, MemoryWarmFlag::new()).await;

        services.images().fetch_if_needed(COVER).await.unwrap();
        let clip = services.videos().fetch_if_needed(CLIP).await.unwrap();

        assert!(temp.path().join("cache").join("covers").is_dir());
        assert_eq!(clip.parent().unwrap(), temp.path().join("cache").join("videos"));

        let stats = services.stats().await;
        assert_eq!(stats.images.files, 1);
        assert_eq!(stats.videos.files, 1);
        assert_eq!(stats.memory.size, 1);
    }

    #[tokio::test]
    async fn test_clear_all_keeps_warm_flag() {
        let temp = TempDir::new().unwrap();
        let flag = MemoryWarmFlag::new();
        let services = services(&temp, flag.clone()).await;

        services
            .prefetch()
            .prefetch_if_needed(vec![PrefetchRequest::image(COVER), PrefetchRequest::video(CLIP)])
            .await;
        services.clear_all().await;

        assert!(flag.is_warm().await);
        assert!(services.images().lookup(COVER).await.is_none());
        assert!(services.videos().lookup(CLIP).await.is_none());
        assert_eq!(services.stats().await.memory.size, 0);
    }
}
