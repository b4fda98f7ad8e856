//! Batch warm-up of the asset caches.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::application::dto::{PrefetchOutcome, PrefetchReport, PrefetchRequest};
use crate::domain::entities::{
    AssetKind, Book, Category, EntityRef, ImageAsset, Locator, Slide, VideoAsset,
};
use crate::domain::errors::CacheResult;
use crate::domain::ports::{AssetCachePort, WarmFlagPort};

/// Default bound on concurrently running prefetch tasks.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

type ImageCacheHandle = Arc<dyn AssetCachePort<Asset = ImageAsset>>;
type VideoCacheHandle = Arc<dyn AssetCachePort<Asset = VideoAsset>>;

#[derive(Clone)]
struct Caches {
    images: ImageCacheHandle,
    videos: VideoCacheHandle,
}

impl Caches {
    async fn fetch(&self, request: &PrefetchRequest) -> bool {
        match request.kind {
            AssetKind::Image => self.images.fetch_if_needed(&request.locator).await.is_some(),
            AssetKind::Video => self.videos.fetch_if_needed(&request.locator).await.is_some(),
        }
    }

    async fn lookup(&self, request: &PrefetchRequest) -> bool {
        match request.kind {
            AssetKind::Image => self.images.lookup(&request.locator).await.is_some(),
            AssetKind::Video => self.videos.lookup(&request.locator).await.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Pass {
    Fetch,
    Warm,
}

/// Drives two-pass prefetch batches against the image and video caches.
#[derive(Clone)]
pub struct PrefetchOrchestrator {
    caches: Caches,
    warm_flag: Arc<dyn WarmFlagPort>,
    permits: Arc<Semaphore>,
}

impl PrefetchOrchestrator {
    /// Creates a new orchestrator. `max_concurrent` is raised to at least one.
    #[must_use]
    pub fn new(
        images: ImageCacheHandle,
        videos: VideoCacheHandle,
        warm_flag: Arc<dyn WarmFlagPort>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            caches: Caches { images, videos },
            warm_flag,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Runs the startup batch unless it has already completed once.
    ///
    /// The warm flag is set only after both passes finish. Dropping the
    /// returned future aborts outstanding tasks and leaves the flag unset.
    pub async fn prefetch_if_needed(&self, requests: Vec<PrefetchRequest>) -> PrefetchOutcome {
        if self.warm_flag.is_warm().await {
            debug!("Caches already warm, skipping prefetch");
            return PrefetchOutcome::AlreadyWarm;
        }

        let requests = dedupe(requests);
        if requests.is_empty() {
            debug!("Nothing to prefetch");
            self.mark_warm().await;
            return PrefetchOutcome::Empty;
        }

        let report = self.run(&requests).await;
        self.mark_warm().await;
        info!(%report, "Startup prefetch completed");
        PrefetchOutcome::Completed(report)
    }

    /// Runs a batch regardless of the warm flag and without touching it.
    pub async fn prefetch_media(&self, requests: Vec<PrefetchRequest>) -> PrefetchReport {
        let requests = dedupe(requests);
        if requests.is_empty() {
            return PrefetchReport::default();
        }

        let report = self.run(&requests).await;
        debug!(%report, "Media prefetch completed");
        report
    }

    /// Returns true once the startup batch has completed.
    pub async fn is_warm(&self) -> bool {
        self.warm_flag.is_warm().await
    }

    /// Clears the warm flag so the next startup batch runs again.
    ///
    /// # Errors
    /// Returns error if the flag store cannot be written.
    pub async fn reset_warm_flag(&self) -> CacheResult<()> {
        self.warm_flag.reset().await?;
        info!("Warm flag cleared");
        Ok(())
    }

    async fn mark_warm(&self) {
        if let Err(e) = self.warm_flag.mark_warm().await {
            warn!(error = %e, "Failed to persist warm flag");
        }
    }

    async fn run(&self, requests: &[PrefetchRequest]) -> PrefetchReport {
        debug!(count = requests.len(), "Prefetch fetch pass");
        let fetched = self.run_pass(requests, Pass::Fetch).await;

        debug!(count = requests.len(), "Prefetch warm pass");
        let warmed = self.run_pass(requests, Pass::Warm).await;

        PrefetchReport {
            requested: requests.len(),
            fetched,
            failed: requests.len() - fetched,
            warmed,
        }
    }

    /// Runs one task per request and waits for all of them.
    async fn run_pass(&self, requests: &[PrefetchRequest], pass: Pass) -> usize {
        let mut tasks = JoinSet::new();

        for request in requests {
            let caches = self.caches.clone();
            let permits = Arc::clone(&self.permits);
            let request = request.clone();

            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return false;
                };
                match pass {
                    Pass::Fetch => caches.fetch(&request).await,
                    Pass::Warm => caches.lookup(&request).await,
                }
            });
        }

        let mut succeeded = 0;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(true) => succeeded += 1,
                Ok(false) => {}
                Err(e) => warn!(?pass, error = %e, "Prefetch task failed"),
            }
        }
        succeeded
    }
}

/// Drops duplicate and unusable requests, keeping first occurrences in order.
///
/// Requests are first collapsed by originating entity, then by locator.
fn dedupe(requests: Vec<PrefetchRequest>) -> Vec<PrefetchRequest> {
    let mut seen_entities: HashSet<(AssetKind, EntityRef)> = HashSet::new();
    let mut seen_locators: HashSet<(AssetKind, String)> = HashSet::new();

    requests
        .into_iter()
        .filter(|request| {
            if let Some(entity) = &request.entity
                && !seen_entities.insert((request.kind, entity.clone()))
            {
                return false;
            }
            if let Err(e) = Locator::parse(&request.locator) {
                debug!(error = %e, "Skipping prefetch request");
                return false;
            }
            seen_locators.insert((request.kind, request.locator.trim().to_string()))
        })
        .collect()
}

/// Builds the startup batch: book covers, then category images.
#[must_use]
pub fn collect_startup_requests(books: &[Book], categories: &[Category]) -> Vec<PrefetchRequest> {
    books
        .iter()
        .filter_map(PrefetchRequest::for_entity)
        .chain(categories.iter().filter_map(PrefetchRequest::for_entity))
        .collect()
}

/// Builds the on-demand batch for a reader: slide images and clips.
#[must_use]
pub fn collect_slide_requests(slides: &[Slide]) -> Vec<PrefetchRequest> {
    slides.iter().flat_map(PrefetchRequest::for_slide).collect()
}
