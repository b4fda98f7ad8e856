//! Prefetch DTOs.

use crate::domain::entities::{AssetKind, CatalogEntity, EntityRef, Slide};

/// One asset to warm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchRequest {
    /// Which cache the asset belongs to.
    pub kind: AssetKind,
    /// Remote locator as supplied by the catalog.
    pub locator: String,
    /// Entity the locator came from, if known.
    pub entity: Option<EntityRef>,
}

impl PrefetchRequest {
    /// Creates an image request.
    #[must_use]
    pub fn image(locator: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Image,
            locator: locator.into(),
            entity: None,
        }
    }

    /// Creates a video request.
    #[must_use]
    pub fn video(locator: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Video,
            locator: locator.into(),
            entity: None,
        }
    }

    /// Attaches the originating entity.
    #[must_use]
    pub fn with_entity(mut self, entity: EntityRef) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Builds an image request from a catalog entity that has a locator.
    pub fn for_entity<E: CatalogEntity + ?Sized>(entity: &E) -> Option<Self> {
        let request = Self::image(entity.locator()?);
        Some(match entity.entity_ref() {
            Some(id) => request.with_entity(id),
            None => request,
        })
    }

    /// Builds the image and video requests for a reader slide.
    #[must_use]
    pub fn for_slide(slide: &Slide) -> Vec<Self> {
        let id = EntityRef::Slide(slide.id.clone());
        slide
            .image_url
            .iter()
            .map(|url| Self::image(url.as_str()).with_entity(id.clone()))
            .chain(
                slide
                    .video_mp4_url
                    .iter()
                    .map(|url| Self::video(url.as_str()).with_entity(id.clone())),
            )
            .collect()
    }
}

/// Counters for one prefetch batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    /// Distinct requests after deduplication.
    pub requested: usize,
    /// Requests whose fetch produced an asset.
    pub fetched: usize,
    /// Requests whose fetch produced nothing.
    pub failed: usize,
    /// Assets resolved again during the warm pass.
    pub warmed: usize,
}

impl std::fmt::Display for PrefetchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requested: {}, fetched: {}, failed: {}, warmed: {}",
            self.requested, self.fetched, self.failed, self.warmed
        )
    }
}

/// Result of a flag-gated prefetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    /// The warm flag was already set; nothing was done.
    AlreadyWarm,
    /// No usable locators; the flag was set without network activity.
    Empty,
    /// Both passes ran.
    Completed(PrefetchReport),
}

impl PrefetchOutcome {
    /// Returns the batch report, if a batch ran.
    #[must_use]
    pub const fn report(&self) -> Option<&PrefetchReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::AlreadyWarm | Self::Empty => None,
        }
    }
}
