//! Domain types for cached media assets.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::CacheKey;

/// Decoded image held in memory.
pub type ImageAsset = Arc<image::DynamicImage>;

/// Local file materialized for a remote video.
pub type VideoAsset = PathBuf;

/// Kind of media an asset cache is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Cover images and slide pictures.
    Image,
    /// Short video clips.
    Video,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Where an asset was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSource {
    /// In-memory LRU tier.
    MemoryCache,
    /// Persistent tier.
    DiskCache,
    /// Downloaded during this call.
    Network,
}

impl fmt::Display for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory"),
            Self::DiskCache => write!(f, "disk"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// An asset together with its key and provenance.
#[derive(Debug, Clone)]
pub struct Loaded<A> {
    /// Storage key the asset lives under.
    pub key: CacheKey,
    /// The asset itself.
    pub asset: A,
    /// Tier that satisfied the request.
    pub source: AssetSource,
}

impl<A> Loaded<A> {
    /// Creates a new loaded asset.
    #[must_use]
    pub const fn new(key: CacheKey, asset: A, source: AssetSource) -> Self {
        Self { key, asset, source }
    }

    /// Returns true if no network request was needed.
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        !matches!(self.source, AssetSource::Network)
    }
}
