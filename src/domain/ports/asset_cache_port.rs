//! Port definition for asset caches.

use async_trait::async_trait;

use crate::domain::entities::AssetKind;

/// A two-tier cache for one kind of remote asset.
///
/// Implementations must be safe to share between tasks. Every failure
/// (malformed locator, network, decode, storage) is absorbed and reported as
/// `None`.
#[async_trait]
pub trait AssetCachePort: Send + Sync {
    /// In-memory representation handed to consumers.
    type Asset: Clone + Send + Sync + 'static;

    /// Kind of asset this cache stores.
    fn kind(&self) -> AssetKind;

    /// Returns the asset from memory or disk without touching the network.
    async fn lookup(&self, locator: &str) -> Option<Self::Asset>;

    /// Returns the asset, downloading and caching it on a miss.
    async fn fetch_if_needed(&self, locator: &str) -> Option<Self::Asset>;

    /// Drops every cached entry in both tiers.
    async fn clear(&self);
}
