//! Domain entities and value objects.

mod asset;
mod cache_key;
mod catalog;
mod locator;

pub use asset::{AssetKind, AssetSource, ImageAsset, Loaded, VideoAsset};
pub use cache_key::{CacheKey, KeyStrategy, MAX_SANITIZED_KEY_LEN};
pub use catalog::{Book, Catalog, CatalogEntity, Category, EntityRef, Slide};
pub use locator::Locator;
