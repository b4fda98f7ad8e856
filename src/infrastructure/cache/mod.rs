//! Media caching.
//!
//! This module provides:
//! - Memory caching with LRU eviction
//! - Atomic, directory-backed persistence
//! - Decode and downscale of fetched images
//! - Image and video asset caches built on the above

pub mod image_cache;
pub mod memory_store;
pub mod persistent_store;
pub mod single_flight;
pub mod transform;
pub mod video_cache;

pub use image_cache::{ImageCache, ImageCacheConfig};
pub use memory_store::{CacheStats, DEFAULT_MEMORY_CAPACITY, MemoryStore};
pub use persistent_store::{PersistentStore, StoreUsage};
pub use single_flight::InFlight;
pub use transform::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION, ImageTransform};
pub use video_cache::{VIDEO_EXTENSION, VideoCache};
