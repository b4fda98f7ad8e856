//! Infrastructure layer with external service adapters.

/// Image and video caches.
pub mod cache;
/// Application configuration.
pub mod config;
/// HTTP retrieval.
pub mod http;
/// Composition root for the media caches.
pub mod media_services;
/// Persisted flags.
pub mod settings;

pub use cache::{CacheStats, ImageCache, ImageCacheConfig, StoreUsage, VideoCache};
pub use config::{AppConfig, CliArgs, LogLevel, StorageManager};
pub use http::HttpFetcher;
pub use media_services::{MediaServices, MediaStats};
pub use settings::{SettingsStore, WarmFlag};
