//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::entities::KeyStrategy;
use crate::infrastructure::cache::{
    DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION, DEFAULT_MEMORY_CAPACITY, ImageCacheConfig,
};
use crate::infrastructure::http::DEFAULT_TIMEOUT_SECS;

use super::args::CliArgs;

pub(crate) const APP_NAME: &str = "coverstash";
pub(crate) const APP_QUALIFIER: &str = "app";
pub(crate) const APP_ORGANIZATION: &str = "booksana";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Network configuration.
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache root. Defaults to the platform cache directory.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Directory name for images under the root.
    #[serde(default = "default_images_dir")]
    pub images_dir: String,

    /// Directory name for videos under the root.
    #[serde(default = "default_videos_dir")]
    pub videos_dir: String,

    /// Maximum decoded images kept in memory.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    /// Bound on either dimension of persisted images.
    #[serde(default = "default_max_image_dimension")]
    pub max_image_dimension: u32,

    /// JPEG quality for re-encoded images.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// How locators become file names.
    #[serde(default)]
    pub key_strategy: KeyStrategy,

    /// Share one download between concurrent requests for the same asset.
    #[serde(default = "default_true")]
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            images_dir: default_images_dir(),
            videos_dir: default_videos_dir(),
            memory_capacity: default_memory_capacity(),
            max_image_dimension: default_max_image_dimension(),
            jpeg_quality: default_jpeg_quality(),
            key_strategy: KeyStrategy::default(),
            single_flight: true,
        }
    }
}

impl CacheConfig {
    /// Returns the effective cache root.
    #[must_use]
    pub fn effective_root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(default_cache_root)
    }

    /// Returns the image cache directory.
    #[must_use]
    pub fn images_path(&self) -> PathBuf {
        self.effective_root().join(&self.images_dir)
    }

    /// Returns the video cache directory.
    #[must_use]
    pub fn videos_path(&self) -> PathBuf {
        self.effective_root().join(&self.videos_dir)
    }

    /// Returns the settings for the image cache.
    #[must_use]
    pub fn image_cache(&self) -> ImageCacheConfig {
        ImageCacheConfig {
            memory_capacity: self.memory_capacity,
            max_dimension: self.max_image_dimension,
            jpeg_quality: self.jpeg_quality,
            key_strategy: self.key_strategy,
            single_flight: self.single_flight,
        }
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum downloads in flight during a prefetch batch.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

fn default_images_dir() -> String {
    "covers".to_string()
}

fn default_videos_dir() -> String {
    "videos".to_string()
}

fn default_memory_capacity() -> usize {
    DEFAULT_MEMORY_CAPACITY
}

fn default_max_image_dimension() -> u32 {
    DEFAULT_MAX_DIMENSION
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_true() -> bool {
    true
}

/// Returns the platform cache directory for the application.
fn default_cache_root() -> PathBuf {
    ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME).map_or_else(
        || std::env::temp_dir().join(APP_NAME).join("cache"),
        |dirs| dirs.cache_dir().to_path_buf(),
    )
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(cache_root) = &args.cache_root {
            self.cache.root = Some(cache_root.clone());
        }
        if let Some(max_dimension) = args.max_image_dimension {
            self.cache.max_image_dimension = max_dimension;
        }
        if let Some(concurrency) = args.concurrency {
            self.network.max_concurrent_fetches = concurrency;
        }
        if let Some(timeout) = args.timeout_secs {
            self.network.timeout_secs = timeout;
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("coverstash.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
            log_level = "debug"

            [cache]
            root = "/var/cache/covers"
            max_image_dimension = 512
            key_strategy = "sanitized"

            [network]
            max_concurrent_fetches = 2
        "#;

        let config: AppConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.cache.max_image_dimension, 512);
        assert_eq!(config.cache.key_strategy, KeyStrategy::Sanitized);
        assert_eq!(config.cache.images_dir, "covers");
        assert!(config.cache.single_flight);
        assert_eq!(config.network.max_concurrent_fetches, 2);
        assert_eq!(config.network.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(
            config.cache.images_path(),
            PathBuf::from("/var/cache/covers/covers")
        );
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.cache.max_image_dimension, 1024);
        assert_eq!(config.cache.videos_dir, "videos");
        assert_eq!(config.network.max_concurrent_fetches, 8);
    }

    #[test]
    fn test_merge_with_args() {
        let args = CliArgs::parse_from([
            "coverstash",
            "--cache-root",
            "/tmp/cs",
            "--concurrency",
            "3",
            "--log-level",
            "warn",
            "stats",
        ]);
        let mut config = AppConfig::default();

        config.merge_with_args(&args);

        assert_eq!(config.cache.root, Some(PathBuf::from("/tmp/cs")));
        assert_eq!(config.network.max_concurrent_fetches, 3);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.cache.max_image_dimension, 1024);
    }

    #[test]
    fn test_image_cache_settings() {
        let mut config = CacheConfig::default();
        config.single_flight = false;
        config.jpeg_quality = 70;

        let image = config.image_cache();

        assert!(!image.single_flight);
        assert_eq!(image.jpeg_quality, 70);
        assert_eq!(image.memory_capacity, DEFAULT_MEMORY_CAPACITY);
    }
}
