//! Application configuration.

pub mod app_config;
pub mod args;
pub mod storage;

pub use app_config::{AppConfig, CacheConfig, LogLevel, NetworkConfig};
pub use args::{CliArgs, ClearTarget, Command};
pub use storage::{ConfigError, StorageManager, save_to_file};
