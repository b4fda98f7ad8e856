//! Command-line arguments.

use super::app_config::LogLevel;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "coverstash",
    version,
    about = "Local cache and prefetcher for catalog cover art and slide videos",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Cache root directory.
    #[arg(long, value_name = "PATH", global = true)]
    pub cache_root: Option<PathBuf>,

    /// Bound on either dimension of persisted images.
    #[arg(long, global = true)]
    pub max_image_dimension: Option<u32>,

    /// Maximum downloads in flight during a prefetch.
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Request timeout in seconds.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Warm the caches from a catalog JSON file, once per installation.
    Prefetch {
        /// Catalog file with `books`, `categories` and `slides`.
        #[arg(value_name = "CATALOG")]
        catalog: PathBuf,

        /// Also prefetch slide images and videos.
        #[arg(long)]
        slides: bool,

        /// Ignore the warm flag and prefetch anyway.
        #[arg(long)]
        force: bool,
    },

    /// Fetch one asset into the cache.
    Fetch {
        /// Remote locator.
        url: String,

        /// Treat the locator as a video clip.
        #[arg(long)]
        video: bool,
    },

    /// Check whether an asset is cached without fetching.
    Lookup {
        /// Remote locator.
        url: String,

        /// Treat the locator as a video clip.
        #[arg(long)]
        video: bool,
    },

    /// Show cache usage.
    Stats,

    /// Remove cached assets.
    Clear {
        /// Which cache to clear.
        #[arg(value_enum, default_value_t = ClearTarget::All)]
        target: ClearTarget,
    },

    /// Forget that the startup prefetch has run.
    ResetWarm,
}

/// Cache selected by `clear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClearTarget {
    /// Image cache, both tiers.
    Images,
    /// Video cache.
    Videos,
    /// Both caches.
    All,
}
