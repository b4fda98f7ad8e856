//! Coverstash - local media cache and prefetcher.
//!
//! This crate keeps remotely hosted cover art and slide clips in a two-tier
//! cache (decoded images in memory, files on disk) and warms it in bounded
//! concurrent batches.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing use cases and DTOs.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "coverstash";
