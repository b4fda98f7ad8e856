//! HTTP retrieval of remote assets.

pub mod fetcher;

pub use fetcher::{DEFAULT_TIMEOUT_SECS, HttpFetcher};
