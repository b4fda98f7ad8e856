//! Application layer with use cases and DTOs.

/// Data transfer objects.
pub mod dto;
/// Use case implementations.
pub mod use_cases;

pub use dto::{PrefetchOutcome, PrefetchReport, PrefetchRequest};
pub use use_cases::{PrefetchOrchestrator, collect_slide_requests, collect_startup_requests};
