//! Use case implementations.

mod prefetch_orchestrator;

pub use prefetch_orchestrator::{
    DEFAULT_MAX_CONCURRENT, PrefetchOrchestrator, collect_slide_requests,
    collect_startup_requests,
};
