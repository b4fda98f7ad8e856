//! Data transfer objects for the application layer.

mod prefetch_dto;

pub use prefetch_dto::{PrefetchOutcome, PrefetchReport, PrefetchRequest};
