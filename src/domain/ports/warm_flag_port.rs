//! Port definition for the one-shot prefetch flag.

use async_trait::async_trait;

use crate::domain::errors::CacheResult;

/// Persisted marker recording that the startup prefetch has completed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WarmFlagPort: Send + Sync {
    /// Returns true once the startup prefetch has completed.
    async fn is_warm(&self) -> bool;

    /// Records that the startup prefetch has completed.
    async fn mark_warm(&self) -> CacheResult<()>;

    /// Clears the flag so the next prefetch runs again.
    async fn reset(&self) -> CacheResult<()>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory warm flag for testing.
    #[derive(Clone, Default)]
    pub struct MemoryWarmFlag {
        warm: Arc<AtomicBool>,
    }

    impl MemoryWarmFlag {
        /// Creates an unset flag.
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a flag that is already set.
        pub fn warm() -> Self {
            let flag = Self::default();
            flag.warm.store(true, Ordering::SeqCst);
            flag
        }
    }

    #[async_trait]
    impl WarmFlagPort for MemoryWarmFlag {
        async fn is_warm(&self) -> bool {
            self.warm.load(Ordering::SeqCst)
        }

        async fn mark_warm(&self) -> CacheResult<()> {
            self.warm.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn reset(&self) -> CacheResult<()> {
            self.warm.store(false, Ordering::SeqCst);
            Ok(())
        }
    }
}
