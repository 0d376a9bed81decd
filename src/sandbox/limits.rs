//! Resource limiting for guest instances.

use wasmtime::{ResourceLimiter, Store};
use wasmtime_wasi::preview1::WasiP1Ctx;

use crate::sandbox::config::WASM_PAGE_SIZE;

/// Resource limiter that bounds linear memory to a page count.
pub struct SandboxLimiter {
    /// Maximum memory in bytes.
    max_memory: u64,
    /// Peak memory allocation (highest ever seen).
    peak_memory: u64,
    /// Maximum table elements.
    max_table_elements: u64,
    /// Whether the limit has been exceeded.
    limit_exceeded: bool,
}

impl SandboxLimiter {
    /// Create a limiter allowing at most `max_pages` pages of linear memory.
    pub fn new(max_pages: u64) -> Self {
        Self {
            max_memory: max_pages.saturating_mul(WASM_PAGE_SIZE),
            peak_memory: 0,
            max_table_elements: 10_000,
            limit_exceeded: false,
        }
    }

    /// Check if any limit has been exceeded.
    pub fn limit_exceeded(&self) -> bool {
        self.limit_exceeded
    }

    /// Get the peak memory usage (highest ever observed).
    pub fn peak_memory(&self) -> u64 {
        self.peak_memory
    }

    /// Get the configured maximum memory.
    pub fn max_memory(&self) -> u64 {
        self.max_memory
    }
}

impl ResourceLimiter for SandboxLimiter {
    fn memory_growing(
        &mut self,
        _current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        let desired_bytes = desired as u64;

        if desired_bytes > self.max_memory {
            self.limit_exceeded = true;
            return Ok(false);
        }

        self.peak_memory = self.peak_memory.max(desired_bytes);
        Ok(true)
    }

    fn table_growing(
        &mut self,
        _current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        if desired as u64 > self.max_table_elements {
            self.limit_exceeded = true;
            return Ok(false);
        }
        Ok(true)
    }
}

/// Per-invocation store data: the limiter and the guest's WASI context.
pub struct StoreData {
    pub limiter: SandboxLimiter,
    pub wasi: WasiP1Ctx,
}

impl StoreData {
    pub fn new(max_pages: u64, wasi: WasiP1Ctx) -> Self {
        Self {
            limiter: SandboxLimiter::new(max_pages),
            wasi,
        }
    }
}

/// Extension trait for Store to configure resource limiting.
pub trait StoreLimiterExt {
    /// Configure the store with resource limiting enabled.
    fn configure_limiter(&mut self);
}

impl StoreLimiterExt for Store<StoreData> {
    fn configure_limiter(&mut self) {
        self.limiter(|data| &mut data.limiter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_allows_within_limit() {
        let mut limiter = SandboxLimiter::new(16); // 1 MiB

        let result = limiter.memory_growing(0, 512 * 1024, None).unwrap();
        assert!(result);
        assert!(!limiter.limit_exceeded());
        assert_eq!(limiter.peak_memory(), 512 * 1024);
    }

    #[test]
    fn test_limiter_allows_exactly_the_limit() {
        let mut limiter = SandboxLimiter::new(16);
        assert!(limiter.memory_growing(0, 16 * 64 * 1024, None).unwrap());
        assert_eq!(limiter.max_memory(), 1024 * 1024);
    }

    #[test]
    fn test_limiter_denies_over_limit() {
        let mut limiter = SandboxLimiter::new(16);

        let result = limiter.memory_growing(0, 17 * 64 * 1024, None).unwrap();
        assert!(!result);
        assert!(limiter.limit_exceeded());
        assert_eq!(limiter.peak_memory(), 0);
    }
}
