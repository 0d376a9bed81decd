//! Sandbox configuration with builder pattern.

use std::path::PathBuf;
use std::time::Duration;

/// Size of a WebAssembly linear-memory page in KiB.
pub const WASM_PAGE_SIZE_KIB: u64 = 64;

/// Size of a WebAssembly linear-memory page in bytes.
pub const WASM_PAGE_SIZE: u64 = WASM_PAGE_SIZE_KIB * 1024;

/// Largest page count a 32-bit linear memory can address (4 GiB).
pub const MAX_WASM32_PAGES: u64 = 65_536;

/// Convert a memory limit in MiB to WebAssembly pages.
///
/// Saturates instead of wrapping, so an absurd limit stays out of range and
/// is rejected at load.
pub const fn mib_to_pages(mib: u64) -> u64 {
    mib.saturating_mul(1024) / WASM_PAGE_SIZE_KIB
}

/// Configuration for the pattern-matching sandbox.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Path to the compiled guest module.
    pub module_path: PathBuf,
    /// Linear-memory ceiling for each guest instance, in pages.
    pub memory_limit_pages: u64,
    /// Per-call time budget used by the tool adapter.
    pub timeout: Duration,
    /// Epoch interruption interval for cooperative timeout.
    pub epoch_tick_interval: Duration,
    /// Largest encoded request handed to the guest.
    pub max_input_bytes: usize,
    /// Largest response collected from the guest's stdout.
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            module_path: PathBuf::from("assets/regex_guest.wasm"),
            memory_limit_pages: mib_to_pages(64),
            timeout: Duration::from_millis(100),
            epoch_tick_interval: Duration::from_millis(5),
            max_input_bytes: 1024 * 1024, // matches the guest's own read cap
            max_output_bytes: 64 * 1024,
        }
    }
}

impl SandboxConfig {
    /// Create a new builder for SandboxConfig.
    pub fn builder() -> SandboxConfigBuilder {
        SandboxConfigBuilder::default()
    }

    /// Memory ceiling in bytes.
    pub fn memory_limit_bytes(&self) -> u64 {
        self.memory_limit_pages.saturating_mul(WASM_PAGE_SIZE)
    }
}

/// Builder for creating SandboxConfig instances.
#[derive(Debug, Clone, Default)]
pub struct SandboxConfigBuilder {
    module_path: Option<PathBuf>,
    memory_limit_pages: Option<u64>,
    timeout: Option<Duration>,
    epoch_tick_interval: Option<Duration>,
    max_input_bytes: Option<usize>,
    max_output_bytes: Option<usize>,
}

impl SandboxConfigBuilder {
    /// Set the path to the guest module.
    pub fn module_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.module_path = Some(path.into());
        self
    }

    /// Set the memory limit in WebAssembly pages.
    pub fn memory_limit_pages(mut self, pages: u64) -> Self {
        self.memory_limit_pages = Some(pages);
        self
    }

    /// Set the memory limit in MiB.
    pub fn memory_limit_mib(self, mib: u64) -> Self {
        self.memory_limit_pages(mib_to_pages(mib))
    }

    /// Set the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the epoch tick interval for timeout checking.
    pub fn epoch_tick_interval(mut self, interval: Duration) -> Self {
        self.epoch_tick_interval = Some(interval);
        self
    }

    pub fn max_input_bytes(mut self, bytes: usize) -> Self {
        self.max_input_bytes = Some(bytes);
        self
    }

    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = Some(bytes);
        self
    }

    /// Build the SandboxConfig.
    pub fn build(self) -> SandboxConfig {
        let default = SandboxConfig::default();
        SandboxConfig {
            module_path: self.module_path.unwrap_or(default.module_path),
            memory_limit_pages: self.memory_limit_pages.unwrap_or(default.memory_limit_pages),
            timeout: self.timeout.unwrap_or(default.timeout),
            epoch_tick_interval: self.epoch_tick_interval.unwrap_or(default.epoch_tick_interval),
            max_input_bytes: self.max_input_bytes.unwrap_or(default.max_input_bytes),
            max_output_bytes: self.max_output_bytes.unwrap_or(default.max_output_bytes),
        }
    }
}
