//! The invocation bridge between async callers and the synchronous guest.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use wasmtime_wasi::preview1::WasiP1Ctx;

use crate::error::{Result, SandboxError};
use crate::model::{MatchOutcome, MatchRequest};
use crate::sandbox::config::SandboxConfig;
use crate::sandbox::epoch::{self, EpochTicker};
use crate::sandbox::io::GuestIo;
use crate::sandbox::loader::{GuestHandle, RunStats, MEMORY_EXPORT};

/// A sandboxed pattern matcher backed by a guest WebAssembly module.
///
/// Safe to share across tasks. Every [`invoke`](Self::invoke) runs in its
/// own guest instance, so concurrent calls never observe each other's
/// memory, and a timed-out call leaves nothing behind for the next one.
pub struct PatternSandbox {
    config: SandboxConfig,
    handle: Arc<GuestHandle>,
    ticker: EpochTicker,
    closed: AtomicBool,
}

impl std::fmt::Debug for PatternSandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternSandbox")
            .field("config", &self.config)
            .field("handle", &self.handle)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl PatternSandbox {
    /// Load the guest module named by `config` and start the epoch ticker.
    ///
    /// Fails with [`SandboxError::Instantiation`] if the module cannot be
    /// used; nothing is left running in that case.
    pub fn new(config: SandboxConfig) -> Result<Self> {
        let handle = GuestHandle::load(&config.module_path, config.memory_limit_pages)?;
        let ticker = EpochTicker::start(handle.engine().clone(), config.epoch_tick_interval)
            .map_err(|e| SandboxError::instantiation(format!("failed to start epoch ticker: {e}")))?;

        tracing::info!(
            module = %config.module_path.display(),
            memory_limit_pages = config.memory_limit_pages,
            epoch_tick_ms = ticker.interval().as_millis() as u64,
            "guest module loaded"
        );

        Ok(Self {
            config,
            handle: Arc::new(handle),
            ticker,
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Run one match in a fresh guest instance, bounded by `deadline`.
    ///
    /// Returns the guest's answer, which may itself carry a guest-reported
    /// error. Returns promptly with [`SandboxError::DeadlineExceeded`] once
    /// `deadline` passes; the abandoned guest is interrupted at its next
    /// epoch check and its instance is dropped.
    pub async fn invoke(&self, request: &MatchRequest, deadline: Instant) -> Result<MatchOutcome> {
        if self.is_closed() {
            return Err(SandboxError::Closed);
        }
        if !self.handle.exports_memory() {
            return Err(SandboxError::Configuration(format!(
                "guest module does not export `{MEMORY_EXPORT}`"
            )));
        }

        let (io, wasi) = GuestIo::prepare(
            request,
            self.config.max_input_bytes,
            self.config.max_output_bytes,
        )?;

        if Instant::now() >= deadline {
            return Err(SandboxError::DeadlineExceeded);
        }

        let in_flight = self.ticker.enter().ok_or(SandboxError::Closed)?;
        let interval = self.ticker.interval();
        let handle = Arc::clone(&self.handle);

        // The budget is taken when the blocking pool picks the run up, not
        // when it is queued.
        let task = tokio::task::spawn_blocking(move || {
            let _in_flight = in_flight;
            run_before(&handle, wasi, interval, deadline.into_std())
        });

        let stats = match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(SandboxError::GuestFault(format!("guest task failed: {e}"))),
            Err(_) => {
                tracing::debug!(
                    request_len = io.request_len(),
                    "deadline elapsed, abandoning guest run"
                );
                return Err(SandboxError::DeadlineExceeded);
            }
        }
        .inspect_err(|e| {
            let stderr = io.stderr_lossy();
            if !stderr.is_empty() {
                tracing::debug!(error = %e, guest_stderr = %stderr, "guest run failed");
            }
        })?;

        let wire = io.response()?;
        tracing::debug!(
            request_len = io.request_len(),
            peak_memory = stats.peak_memory,
            is_match = wire.is_match,
            guest_error = wire.is_error(),
            "guest run completed"
        );
        Ok(MatchOutcome::from(wire))
    }

    /// Stop accepting invocations and release the sandbox's background
    /// resources. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.ticker.stop();
        tracing::info!("pattern sandbox shut down");
    }
}

fn run_before(
    handle: &GuestHandle,
    wasi: WasiP1Ctx,
    interval: Duration,
    deadline: std::time::Instant,
) -> Result<RunStats> {
    let deadline_ticks =
        epoch::ticks_until(interval, deadline).ok_or(SandboxError::DeadlineExceeded)?;
    handle.run(wasi, deadline_ticks)
}

impl Drop for PatternSandbox {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn empty_guest() -> GuestHandle {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let wasm = wat::parse_str(r#"(module (memory (export "memory") 1) (func (export "_start")))"#)
            .unwrap();
        file.write_all(&wasm).unwrap();
        GuestHandle::load(file.path(), 16).unwrap()
    }

    #[test]
    fn test_late_start_skips_the_guest() {
        let handle = empty_guest();
        let request = MatchRequest::new("a", "a");
        let interval = Duration::from_millis(1);

        let (_io, wasi) = GuestIo::prepare(&request, 1024, 1024).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        assert!(run_before(&handle, wasi, interval, deadline).is_ok());

        let (_io, wasi) = GuestIo::prepare(&request, 1024, 1024).unwrap();
        let deadline = std::time::Instant::now();
        std::thread::sleep(Duration::from_millis(2));
        let result = run_before(&handle, wasi, interval, deadline);
        assert!(matches!(result, Err(SandboxError::DeadlineExceeded)));
    }
}
