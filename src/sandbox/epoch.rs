//! Background epoch ticker driving cooperative interruption.
//!
//! Guest code runs synchronously and cannot be preempted. Wasmtime checks
//! the engine epoch at function entries and loop headers; a store whose
//! deadline has passed traps with [`wasmtime::Trap::Interrupt`]. One ticker
//! per engine advances the epoch at a fixed interval, and every store derives
//! its deadline in ticks from the caller's wall-clock deadline.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use wasmtime::Engine;

use crate::error::Result;

#[derive(Debug, Default)]
struct TickerState {
    stopping: AtomicBool,
    in_flight: AtomicUsize,
}

/// Advances an engine's epoch until stopped.
///
/// After [`EpochTicker::stop`] the thread keeps ticking while any run that
/// entered through [`EpochTicker::enter`] is still executing, so an
/// abandoned guest always reaches its deadline.
#[derive(Debug)]
pub struct EpochTicker {
    interval: Duration,
    state: Arc<TickerState>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Marks one guest run as in flight for as long as it is alive.
#[derive(Debug)]
pub struct InFlight {
    state: Arc<TickerState>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl EpochTicker {
    /// Spawn the ticker thread for `engine`.
    pub fn start(engine: Engine, interval: Duration) -> Result<Self> {
        let interval = interval.max(Duration::from_millis(1));
        let state = Arc::new(TickerState::default());
        let thread_state = Arc::clone(&state);

        let thread = std::thread::Builder::new()
            .name("guest-epoch-ticker".to_string())
            .spawn(move || loop {
                std::thread::sleep(interval);
                engine.increment_epoch();
                if thread_state.stopping.load(Ordering::SeqCst)
                    && thread_state.in_flight.load(Ordering::SeqCst) == 0
                {
                    break;
                }
            })?;

        Ok(Self {
            interval,
            state,
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Register a guest run. Returns `None` once the ticker is stopping.
    pub fn enter(&self) -> Option<InFlight> {
        self.state.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight {
            state: Arc::clone(&self.state),
        };
        if self.state.stopping.load(Ordering::SeqCst) {
            return None;
        }
        Some(guard)
    }

    /// Stop ticking once no run is in flight. Idempotent.
    ///
    /// Returns `false` if the ticker was already stopping.
    pub fn stop(&self) -> bool {
        if self.state.stopping.swap(true, Ordering::SeqCst) {
            return false;
        }
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            if self.state.in_flight.load(Ordering::SeqCst) == 0 {
                let _ = thread.join();
            }
        }
        true
    }
}

/// Epoch deadline, relative to now, for a run that must stop by `deadline`
/// on a ticker advancing every `interval`.
///
/// Returns `None` once `deadline` has passed. One extra tick covers the
/// partial interval already elapsed when the store is armed, so a run is
/// never interrupted before `deadline`.
pub fn ticks_until(interval: Duration, deadline: Instant) -> Option<u64> {
    let remaining = deadline.checked_duration_since(Instant::now())?;
    if remaining.is_zero() {
        return None;
    }
    let ticks = remaining.as_nanos().div_ceil(interval.as_nanos().max(1));
    Some(u64::try_from(ticks).unwrap_or(u64::MAX).saturating_add(1))
}

impl Drop for EpochTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
