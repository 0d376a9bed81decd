//! Loading and validating the guest module.

use std::path::Path;

use wasmtime::{Engine, ExternType, InstancePre, Linker, Module, Store};
use wasmtime_wasi::preview1::{self, WasiP1Ctx};
use wasmtime_wasi::I32Exit;

use crate::error::{Result, SandboxError};
use crate::sandbox::config::MAX_WASM32_PAGES;
use crate::sandbox::limits::{StoreData, StoreLimiterExt};

/// Exported entry point of a WASI command.
pub const ENTRY_POINT: &str = "_start";

/// Exported linear memory the WASI exchange reads and writes through.
pub const MEMORY_EXPORT: &str = "memory";

/// Figures from a single guest run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    /// Highest linear-memory size reached, in bytes.
    pub peak_memory: u64,
}

/// A compiled, pre-linked guest module.
///
/// Shared by every invocation. Each call instantiates its own store and
/// linear memory from the pre-linked module, so no two invocations ever
/// touch the same memory.
pub struct GuestHandle {
    engine: Engine,
    instance_pre: InstancePre<StoreData>,
    memory_limit_pages: u64,
    exports_memory: bool,
}

impl std::fmt::Debug for GuestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestHandle")
            .field("memory_limit_pages", &self.memory_limit_pages)
            .field("exports_memory", &self.exports_memory)
            .finish_non_exhaustive()
    }
}

impl GuestHandle {
    /// Load, compile and pre-link the module at `path`.
    ///
    /// Either returns a usable handle or an [`SandboxError::Instantiation`];
    /// everything acquired on the way is dropped on failure.
    pub fn load(path: &Path, memory_limit_pages: u64) -> Result<Self> {
        if memory_limit_pages == 0 || memory_limit_pages > MAX_WASM32_PAGES {
            return Err(SandboxError::instantiation(format!(
                "memory limit of {memory_limit_pages} pages is outside 1..={MAX_WASM32_PAGES}"
            )));
        }

        let engine = Self::create_engine()?;

        let wasm_bytes = std::fs::read(path).map_err(|e| {
            SandboxError::Instantiation(
                anyhow::Error::new(e)
                    .context(format!("failed to read guest module {}", path.display())),
            )
        })?;

        let module = Module::new(&engine, &wasm_bytes)
            .map_err(|e| SandboxError::Instantiation(e.context("failed to compile guest module")))?;

        match module.get_export(ENTRY_POINT) {
            Some(ExternType::Func(ty)) if ty.params().len() == 0 && ty.results().len() == 0 => {}
            Some(_) => {
                return Err(SandboxError::instantiation(format!(
                    "export `{ENTRY_POINT}` is not a `() -> ()` function"
                )))
            }
            None => {
                return Err(SandboxError::instantiation(format!(
                    "module does not export `{ENTRY_POINT}`"
                )))
            }
        }

        let exports_memory = match module.get_export(MEMORY_EXPORT) {
            Some(ExternType::Memory(ty)) => {
                if ty.minimum() > memory_limit_pages {
                    return Err(SandboxError::instantiation(format!(
                        "module needs at least {} pages, limit is {memory_limit_pages}",
                        ty.minimum()
                    )));
                }
                true
            }
            _ => {
                tracing::warn!(
                    export = MEMORY_EXPORT,
                    "guest module does not export its linear memory; invocations will fail"
                );
                false
            }
        };

        let mut linker: Linker<StoreData> = Linker::new(&engine);
        preview1::add_to_linker_sync(&mut linker, |data: &mut StoreData| &mut data.wasi)
            .map_err(|e| SandboxError::Instantiation(e.context("failed to link WASI")))?;

        let instance_pre = linker
            .instantiate_pre(&module)
            .map_err(|e| SandboxError::Instantiation(e.context("unresolved guest imports")))?;

        Ok(Self {
            engine,
            instance_pre,
            memory_limit_pages,
            exports_memory,
        })
    }

    fn create_engine() -> Result<Engine> {
        let mut config = wasmtime::Config::new();
        config.epoch_interruption(true);
        Engine::new(&config)
            .map_err(|e| SandboxError::Instantiation(e.context("failed to create engine")))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Whether the module carries the `memory` export the exchange needs.
    pub fn exports_memory(&self) -> bool {
        self.exports_memory
    }

    pub fn memory_limit_pages(&self) -> u64 {
        self.memory_limit_pages
    }

    /// Run the guest to completion in a fresh store.
    ///
    /// Blocks the calling thread. The store traps once the engine epoch
    /// advances `deadline_ticks` past its current value.
    pub fn run(&self, wasi: WasiP1Ctx, deadline_ticks: u64) -> Result<RunStats> {
        let mut store = Store::new(&self.engine, StoreData::new(self.memory_limit_pages, wasi));
        store.configure_limiter();
        store.epoch_deadline_trap();
        store.set_epoch_deadline(deadline_ticks);

        let instance = self
            .instance_pre
            .instantiate(&mut store)
            .map_err(|e| Self::run_error(&store, e, SandboxError::Instantiation))?;

        let start = instance
            .get_typed_func::<(), ()>(&mut store, ENTRY_POINT)
            .map_err(SandboxError::Instantiation)?;

        if let Err(e) = start.call(&mut store, ()) {
            match e.downcast_ref::<I32Exit>() {
                Some(I32Exit(0)) => {}
                Some(I32Exit(code)) if !store.data().limiter.limit_exceeded() => {
                    return Err(SandboxError::GuestFault(format!(
                        "guest exited with status {code}"
                    )));
                }
                _ => {
                    return Err(Self::run_error(&store, e, |e| {
                        SandboxError::GuestFault(format!("{e:#}"))
                    }))
                }
            }
        }

        Ok(RunStats {
            peak_memory: store.data().limiter.peak_memory(),
        })
    }

    fn run_error(
        store: &Store<StoreData>,
        err: anyhow::Error,
        otherwise: impl FnOnce(anyhow::Error) -> SandboxError,
    ) -> SandboxError {
        if matches!(err.downcast_ref::<wasmtime::Trap>(), Some(wasmtime::Trap::Interrupt)) {
            return SandboxError::DeadlineExceeded;
        }
        let limiter = &store.data().limiter;
        if limiter.limit_exceeded() {
            return SandboxError::MemoryLimitExceeded(format!(
                "guest tried to grow memory beyond {} bytes",
                limiter.max_memory()
            ));
        }
        otherwise(err)
    }
}
