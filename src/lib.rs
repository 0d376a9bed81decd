//! # Regex Match Sandbox
//!
//! Answers "does this text match this pattern" for remote callers while the
//! matching itself runs in an untrusted WebAssembly guest under Wasmtime.
//!
//! - **Memory limits**: each guest instance gets a linear-memory ceiling in pages
//! - **Deadlines**: epoch-based interruption stops runaway guests
//! - **Isolation**: one instance per call, no filesystem, network or environment
//! - **Opaque errors**: every failure is reduced to a fixed caller-safe message
//!
//! ## Example
//!
//! ```rust,ignore
//! use regex_match_sandbox::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SandboxConfig::builder()
//!         .module_path("assets/regex_guest.wasm")
//!         .memory_limit_mib(64)
//!         .build();
//!
//!     let sandbox = PatternSandbox::new(config)?;
//!     let deadline = tokio::time::Instant::now() + Duration::from_millis(100);
//!     let outcome = sandbox
//!         .invoke(&MatchRequest::new("^a+$", "aaa"), deadline)
//!         .await?;
//!
//!     assert!(outcome.is_match);
//!     sandbox.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Guest ABI
//!
//! The guest is a WASI preview 1 command exporting `_start` and `memory`. It
//! reads `{"pattern": ..., "text": ...}` as JSON from stdin and writes
//! `{"is_match": bool, "error": string}` as JSON to stdout, with an empty
//! `error` meaning success.

pub mod error;
pub mod model;
pub mod prelude;
pub mod sandbox;
pub mod server;
pub mod tool;

// Re-export main types at crate root for convenience
pub use error::{classify, ErrorCategory, Result, SandboxError};
pub use model::{MatchOutcome, MatchRequest, WireResult};
pub use sandbox::config::{mib_to_pages, SandboxConfig, SandboxConfigBuilder};
pub use sandbox::executor::PatternSandbox;
pub use sandbox::loader::GuestHandle;
pub use tool::{run_match, run_match_cancellable};
