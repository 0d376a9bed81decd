//! Guest modules and helpers shared by the integration tests.
//!
//! Guests are tiny WASI commands written in WAT so the tests do not depend
//! on a prebuilt regex engine.

#![allow(dead_code)]

use std::io::Write;
use std::time::Duration;

use regex_match_sandbox::prelude::*;
use regex_match_sandbox::SandboxConfigBuilder;
use tempfile::NamedTempFile;

/// Writes `response` to stdout without reading its input.
pub fn responder_wat(response: &str) -> String {
    let escaped = response.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        r#"(module
  (import "wasi_snapshot_preview1" "fd_write"
    (func $fd_write (param i32 i32 i32 i32) (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 256) "{escaped}")
  (func (export "_start")
    (i32.store (i32.const 0) (i32.const 256))
    (i32.store (i32.const 4) (i32.const {len}))
    (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))))"#,
        len = response.len()
    )
}

/// Reads the request and compares the first byte of a one-character pattern
/// with the first byte of the text. A pattern of `L` spins forever.
///
/// For `{"pattern":"X","text":"Y..."}` the bytes sit at offsets 12 and 23.
pub const COMPARE_GUEST: &str = r#"(module
  (import "wasi_snapshot_preview1" "fd_read"
    (func $fd_read (param i32 i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_write"
    (func $fd_write (param i32 i32 i32 i32) (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 256) "{\"is_match\":true,\"error\":\"\"}")
  (data (i32.const 512) "{\"is_match\":false,\"error\":\"\"}")
  (func (export "_start")
    (i32.store (i32.const 0) (i32.const 1024))
    (i32.store (i32.const 4) (i32.const 4096))
    (drop (call $fd_read (i32.const 0) (i32.const 0) (i32.const 1) (i32.const 8)))
    (if (i32.eq (i32.load8_u (i32.const 1036)) (i32.const 76))
      (then (loop $spin (br $spin))))
    (if (i32.eq (i32.load8_u (i32.const 1036)) (i32.load8_u (i32.const 1047)))
      (then
        (i32.store (i32.const 16) (i32.const 256))
        (i32.store (i32.const 20) (i32.const 28)))
      (else
        (i32.store (i32.const 16) (i32.const 512))
        (i32.store (i32.const 20) (i32.const 29))))
    (drop (call $fd_write (i32.const 1) (i32.const 16) (i32.const 1) (i32.const 24)))))"#;

/// Never returns.
pub const SPIN_GUEST: &str = r#"(module
  (memory (export "memory") 1)
  (func (export "_start")
    (loop $spin (br $spin))))"#;

/// Valid entry point but no exported memory.
pub const NO_MEMORY_GUEST: &str = r#"(module (func (export "_start")))"#;

/// Exits with status 3 before writing anything.
pub const EXIT_GUEST: &str = r#"(module
  (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
  (memory (export "memory") 1)
  (func (export "_start")
    (call $proc_exit (i32.const 3))))"#;

/// Grows its memory by 64 pages and traps if that is refused.
pub const GROW_GUEST: &str = r#"(module
  (memory (export "memory") 1)
  (func (export "_start")
    (if (i32.eq (memory.grow (i32.const 64)) (i32.const -1))
      (then unreachable))))"#;

/// Config used by most tests: small memory, fast ticks, generous timeout.
pub fn test_config() -> SandboxConfigBuilder {
    SandboxConfig::builder()
        .memory_limit_mib(1)
        .timeout(Duration::from_secs(5))
        .epoch_tick_interval(Duration::from_millis(2))
}

/// Assemble `wat` and try to load it into a sandbox built from `builder`.
pub fn try_sandbox_with(wat: &str, builder: SandboxConfigBuilder) -> Result<PatternSandbox> {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&wat::parse_str(wat).unwrap()).unwrap();
    PatternSandbox::new(builder.module_path(file.path()).build())
}

pub fn sandbox_with(wat: &str, builder: SandboxConfigBuilder) -> PatternSandbox {
    try_sandbox_with(wat, builder).unwrap()
}

pub fn sandbox(wat: &str) -> PatternSandbox {
    sandbox_with(wat, test_config())
}

pub fn deadline_in(timeout: Duration) -> tokio::time::Instant {
    tokio::time::Instant::now() + timeout
}
