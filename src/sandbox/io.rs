//! Host side of the guest byte exchange.
//!
//! The guest is a WASI command. The encoded [`MatchRequest`] is its stdin
//! (length-delimited by EOF) and it writes one encoded [`WireResult`] to
//! stdout. Both directions go through in-memory pipes owned by a single
//! invocation, so nothing is shared between concurrent calls.

use wasmtime_wasi::pipe::{MemoryInputPipe, MemoryOutputPipe};
use wasmtime_wasi::preview1::WasiP1Ctx;
use wasmtime_wasi::WasiCtxBuilder;

use crate::error::{Result, SandboxError};
use crate::model::{MatchRequest, WireResult};

/// `argv[0]` seen by the guest.
const GUEST_PROGRAM_NAME: &str = "regex-guest";

/// Capacity of the captured guest stderr, kept for diagnostics only.
const STDERR_CAPACITY: usize = 4 * 1024;

/// Pipes for one invocation.
#[derive(Debug, Clone)]
pub struct GuestIo {
    stdout: MemoryOutputPipe,
    stderr: MemoryOutputPipe,
    request_len: usize,
}

impl GuestIo {
    /// Encode `request` and build a WASI context wired to fresh pipes.
    ///
    /// The context has no preopened directories, environment or network.
    pub fn prepare(
        request: &MatchRequest,
        max_input_bytes: usize,
        max_output_bytes: usize,
    ) -> Result<(Self, WasiP1Ctx)> {
        let input = request.to_json()?;
        if input.len() > max_input_bytes {
            return Err(SandboxError::InputEncoding(format!(
                "encoded request is {} bytes, guest accepts at most {}",
                input.len(),
                max_input_bytes
            )));
        }

        let request_len = input.len();
        let stdout = MemoryOutputPipe::new(max_output_bytes);
        let stderr = MemoryOutputPipe::new(STDERR_CAPACITY);

        let wasi = WasiCtxBuilder::new()
            .stdin(MemoryInputPipe::new(input))
            .stdout(stdout.clone())
            .stderr(stderr.clone())
            .arg(GUEST_PROGRAM_NAME)
            .build_p1();

        Ok((
            Self {
                stdout,
                stderr,
                request_len,
            },
            wasi,
        ))
    }

    /// Length of the encoded request handed to the guest.
    pub fn request_len(&self) -> usize {
        self.request_len
    }

    /// Decode the response frame the guest wrote to stdout.
    pub fn response(&self) -> Result<WireResult> {
        let bytes = self.stdout.contents();
        if bytes.is_empty() {
            return Err(SandboxError::OutputDecoding(
                "guest produced no output".to_string(),
            ));
        }
        WireResult::from_json(&bytes)
    }

    /// Captured guest stderr, lossily decoded.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr.contents()).into_owned()
    }
}
