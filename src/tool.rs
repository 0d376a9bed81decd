//! The `regexp-match` tool, independent of any transport.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{classify, SandboxError};
use crate::model::{MatchOutcome, MatchRequest, WireResult};
use crate::sandbox::executor::PatternSandbox;

/// Match `request` in the sandbox within `timeout`.
///
/// Never fails: any error is logged on the host and replaced by its
/// classified message, with `is_match` forced to `false`.
pub async fn run_match(
    sandbox: &PatternSandbox,
    request: MatchRequest,
    timeout: Duration,
) -> WireResult {
    run_match_cancellable(sandbox, request, timeout, &CancellationToken::new()).await
}

/// Like [`run_match`], but also gives up as soon as `cancel` fires.
///
/// A cancelled call is reported the same way as one that ran out of time.
pub async fn run_match_cancellable(
    sandbox: &PatternSandbox,
    request: MatchRequest,
    timeout: Duration,
    cancel: &CancellationToken,
) -> WireResult {
    let deadline = Instant::now() + timeout;

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!("request cancelled, abandoning guest run");
            Err(SandboxError::DeadlineExceeded)
        }
        result = sandbox.invoke(&request, deadline) => result,
    };

    match result.and_then(MatchOutcome::into_result) {
        Ok(is_match) => WireResult {
            is_match,
            error: String::new(),
        },
        Err(err) => {
            tracing::warn!(
                error = %err,
                category = ?err.category(),
                pattern = %request.pattern,
                text_len = request.text.len(),
                "pattern match failed"
            );
            WireResult {
                is_match: false,
                error: classify(&err).to_string(),
            }
        }
    }
}
