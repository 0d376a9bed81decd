//! Request and result types exchanged with callers and with the guest.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SandboxError};

/// A single matching request. Both fields are untrusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MatchRequest {
    /// Regular expression to compile.
    pub pattern: String,
    /// Text to match the pattern against.
    pub text: String,
}

impl MatchRequest {
    pub fn new(pattern: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            text: text.into(),
        }
    }

    /// Encode the request in the guest exchange format.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            SandboxError::InputEncoding(format!("failed to marshal input to JSON: {e}"))
        })
    }
}

/// Result of one matching attempt.
///
/// `is_match` is only meaningful when `error` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchOutcome {
    pub is_match: bool,
    pub error: Option<String>,
}

impl MatchOutcome {
    pub fn matched(is_match: bool) -> Self {
        Self {
            is_match,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            is_match: false,
            error: Some(error.into()),
        }
    }

    /// Turn a guest-reported error into a [`SandboxError::GuestRejected`].
    pub fn into_result(self) -> Result<bool> {
        match self.error {
            Some(err) => Err(SandboxError::GuestRejected(err)),
            None => Ok(self.is_match),
        }
    }
}

/// Flattened outcome used on the wire. An empty `error` means no error.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct WireResult {
    /// Whether the pattern matched the text.
    pub is_match: bool,
    /// Empty on success, otherwise a description of the failure.
    pub error: String,
}

impl WireResult {
    /// Decode a result written by the guest.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| SandboxError::OutputDecoding(format!("invalid result JSON: {e}")))
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

impl From<WireResult> for MatchOutcome {
    fn from(wire: WireResult) -> Self {
        if wire.error.is_empty() {
            MatchOutcome::matched(wire.is_match)
        } else {
            MatchOutcome::failed(wire.error)
        }
    }
}

impl From<MatchOutcome> for WireResult {
    fn from(outcome: MatchOutcome) -> Self {
        match outcome.error {
            Some(error) => WireResult {
                is_match: false,
                error,
            },
            None => WireResult {
                is_match: outcome.is_match,
                error: String::new(),
            },
        }
    }
}
