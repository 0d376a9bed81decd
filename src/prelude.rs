//! Prelude module for convenient imports.

pub use crate::error::{classify, Result, SandboxError};
pub use crate::model::{MatchOutcome, MatchRequest, WireResult};
pub use crate::sandbox::{config::SandboxConfig, executor::PatternSandbox};
