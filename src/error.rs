//! Error types for the pattern-matching sandbox.
//!
//! [`SandboxError`] carries full detail for host-side diagnostics. Nothing in
//! it is meant for callers: [`classify`] reduces any error to one of a fixed
//! set of messages before it crosses the trust boundary.

use thiserror::Error;

/// Errors that can occur while loading or invoking the guest module.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The guest module could not be loaded, validated or instantiated.
    #[error("failed to instantiate guest module: {0}")]
    Instantiation(#[source] anyhow::Error),

    /// The guest module is missing a marker the exchange ABI relies on.
    #[error("guest module configuration error: {0}")]
    Configuration(String),

    /// The request could not be encoded or handed to the guest.
    #[error("failed to encode guest input: {0}")]
    InputEncoding(String),

    /// The bytes the guest wrote back are not a valid result.
    #[error("failed to decode guest output: {0}")]
    OutputDecoding(String),

    /// The time budget elapsed before the guest produced a result.
    #[error("execution exceeded its deadline")]
    DeadlineExceeded,

    /// The guest completed but reported an error for this input.
    #[error("guest rejected input: {0}")]
    GuestRejected(String),

    /// The guest tried to grow its memory past the configured ceiling.
    #[error("memory limit exceeded: {0}")]
    MemoryLimitExceeded(String),

    /// The guest trapped or exited unsuccessfully.
    #[error("guest execution failed: {0}")]
    GuestFault(String),

    /// The sandbox has been shut down.
    #[error("sandbox is shut down")]
    Closed,

    /// I/O error on the host side.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Caller-visible error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Instantiation,
    Configuration,
    InputEncoding,
    OutputDecoding,
    DeadlineExceeded,
    Unclassified,
}

impl ErrorCategory {
    /// Every category, in classification order.
    pub const ALL: [ErrorCategory; 6] = [
        ErrorCategory::Instantiation,
        ErrorCategory::Configuration,
        ErrorCategory::InputEncoding,
        ErrorCategory::OutputDecoding,
        ErrorCategory::DeadlineExceeded,
        ErrorCategory::Unclassified,
    ];

    /// The fixed message reported to callers for this category.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCategory::DeadlineExceeded => "Pattern matching timed out",
            ErrorCategory::Configuration => "Engine configuration error",
            ErrorCategory::InputEncoding => "Invalid pattern or text input format",
            ErrorCategory::OutputDecoding => "Engine output error",
            ErrorCategory::Instantiation => "Engine instantiation failed",
            ErrorCategory::Unclassified => "Internal server error",
        }
    }
}

impl SandboxError {
    /// The category this error is reported under.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SandboxError::Instantiation(_) => ErrorCategory::Instantiation,
            SandboxError::Configuration(_) => ErrorCategory::Configuration,
            SandboxError::InputEncoding(_) | SandboxError::GuestRejected(_) => {
                ErrorCategory::InputEncoding
            }
            SandboxError::OutputDecoding(_) => ErrorCategory::OutputDecoding,
            SandboxError::DeadlineExceeded => ErrorCategory::DeadlineExceeded,
            SandboxError::MemoryLimitExceeded(_)
            | SandboxError::GuestFault(_)
            | SandboxError::Closed
            | SandboxError::Io(_) => ErrorCategory::Unclassified,
        }
    }

    /// Check if this error represents an exceeded deadline.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, SandboxError::DeadlineExceeded)
    }

    /// Check if this error represents a memory limit exceeded.
    pub fn is_memory_limit(&self) -> bool {
        matches!(self, SandboxError::MemoryLimitExceeded(_))
    }

    /// Check if this error was reported by the guest itself.
    pub fn is_guest_rejection(&self) -> bool {
        matches!(self, SandboxError::GuestRejected(_))
    }

    pub(crate) fn instantiation(msg: impl std::fmt::Display) -> Self {
        SandboxError::Instantiation(anyhow::anyhow!("{msg}"))
    }
}

/// Map an error to a caller-safe message.
///
/// Total and pure: the output is always one of [`ErrorCategory::message`],
/// never text derived from the error itself.
pub fn classify(err: &SandboxError) -> &'static str {
    err.category().message()
}

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn all_errors() -> Vec<SandboxError> {
        vec![
            SandboxError::Instantiation(anyhow::anyhow!(
                "failed to read /srv/secret/engine.wasm: No such file or directory"
            )),
            SandboxError::Configuration("module at /srv/secret/engine.wasm lacks `memory`".into()),
            SandboxError::InputEncoding("request of 2097152 bytes exceeds 1048576".into()),
            SandboxError::OutputDecoding("expected value at line 1 column 1: `\u{0}garbage`".into()),
            SandboxError::DeadlineExceeded,
            SandboxError::GuestRejected("invalid regular expression: unclosed group".into()),
            SandboxError::MemoryLimitExceeded("wanted 8388608 bytes".into()),
            SandboxError::GuestFault("wasm trap: unreachable at func[7]".into()),
            SandboxError::Closed,
            SandboxError::Io(std::io::Error::other("broken pipe")),
        ]
    }

    #[test]
    fn test_classify_known_categories() {
        assert_eq!(classify(&SandboxError::DeadlineExceeded), "Pattern matching timed out");
        assert_eq!(
            classify(&SandboxError::Configuration("x".into())),
            "Engine configuration error"
        );
        assert_eq!(
            classify(&SandboxError::InputEncoding("x".into())),
            "Invalid pattern or text input format"
        );
        assert_eq!(
            classify(&SandboxError::GuestRejected("x".into())),
            "Invalid pattern or text input format"
        );
        assert_eq!(
            classify(&SandboxError::OutputDecoding("x".into())),
            "Engine output error"
        );
        assert_eq!(
            classify(&SandboxError::instantiation("x")),
            "Engine instantiation failed"
        );
    }

    #[test]
    fn test_classify_falls_back_to_internal_error() {
        assert_eq!(classify(&SandboxError::Closed), "Internal server error");
        assert_eq!(
            classify(&SandboxError::GuestFault("trap".into())),
            "Internal server error"
        );
        assert_eq!(
            classify(&SandboxError::MemoryLimitExceeded("grow".into())),
            "Internal server error"
        );
    }

    #[test]
    fn test_classified_messages_do_not_leak_detail() {
        for err in all_errors() {
            let message = classify(&err);
            assert!(!message.contains("/srv/secret"), "{message}");
            assert!(!message.contains("engine.wasm"), "{message}");
            assert!(!message.contains("func["), "{message}");
            assert!(!message.contains("unclosed group"), "{message}");
            assert!(ErrorCategory::ALL
                .iter()
                .any(|category| category.message() == message));
        }
    }

    #[test]
    fn test_error_helpers() {
        let deadline = SandboxError::DeadlineExceeded;
        assert!(deadline.is_deadline_exceeded());
        assert!(!deadline.is_memory_limit());

        let memory = SandboxError::MemoryLimitExceeded("test".to_string());
        assert!(memory.is_memory_limit());
        assert!(!memory.is_deadline_exceeded());

        let rejected = SandboxError::GuestRejected("bad".to_string());
        assert!(rejected.is_guest_rejection());
    }
}
