//! Classification of a finished execution.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::error::SandboxError;

/// What the driver reported before exiting without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// `main()` raised an exception.
    EntryPointRaised,
    /// `main()` returned, but `json.dumps` rejected the value.
    NotSerializable,
    /// The interpreter (or nsjail) failed outside the driver, e.g. a `SyntaxError`.
    Crashed,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultKind::EntryPointRaised => "entry point raised",
            FaultKind::NotSerializable => "return value not serializable",
            FaultKind::Crashed => "process crashed",
        };
        f.write_str(s)
    }
}

/// A non-zero exit that left a diagnostic behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFault {
    pub kind: FaultKind,
    pub message: String,
    pub exit_code: Option<i32>,
}

/// The result of exactly one execution, consumed once by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// `main()` returned a JSON value.
    Success {
        result: Value,
        /// Captured stdout, trimmed.
        stdout: String,
    },
    /// The wall-clock budget expired and the process group was killed.
    Timeout(Duration),
    /// The process failed and said why.
    ProcessError(ProcessFault),
    /// The process ended without writing a result file.
    NoResultProduced,
    /// A result file was written but does not parse as JSON.
    MalformedResult(String),
}

impl ExecutionOutcome {
    /// Check if this outcome carries a result.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    /// Check if this outcome represents a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionOutcome::Timeout(_))
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success { .. } => "success",
            ExecutionOutcome::Timeout(_) => "timeout",
            ExecutionOutcome::ProcessError(_) => "process_error",
            ExecutionOutcome::NoResultProduced => "no_result",
            ExecutionOutcome::MalformedResult(_) => "malformed_result",
        }
    }

    /// Split into the successful `(result, stdout)` pair or the matching error.
    pub fn into_result(self) -> Result<(Value, String), SandboxError> {
        match self {
            ExecutionOutcome::Success { result, stdout } => Ok((result, stdout)),
            ExecutionOutcome::Timeout(budget) => Err(SandboxError::Timeout(budget)),
            ExecutionOutcome::ProcessError(fault) => Err(SandboxError::ProcessFault {
                kind: fault.kind,
                message: fault.message,
                exit_code: fault.exit_code,
            }),
            ExecutionOutcome::NoResultProduced => Err(SandboxError::NoResultProduced),
            ExecutionOutcome::MalformedResult(detail) => Err(SandboxError::MalformedResult(detail)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_into_result() {
        let outcome = ExecutionOutcome::Success {
            result: json!({"sum": 4}),
            stdout: String::new(),
        };
        assert!(outcome.is_success());
        let (result, stdout) = outcome.into_result().unwrap();
        assert_eq!(result, json!({"sum": 4}));
        assert!(stdout.is_empty());
    }

    #[test]
    fn test_failures_map_to_errors() {
        let timeout = ExecutionOutcome::Timeout(Duration::from_secs(15));
        assert!(timeout.is_timeout());
        assert!(timeout.into_result().unwrap_err().is_timeout());

        let fault = ExecutionOutcome::ProcessError(ProcessFault {
            kind: FaultKind::NotSerializable,
            message: "TypeError: Object of type set is not JSON serializable".into(),
            exit_code: Some(5),
        });
        match fault.into_result() {
            Err(SandboxError::ProcessFault { kind, exit_code, .. }) => {
                assert_eq!(kind, FaultKind::NotSerializable);
                assert_eq!(exit_code, Some(5));
            }
            other => panic!("expected ProcessFault, got {:?}", other),
        }

        assert!(matches!(
            ExecutionOutcome::NoResultProduced.into_result(),
            Err(SandboxError::NoResultProduced)
        ));
        assert!(matches!(
            ExecutionOutcome::MalformedResult("eof".into()).into_result(),
            Err(SandboxError::MalformedResult(_))
        ));
    }
}
