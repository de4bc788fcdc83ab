//! Error types for the nsjail Python sandbox.

use std::time::Duration;

use thiserror::Error;

use crate::sandbox::outcome::FaultKind;

/// Errors that can occur while validating, running, or resolving a script.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The request was rejected before entering the execution pipeline.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The execution exceeded the wall-clock budget.
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),

    /// The child exited non-zero and left a diagnostic on stderr.
    #[error("{kind} (exit code {exit_code:?}): {message}")]
    ProcessFault {
        /// What the driver reported.
        kind: FaultKind,
        /// One-line diagnostic, `Type: message` when a Python exception was found.
        message: String,
        /// Exit code of the interpreter (or of nsjail relaying it).
        exit_code: Option<i32>,
    },

    /// The child finished without writing a result file.
    #[error("script did not produce a result")]
    NoResultProduced,

    /// The result file exists but is not valid JSON.
    #[error("malformed result: {0}")]
    MalformedResult(String),

    /// Workspace allocation or materialization failed.
    #[error("workspace error: {0}")]
    Workspace(String),

    /// The interpreter or isolation binary could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// The program that was being started.
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error during execution.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SandboxError {
    /// Check if this error represents a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SandboxError::Timeout(_))
    }

    /// Check if this error was raised by the sandbox itself rather than by the script.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            SandboxError::Workspace(_)
                | SandboxError::Spawn { .. }
                | SandboxError::Io(_)
                | SandboxError::Config(_)
        )
    }

    /// The message shown to the caller.
    ///
    /// Never contains tracebacks or filesystem paths. Internal errors collapse
    /// to a fixed string; log the `Display` form for the details.
    pub fn client_message(&self) -> String {
        match self {
            SandboxError::InvalidInput(msg) => msg.clone(),
            SandboxError::Timeout(budget) => {
                format!("Script execution timed out ({})", format_budget(*budget))
            }
            SandboxError::ProcessFault { kind, message, .. } => match kind {
                FaultKind::EntryPointRaised => format!("main() raised {}", message),
                FaultKind::NotSerializable => {
                    format!("main() must return a JSON-serializable object ({})", message)
                }
                FaultKind::Crashed => format!("Execution failed: {}", message),
            },
            SandboxError::NoResultProduced => "Script did not produce a result".to_string(),
            SandboxError::MalformedResult(_) => {
                "main() must return a JSON-serializable object".to_string()
            }
            SandboxError::Workspace(_)
            | SandboxError::Spawn { .. }
            | SandboxError::Io(_)
            | SandboxError::Config(_) => "Execution failed: internal error".to_string(),
        }
    }
}

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;

/// `15s` for whole seconds, otherwise the `Debug` form (`500ms`, `1.5s`).
pub(crate) fn format_budget(budget: Duration) -> String {
    if budget.subsec_nanos() == 0 {
        format!("{}s", budget.as_secs())
    } else {
        format!("{:?}", budget)
    }
}

/// The final exception found in a Python stderr dump.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedException {
    exception_type: String,
    message: String,
}

impl ParsedException {
    fn summary(&self) -> String {
        if self.message.is_empty() {
            self.exception_type.clone()
        } else {
            format!("{}: {}", self.exception_type, self.message)
        }
    }
}

/// Find the final Python exception in stderr.
///
/// Scans from the bottom for the last unindented line shaped like
/// `SomethingError: message`, so output the script printed before the
/// traceback does not confuse it.
fn parse_python_exception(stderr: &str) -> Option<ParsedException> {
    let line = stderr
        .lines()
        .rev()
        .find(|line| !line.starts_with(char::is_whitespace) && looks_like_exception(line))?;

    let (exception_type, message) = match line.split_once(':') {
        Some((ty, msg)) => (ty.trim().to_string(), msg.trim().to_string()),
        None => (line.trim().to_string(), String::new()),
    };

    Some(ParsedException {
        exception_type,
        message: truncate_chars(&message, MAX_DIAGNOSTIC_CHARS),
    })
}

/// `Type: message` for the Python exception in stderr, if there is one.
///
/// Only text shaped like a Python exception is returned. Anything else on
/// stderr (nsjail's own log lines, for one) may name host paths and is left
/// to [`stderr_tail`], for logging.
pub fn stderr_diagnostic(stderr: &str) -> Option<String> {
    parse_python_exception(stderr).map(|exception| exception.summary())
}

/// Last non-empty stderr line, shortened. For logs only.
pub fn stderr_tail(stderr: &str) -> Option<String> {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| truncate_chars(line, MAX_DIAGNOSTIC_CHARS))
}

const MAX_DIAGNOSTIC_CHARS: usize = 500;

fn truncate_chars(line: &str, max: usize) -> String {
    match line.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}

/// Check if a line looks like a Python exception.
fn looks_like_exception(line: &str) -> bool {
    const SUFFIXES: [&str; 3] = ["Error", "Exception", "Warning"];
    const STANDALONE: [&str; 4] = [
        "KeyboardInterrupt",
        "SystemExit",
        "StopIteration",
        "GeneratorExit",
    ];

    if !line.starts_with(|c: char| c.is_ascii_uppercase()) {
        return false;
    }

    // Qualified names like `json.decoder.JSONDecodeError` are fine, spaces are not.
    let name = line.split(':').next().unwrap_or(line).trim_end();
    if name.contains(char::is_whitespace) {
        return false;
    }
    let short = name.rsplit('.').next().unwrap_or(name);

    SUFFIXES.iter().any(|suffix| short.ends_with(suffix)) || STANDALONE.contains(&short)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_exception() {
        let stderr = "ValueError: invalid literal for int() with base 10: 'abc'";
        let parsed = parse_python_exception(stderr).unwrap();
        assert_eq!(parsed.exception_type, "ValueError");
        assert_eq!(parsed.message, "invalid literal for int() with base 10: 'abc'");
    }

    #[test]
    fn test_parse_exception_with_traceback() {
        let stderr = r#"Traceback (most recent call last):
  File "/tmp/script_1.py", line 3, in main
    raise ValueError("boom")
ValueError: boom"#;

        assert_eq!(stderr_diagnostic(stderr).as_deref(), Some("ValueError: boom"));
    }

    #[test]
    fn test_parse_picks_last_exception() {
        let stderr = "KeyError: 'printed by the script'\nsome noise\nZeroDivisionError: division by zero\n";
        let summary = stderr_diagnostic(stderr).unwrap();
        assert_eq!(summary, "ZeroDivisionError: division by zero");
    }

    #[test]
    fn test_parse_exception_no_message() {
        let parsed = parse_python_exception("StopIteration").unwrap();
        assert_eq!(parsed.exception_type, "StopIteration");
        assert!(parsed.message.is_empty());
        assert_eq!(parsed.summary(), "StopIteration");
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_python_exception("").is_none());
        assert!(parse_python_exception("   ").is_none());
        assert!(parse_python_exception("Some Error happened: oops").is_none());
    }

    #[test]
    fn test_non_python_stderr_is_not_a_diagnostic() {
        let stderr = "[E][2026-10-16T10:00:00+0000][1] mountPt():260 mount('/tmp/nsjail', '/tmp', type='none') failed: Permission denied\n\n";
        assert!(stderr_diagnostic(stderr).is_none());
        assert!(stderr_tail(stderr).unwrap().starts_with("[E]"));
        assert!(stderr_tail("\n  \n").is_none());
    }

    #[test]
    fn test_long_lines_are_truncated() {
        let long = "x".repeat(2 * MAX_DIAGNOSTIC_CHARS);
        let tail = stderr_tail(&long).unwrap();
        assert_eq!(tail.chars().count(), MAX_DIAGNOSTIC_CHARS + 3);

        let diag = stderr_diagnostic(&format!("ValueError: {}", long)).unwrap();
        assert_eq!(diag.chars().count(), "ValueError: ".len() + MAX_DIAGNOSTIC_CHARS + 3);
    }

    #[test]
    fn test_client_messages() {
        assert_eq!(
            SandboxError::Timeout(Duration::from_secs(15)).client_message(),
            "Script execution timed out (15s)"
        );
        assert_eq!(
            SandboxError::Timeout(Duration::from_millis(500)).client_message(),
            "Script execution timed out (500ms)"
        );
        assert_eq!(
            SandboxError::NoResultProduced.client_message(),
            "Script did not produce a result"
        );
        assert_eq!(
            SandboxError::MalformedResult("expected value".into()).client_message(),
            "main() must return a JSON-serializable object"
        );
        let fault = SandboxError::ProcessFault {
            kind: FaultKind::EntryPointRaised,
            message: "ValueError: boom".into(),
            exit_code: Some(4),
        };
        assert_eq!(fault.client_message(), "main() raised ValueError: boom");
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = SandboxError::Workspace("/tmp/nsjail/script_abc.py exists".into());
        assert!(err.is_internal());
        assert_eq!(err.client_message(), "Execution failed: internal error");
        assert!(!err.client_message().contains("/tmp"));
    }

    #[test]
    fn test_error_helpers() {
        let timeout = SandboxError::Timeout(Duration::from_secs(5));
        assert!(timeout.is_timeout());
        assert!(!timeout.is_internal());

        let spawn = SandboxError::Spawn {
            program: "/usr/bin/nsjail".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(spawn.is_internal());
        assert!(!spawn.is_timeout());
    }
}
