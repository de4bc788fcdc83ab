//! The response payload handed back to the transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SandboxError;
use crate::sandbox::outcome::ExecutionOutcome;

/// `{"result": …, "stdout": …}` or `{"error": …}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutionResponse {
    Success { result: Value, stdout: String },
    Error { error: String },
}

impl ExecutionResponse {
    /// Build an error payload from any sandbox error.
    pub fn from_error(err: &SandboxError) -> Self {
        ExecutionResponse::Error {
            error: err.client_message(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResponse::Success { .. })
    }

    /// The error message, if this is an error payload.
    pub fn error(&self) -> Option<&str> {
        match self {
            ExecutionResponse::Error { error } => Some(error),
            ExecutionResponse::Success { .. } => None,
        }
    }
}

/// Map an outcome onto the response payload.
pub fn resolve(outcome: ExecutionOutcome) -> ExecutionResponse {
    match outcome.into_result() {
        Ok((result, stdout)) => ExecutionResponse::Success { result, stdout },
        Err(err) => ExecutionResponse::from_error(&err),
    }
}
