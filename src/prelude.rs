//! Prelude module for convenient imports.

pub use crate::error::{Result, SandboxError};
pub use crate::sandbox::{
    config::SandboxConfig,
    executor::PythonSandbox,
    isolation::{IsolationMode, IsolationPolicy},
    outcome::ExecutionOutcome,
    resolver::ExecutionResponse,
};
