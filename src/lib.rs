//! # nsjail Python Sandbox
//!
//! Runs untrusted Python snippets that define `def main():` and returns what
//! `main()` returned, as JSON, together with everything the script printed.
//!
//! Each execution goes through the same pipeline:
//!
//! 1. **Wrap**: the snippet is followed by a small driver that calls `main()`,
//!    serializes the return value and writes it to a per-request result file.
//! 2. **Materialize**: program and result files get unique names in a staging
//!    directory that is also mounted inside the jail.
//! 3. **Run**: the program runs under nsjail when it is installed and
//!    configured, or directly when the deployment provides its own isolation
//!    (for example a managed container platform). A hard wall-clock budget
//!    kills the whole process group on expiry.
//! 4. **Resolve**: the result file is read back and turned into
//!    `{"result", "stdout"}` or `{"error"}`.
//! 5. **Clean up**: the workspace is removed on every path.
//!
//! ## Example
//!
//! ```rust,ignore
//! use nsjail_python_sandbox_rs::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SandboxConfig::builder()
//!         .timeout(Duration::from_secs(5))
//!         .build();
//!
//!     let sandbox = PythonSandbox::new(config)?;
//!     let response = sandbox
//!         .run("def main():\n    print('hi')\n    return {'sum': 2 + 2}\n")
//!         .await;
//!
//!     assert!(response.is_success());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod prelude;
pub mod sandbox;
pub mod server;

// Re-export main types at crate root for convenience
pub use error::{Result, SandboxError};
pub use sandbox::config::{SandboxConfig, SandboxConfigBuilder};
pub use sandbox::executor::PythonSandbox;
pub use sandbox::isolation::{IsolationMode, IsolationPolicy, IsolationProbe};
pub use sandbox::limits::ScriptLimits;
pub use sandbox::outcome::{ExecutionOutcome, FaultKind, ProcessFault};
pub use sandbox::resolver::{resolve, ExecutionResponse};
pub use server::ServerConfig;
