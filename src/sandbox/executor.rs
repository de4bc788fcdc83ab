//! The execution pipeline: wrap, materialize, run, resolve, clean up.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::error::{Result, SandboxError};
use crate::sandbox::config::SandboxConfig;
use crate::sandbox::isolation::{IsolationMode, IsolationProbe};
use crate::sandbox::outcome::ExecutionOutcome;
use crate::sandbox::resolver::{resolve, ExecutionResponse};
use crate::sandbox::runner::ExecutionRunner;
use crate::sandbox::workspace::WorkspaceManager;

/// Runs untrusted `def main():` scripts, one workspace per call.
///
/// The isolation mode is decided once, when the sandbox is built. A single
/// instance is meant to be shared (behind an `Arc`) by every request.
#[derive(Debug)]
pub struct PythonSandbox {
    config: SandboxConfig,
    mode: IsolationMode,
    workspaces: WorkspaceManager,
    runner: ExecutionRunner,
    permits: Option<Arc<Semaphore>>,
}

impl PythonSandbox {
    /// Create a sandbox, resolving the isolation mode from `config.isolation`.
    pub fn new(config: SandboxConfig) -> Result<Self> {
        let probe = IsolationProbe::from_config(&config);
        let decision = config.isolation.resolve(&probe);
        Self::with_mode(config, decision.mode)
    }

    /// Create a sandbox with an explicit isolation mode.
    pub fn with_mode(mut config: SandboxConfig, mode: IsolationMode) -> Result<Self> {
        if config.timeout.is_zero() {
            return Err(SandboxError::Config("timeout must be non-zero".into()));
        }
        if config.max_output_bytes == 0 {
            return Err(SandboxError::Config("max_output_bytes must be non-zero".into()));
        }
        if config.interpreter.trim().is_empty() {
            return Err(SandboxError::Config("interpreter must not be empty".into()));
        }
        if mode == IsolationMode::Isolated && !config.jail_mount_dir.is_absolute() {
            return Err(SandboxError::Config(
                "jail_mount_dir must be an absolute path".into(),
            ));
        }

        // The driver is handed absolute paths whatever the child's working directory.
        config.staging_dir = std::path::absolute(&config.staging_dir).map_err(|e| {
            SandboxError::Config(format!(
                "invalid staging_dir {}: {}",
                config.staging_dir.display(),
                e
            ))
        })?;

        let permits = match config.max_concurrent_executions {
            Some(0) => {
                return Err(SandboxError::Config(
                    "max_concurrent_executions must be non-zero".into(),
                ))
            }
            Some(limit) => Some(Arc::new(Semaphore::new(limit))),
            None => None,
        };

        Ok(Self {
            workspaces: WorkspaceManager::new(&config.staging_dir, &config.jail_mount_dir),
            runner: ExecutionRunner::from_config(&config),
            config,
            mode,
            permits,
        })
    }

    /// The isolation mode every execution uses.
    pub fn mode(&self) -> IsolationMode {
        self.mode
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Execute `source` and return the classified outcome.
    ///
    /// `Err` means the sandbox itself failed (workspace or spawn problems).
    /// The workspace is removed before this returns, on every path.
    pub async fn execute(&self, source: &str) -> Result<ExecutionOutcome> {
        let _permit = match &self.permits {
            Some(permits) => Some(
                Arc::clone(permits)
                    .acquire_owned()
                    .await
                    .map_err(|_| SandboxError::Config("execution limiter closed".into()))?,
            ),
            None => None,
        };

        let mut workspace = self.workspaces.allocate(source, self.mode).await?;
        debug!(workspace = %workspace.id(), mode = %self.mode, "starting execution");

        let outcome = self
            .runner
            .run(&workspace, self.mode, self.config.timeout)
            .await;
        workspace.release();
        outcome
    }

    /// Execute `source` and build the response payload. Never fails.
    pub async fn run(&self, source: &str) -> ExecutionResponse {
        let started = Instant::now();
        match self.execute(source).await {
            Ok(outcome) => {
                info!(
                    outcome = outcome.label(),
                    mode = %self.mode,
                    elapsed = ?started.elapsed(),
                    "execution finished"
                );
                resolve(outcome)
            }
            Err(err) => {
                error!(error = %err, mode = %self.mode, "sandbox failed to execute script");
                ExecutionResponse::from_error(&err)
            }
        }
    }
}
