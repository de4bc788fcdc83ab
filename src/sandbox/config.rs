//! Sandbox configuration with builder pattern.

use std::path::PathBuf;
use std::time::Duration;

use crate::sandbox::isolation::IsolationPolicy;

/// Configuration for the Python sandbox.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Wall-clock budget for one execution.
    pub timeout: Duration,
    /// Host directory holding per-request workspaces.
    pub staging_dir: PathBuf,
    /// Where `staging_dir` is mounted inside the jail.
    pub jail_mount_dir: PathBuf,
    /// Fixed location of the nsjail binary.
    pub nsjail_path: PathBuf,
    /// nsjail configuration file.
    pub nsjail_config: PathBuf,
    /// Python interpreter, resolved through `PATH`.
    pub interpreter: String,
    /// Environment variable whose presence marks a managed host without nsjail.
    pub managed_env_marker: String,
    /// Cap on captured bytes per output stream.
    pub max_output_bytes: usize,
    /// Cap on concurrently running children (`None` = unbounded).
    pub max_concurrent_executions: Option<usize>,
    /// How the isolation mode is chosen.
    pub isolation: IsolationPolicy,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            staging_dir: PathBuf::from("/tmp/nsjail"),
            jail_mount_dir: PathBuf::from("/tmp"),
            nsjail_path: PathBuf::from("/usr/bin/nsjail"),
            nsjail_config: PathBuf::from("/nsjail.cfg"),
            interpreter: "python3".to_string(),
            managed_env_marker: "K_SERVICE".to_string(),
            max_output_bytes: 1024 * 1024, // 1MB
            max_concurrent_executions: None,
            isolation: IsolationPolicy::Auto,
        }
    }
}

impl SandboxConfig {
    /// Create a new builder for SandboxConfig.
    pub fn builder() -> SandboxConfigBuilder {
        SandboxConfigBuilder::default()
    }
}

/// Builder for creating SandboxConfig instances.
#[derive(Debug, Clone, Default)]
pub struct SandboxConfigBuilder {
    timeout: Option<Duration>,
    staging_dir: Option<PathBuf>,
    jail_mount_dir: Option<PathBuf>,
    nsjail_path: Option<PathBuf>,
    nsjail_config: Option<PathBuf>,
    interpreter: Option<String>,
    managed_env_marker: Option<String>,
    max_output_bytes: Option<usize>,
    max_concurrent_executions: Option<usize>,
    isolation: Option<IsolationPolicy>,
}

impl SandboxConfigBuilder {
    /// Set the wall-clock budget.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the host staging directory.
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Set the in-jail mount point of the staging directory.
    pub fn jail_mount_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.jail_mount_dir = Some(dir.into());
        self
    }

    /// Set the path to the nsjail binary.
    pub fn nsjail_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.nsjail_path = Some(path.into());
        self
    }

    /// Set the path to the nsjail configuration.
    pub fn nsjail_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.nsjail_config = Some(path.into());
        self
    }

    /// Set the Python interpreter.
    pub fn interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    /// Set the managed-hosting environment marker.
    pub fn managed_env_marker(mut self, var: impl Into<String>) -> Self {
        self.managed_env_marker = Some(var.into());
        self
    }

    /// Set the per-stream output cap in bytes.
    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = Some(bytes);
        self
    }

    /// Limit how many children may run at once.
    pub fn max_concurrent_executions(mut self, limit: usize) -> Self {
        self.max_concurrent_executions = Some(limit);
        self
    }

    /// Choose the isolation policy.
    pub fn isolation(mut self, policy: IsolationPolicy) -> Self {
        self.isolation = Some(policy);
        self
    }

    /// Build the SandboxConfig.
    pub fn build(self) -> SandboxConfig {
        let default = SandboxConfig::default();
        SandboxConfig {
            timeout: self.timeout.unwrap_or(default.timeout),
            staging_dir: self.staging_dir.unwrap_or(default.staging_dir),
            jail_mount_dir: self.jail_mount_dir.unwrap_or(default.jail_mount_dir),
            nsjail_path: self.nsjail_path.unwrap_or(default.nsjail_path),
            nsjail_config: self.nsjail_config.unwrap_or(default.nsjail_config),
            interpreter: self.interpreter.unwrap_or(default.interpreter),
            managed_env_marker: self.managed_env_marker.unwrap_or(default.managed_env_marker),
            max_output_bytes: self.max_output_bytes.unwrap_or(default.max_output_bytes),
            max_concurrent_executions: self
                .max_concurrent_executions
                .or(default.max_concurrent_executions),
            isolation: self.isolation.unwrap_or(default.isolation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SandboxConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.staging_dir, PathBuf::from("/tmp/nsjail"));
        assert_eq!(config.jail_mount_dir, PathBuf::from("/tmp"));
        assert_eq!(config.interpreter, "python3");
        assert_eq!(config.isolation, IsolationPolicy::Auto);
        assert!(config.max_concurrent_executions.is_none());
    }

    #[test]
    fn test_builder() {
        let config = SandboxConfig::builder()
            .timeout(Duration::from_secs(5))
            .staging_dir("/var/run/sandbox")
            .interpreter("python3.12")
            .max_concurrent_executions(4)
            .isolation(IsolationPolicy::Direct)
            .build();

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.staging_dir, PathBuf::from("/var/run/sandbox"));
        assert_eq!(config.interpreter, "python3.12");
        assert_eq!(config.max_concurrent_executions, Some(4));
        assert_eq!(config.isolation, IsolationPolicy::Direct);
        // Untouched fields keep their defaults.
        assert_eq!(config.nsjail_config, PathBuf::from("/nsjail.cfg"));
    }
}
