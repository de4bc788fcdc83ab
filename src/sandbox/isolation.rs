//! Choosing between nsjail and direct execution.
//!
//! The decision is made from read-only probes (one environment variable and
//! two file existence checks) and is stable for the lifetime of the process,
//! so [`PythonSandbox`](crate::PythonSandbox) resolves it once and hands the
//! result to the runner.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use tracing::{info, warn};

use crate::sandbox::config::SandboxConfig;

/// How a script is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationMode {
    /// Run under nsjail with the configured policy.
    Isolated,
    /// Run the interpreter directly; the deployment provides the boundary.
    Direct,
}

impl IsolationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationMode::Isolated => "isolated",
            IsolationMode::Direct => "direct",
        }
    }
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured policy: probe the environment, or force a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationPolicy {
    #[default]
    Auto,
    Isolated,
    Direct,
}

impl FromStr for IsolationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(IsolationPolicy::Auto),
            "isolated" | "nsjail" => Ok(IsolationPolicy::Isolated),
            "direct" => Ok(IsolationPolicy::Direct),
            other => Err(format!(
                "unknown isolation policy '{}' (expected auto, isolated or direct)",
                other
            )),
        }
    }
}

/// Why the probe settled on its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationReason {
    /// nsjail and its config are both present.
    Available,
    /// The managed-hosting marker is set; that platform supplies isolation.
    ManagedHost,
    BinaryMissing,
    ConfigMissing,
    /// The policy forced the mode without probing.
    Forced,
}

impl fmt::Display for IsolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IsolationReason::Available => "nsjail and its config are present",
            IsolationReason::ManagedHost => "running on a managed host",
            IsolationReason::BinaryMissing => "nsjail binary not found",
            IsolationReason::ConfigMissing => "nsjail config not found",
            IsolationReason::Forced => "forced by configuration",
        };
        f.write_str(s)
    }
}

/// A resolved mode together with its reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolationDecision {
    pub mode: IsolationMode,
    pub reason: IsolationReason,
}

/// Read-only probes for the isolation provider.
#[derive(Debug, Clone)]
pub struct IsolationProbe {
    nsjail_path: PathBuf,
    nsjail_config: PathBuf,
    managed_env_marker: String,
}

impl IsolationProbe {
    pub fn new(
        nsjail_path: impl Into<PathBuf>,
        nsjail_config: impl Into<PathBuf>,
        managed_env_marker: impl Into<String>,
    ) -> Self {
        Self {
            nsjail_path: nsjail_path.into(),
            nsjail_config: nsjail_config.into(),
            managed_env_marker: managed_env_marker.into(),
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(
            &config.nsjail_path,
            &config.nsjail_config,
            &config.managed_env_marker,
        )
    }

    /// Probe the process environment and filesystem.
    pub fn select_mode(&self) -> IsolationDecision {
        self.select_mode_with(|var| std::env::var_os(var).is_some())
    }

    /// Probe with a custom environment lookup.
    pub fn select_mode_with(&self, env_has: impl Fn(&str) -> bool) -> IsolationDecision {
        let direct = |reason| IsolationDecision {
            mode: IsolationMode::Direct,
            reason,
        };

        if !self.managed_env_marker.is_empty() && env_has(&self.managed_env_marker) {
            return direct(IsolationReason::ManagedHost);
        }
        if !self.nsjail_path.is_file() {
            return direct(IsolationReason::BinaryMissing);
        }
        if !self.nsjail_config.is_file() {
            return direct(IsolationReason::ConfigMissing);
        }

        IsolationDecision {
            mode: IsolationMode::Isolated,
            reason: IsolationReason::Available,
        }
    }
}

impl IsolationPolicy {
    /// Resolve the policy into a concrete mode, probing only for `Auto`.
    pub fn resolve(self, probe: &IsolationProbe) -> IsolationDecision {
        let decision = match self {
            IsolationPolicy::Auto => probe.select_mode(),
            IsolationPolicy::Isolated => IsolationDecision {
                mode: IsolationMode::Isolated,
                reason: IsolationReason::Forced,
            },
            IsolationPolicy::Direct => IsolationDecision {
                mode: IsolationMode::Direct,
                reason: IsolationReason::Forced,
            },
        };

        if self == IsolationPolicy::Isolated && !probe.nsjail_path.is_file() {
            warn!(
                nsjail = %probe.nsjail_path.display(),
                "isolation forced but nsjail binary is missing; executions will fail to start"
            );
        }
        info!(mode = %decision.mode, reason = %decision.reason, "isolation mode selected");
        decision
    }
}
