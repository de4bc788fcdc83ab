//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use nsjail_python_sandbox_rs::prelude::*;

/// Whether a `python3` interpreter is on `PATH`.
pub fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// A direct-mode sandbox staged in `dir`, or `None` (with a note) without python3.
pub fn direct_sandbox(dir: &Path, timeout: Duration) -> Option<PythonSandbox> {
    if !python_available() {
        eprintln!("Skipping: python3 not found on PATH");
        return None;
    }
    let config = SandboxConfig::builder()
        .staging_dir(dir)
        .timeout(timeout)
        .isolation(IsolationPolicy::Direct)
        .build();
    Some(PythonSandbox::new(config).expect("sandbox config is valid"))
}

/// Number of entries left in the staging directory.
pub fn leftover_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
