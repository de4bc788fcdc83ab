//! Per-request workspaces under the staging directory.
//!
//! A [`Workspace`] owns one program file and one result file. Both (and the
//! driver's partial result file) are removed when the workspace is released
//! or dropped, whichever comes first.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, SandboxError};
use crate::sandbox::isolation::IsolationMode;
use crate::sandbox::wrapper::{wrap_source, PARTIAL_SUFFIX};

/// Prefix substitution between the host staging directory and its mount
/// point inside the jail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    outer: PathBuf,
    inner: PathBuf,
}

impl PathMapping {
    pub fn new(outer: impl Into<PathBuf>, inner: impl Into<PathBuf>) -> Self {
        Self {
            outer: outer.into(),
            inner: inner.into(),
        }
    }

    /// Host path to in-jail path. `None` if `path` is not under the staging dir.
    pub fn to_inner(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.outer)
            .ok()
            .map(|rest| self.inner.join(rest))
    }

    /// In-jail path back to host path.
    pub fn to_outer(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.inner)
            .ok()
            .map(|rest| self.outer.join(rest))
    }
}

/// Where the program and result live as seen from inside the jail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerPaths {
    pub program: PathBuf,
    pub result: PathBuf,
}

/// Allocates workspaces in a staging directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    staging_dir: PathBuf,
    mapping: PathMapping,
}

impl WorkspaceManager {
    pub fn new(staging_dir: impl Into<PathBuf>, jail_mount_dir: impl Into<PathBuf>) -> Self {
        let staging_dir = staging_dir.into();
        Self {
            mapping: PathMapping::new(staging_dir.clone(), jail_mount_dir),
            staging_dir,
        }
    }

    /// Create a fresh workspace and write the wrapped program into it.
    ///
    /// In [`IsolationMode::Isolated`] the driver is pointed at the in-jail
    /// result path; otherwise at the host path.
    pub async fn allocate(&self, source: &str, mode: IsolationMode) -> Result<Workspace> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| {
                SandboxError::Workspace(format!(
                    "cannot create staging directory {}: {}",
                    self.staging_dir.display(),
                    e
                ))
            })?;

        let id = Uuid::new_v4().simple().to_string();
        let program_path = self.staging_dir.join(format!("script_{}.py", id));
        let result_path = self.staging_dir.join(format!("result_{}.json", id));

        let inner = match mode {
            IsolationMode::Isolated => Some(InnerPaths {
                program: self.inner_path(&program_path)?,
                result: self.inner_path(&result_path)?,
            }),
            IsolationMode::Direct => None,
        };

        // Constructed before any file exists so a failed write is still cleaned up.
        let workspace = Workspace {
            id,
            program_path,
            result_path,
            inner,
            released: false,
        };

        let target_result = workspace.target_result_path();
        let target_result = target_result.to_str().ok_or_else(|| {
            SandboxError::Workspace(format!(
                "result path is not valid UTF-8: {}",
                target_result.display()
            ))
        })?;
        let program = wrap_source(source, target_result);

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&workspace.program_path)
            .await
            .map_err(|e| {
                SandboxError::Workspace(format!(
                    "cannot create {}: {}",
                    workspace.program_path.display(),
                    e
                ))
            })?;
        file.write_all(program.as_bytes()).await?;
        file.flush().await?;

        debug!(workspace = %workspace.id, ?mode, "workspace allocated");
        Ok(workspace)
    }

    fn inner_path(&self, path: &Path) -> Result<PathBuf> {
        self.mapping.to_inner(path).ok_or_else(|| {
            SandboxError::Workspace(format!(
                "{} is outside the staging directory",
                path.display()
            ))
        })
    }
}

/// One request's program and result files.
#[derive(Debug)]
pub struct Workspace {
    id: String,
    program_path: PathBuf,
    result_path: PathBuf,
    inner: Option<InnerPaths>,
    released: bool,
}

impl Workspace {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Host path of the program.
    pub fn program_path(&self) -> &Path {
        &self.program_path
    }

    /// Host path of the result.
    pub fn result_path(&self) -> &Path {
        &self.result_path
    }

    /// Host path of the driver's temporary result file.
    pub fn partial_result_path(&self) -> PathBuf {
        let mut path = OsString::from(self.result_path.as_os_str());
        path.push(PARTIAL_SUFFIX);
        PathBuf::from(path)
    }

    /// In-jail paths, present only for isolated workspaces.
    pub fn inner(&self) -> Option<&InnerPaths> {
        self.inner.as_ref()
    }

    /// The program path the child process should be given.
    pub fn target_program_path(&self) -> &Path {
        self.inner
            .as_ref()
            .map(|inner| inner.program.as_path())
            .unwrap_or(&self.program_path)
    }

    /// The result path the driver writes to.
    pub fn target_result_path(&self) -> &Path {
        self.inner
            .as_ref()
            .map(|inner| inner.result.as_path())
            .unwrap_or(&self.result_path)
    }

    /// Remove every file this workspace may have produced.
    ///
    /// Missing files are fine; other failures are logged and swallowed so a
    /// cleanup problem never hides the execution outcome.
    pub fn release(&mut self) {
        remove_quietly(&self.program_path);
        remove_quietly(&self.result_path);
        remove_quietly(&self.partial_result_path());
        if !self.released {
            debug!(workspace = %self.id, "workspace released");
        }
        self.released = true;
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.released {
            self.release();
        }
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove workspace file"),
    }
}
