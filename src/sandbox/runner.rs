//! Running a materialized workspace under a wall-clock budget.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{stderr_diagnostic, stderr_tail, Result, SandboxError};
use crate::sandbox::config::SandboxConfig;
use crate::sandbox::io::capture;
use crate::sandbox::isolation::IsolationMode;
use crate::sandbox::outcome::{ExecutionOutcome, FaultKind, ProcessFault};
use crate::sandbox::workspace::Workspace;
use crate::sandbox::wrapper::{EXIT_ENTRY_FAULT, EXIT_ENTRY_MISSING, EXIT_NOT_SERIALIZABLE};

const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Starts the interpreter (directly or through nsjail) and classifies what happened.
#[derive(Debug, Clone)]
pub struct ExecutionRunner {
    interpreter: String,
    nsjail_path: PathBuf,
    nsjail_config: PathBuf,
    max_output_bytes: usize,
}

impl ExecutionRunner {
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            nsjail_path: config.nsjail_path.clone(),
            nsjail_config: config.nsjail_config.clone(),
            max_output_bytes: config.max_output_bytes,
        }
    }

    /// Build the child command for `workspace`.
    ///
    /// Isolated: `nsjail --config <cfg> -- <interpreter> <inner program>`.
    /// Direct: `<interpreter> <program>`, run from the staging directory.
    pub fn build_command(&self, workspace: &Workspace, mode: IsolationMode) -> Command {
        let mut command = match mode {
            IsolationMode::Isolated => {
                let mut command = Command::new(&self.nsjail_path);
                command
                    .arg("--config")
                    .arg(&self.nsjail_config)
                    .arg("--")
                    .arg(&self.interpreter)
                    .arg(workspace.target_program_path());
                command
            }
            IsolationMode::Direct => {
                let mut command = Command::new(&self.interpreter);
                command.arg(workspace.program_path());
                if let Some(dir) = workspace.program_path().parent() {
                    command.current_dir(dir);
                }
                command
            }
        };

        let path = std::env::var("PATH").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        command
            .env_clear()
            .env("PATH", path)
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env("PYTHONUNBUFFERED", "1")
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so a timeout can take down everything the script forked.
        #[cfg(unix)]
        command.process_group(0);

        command
    }

    /// Execute `workspace` and classify the result.
    ///
    /// Returns `Err` only for failures of the sandbox itself (spawn, wait,
    /// reading the result file); everything the script can cause is an
    /// [`ExecutionOutcome`].
    pub async fn run(
        &self,
        workspace: &Workspace,
        mode: IsolationMode,
        budget: Duration,
    ) -> Result<ExecutionOutcome> {
        let mut command = self.build_command(workspace, mode);
        let program = command.as_std().get_program().to_string_lossy().into_owned();

        let started = Instant::now();
        let deadline = started + budget;
        let mut child = command
            .spawn()
            .map_err(|source| SandboxError::Spawn { program, source })?;
        let mut group = ProcessGroupGuard::new(child.id());
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.max_output_bytes;

        let waited = tokio::time::timeout_at(deadline, async {
            let (status, stdout, stderr) = tokio::join!(
                child.wait(),
                capture(stdout, limit),
                capture(stderr, limit)
            );
            Ok::<_, std::io::Error>((status?, stdout?, stderr?))
        })
        .await;

        // Whatever the script left running in its group dies with the request.
        group.kill();

        let (status, stdout, stderr) = match waited {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    workspace = %workspace.id(),
                    ?budget,
                    "execution exceeded its budget, killed process group"
                );
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "child already gone after group kill");
                }
                return Ok(ExecutionOutcome::Timeout(budget));
            }
        };

        if stdout.is_truncated() || stderr.is_truncated() {
            warn!(
                workspace = %workspace.id(),
                limit,
                "child output exceeded the capture limit and was truncated"
            );
        }

        let exit_code = status.code();
        debug!(
            workspace = %workspace.id(),
            ?exit_code,
            elapsed = ?started.elapsed(),
            "child exited"
        );

        // The result file, not the exit code, decides success.
        let read = tokio::time::timeout_at(
            deadline,
            read_result_file(workspace.result_path(), self.max_output_bytes),
        )
        .await;
        let outcome = match read {
            Err(_) => {
                warn!(workspace = %workspace.id(), ?budget, "reading the result exceeded the budget");
                ExecutionOutcome::Timeout(budget)
            }
            Ok(Ok(ResultFile::Missing)) => {
                classify_missing_result(exit_code, &stderr.to_string_lossy())
            }
            Ok(Ok(ResultFile::Rejected(reason))) => {
                warn!(workspace = %workspace.id(), %reason, "result file rejected");
                ExecutionOutcome::MalformedResult(reason)
            }
            Ok(Ok(ResultFile::Contents(bytes))) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(result) => ExecutionOutcome::Success {
                    result,
                    stdout: stdout.trimmed(),
                },
                Err(e) => ExecutionOutcome::MalformedResult(e.to_string()),
            },
            Ok(Err(e)) => return Err(SandboxError::Io(e)),
        };

        Ok(outcome)
    }
}

/// What was found at the result location.
#[derive(Debug, PartialEq, Eq)]
enum ResultFile {
    Missing,
    /// Something the driver could not have written: a link, a FIFO, a device,
    /// or a file over the size cap.
    Rejected(String),
    Contents(Vec<u8>),
}

/// Read the result file without trusting what the script put there.
///
/// The final component is opened with `O_NOFOLLOW` and `O_NONBLOCK`, so a
/// symlink fails to open and a FIFO cannot stall the open. Only a regular
/// file of at most `limit` bytes is read.
async fn read_result_file(path: &Path, limit: usize) -> std::io::Result<ResultFile> {
    let mut options = tokio::fs::OpenOptions::new();
    options.read(true);
    #[cfg(unix)]
    {
        use nix::fcntl::OFlag;
        options.custom_flags((OFlag::O_NOFOLLOW | OFlag::O_NONBLOCK).bits());
    }

    let file = match options.open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ResultFile::Missing),
        #[cfg(unix)]
        Err(e) if e.raw_os_error() == Some(nix::errno::Errno::ELOOP as i32) => {
            return Ok(ResultFile::Rejected("result is a symbolic link".into()))
        }
        Err(e) => return Err(e),
    };

    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Ok(ResultFile::Rejected("result is not a regular file".into()));
    }
    if metadata.len() > limit as u64 {
        return Ok(ResultFile::Rejected(format!(
            "result exceeds {} bytes",
            limit
        )));
    }

    // The length is re-checked while reading in case the file is still growing.
    let mut bytes = Vec::with_capacity(metadata.len() as usize);
    file.take(limit as u64 + 1).read_to_end(&mut bytes).await?;
    if bytes.len() > limit {
        return Ok(ResultFile::Rejected(format!(
            "result exceeds {} bytes",
            limit
        )));
    }
    Ok(ResultFile::Contents(bytes))
}

/// Decide what a run without a result file means.
///
/// The driver's own exit codes are trusted first. Any other exit is a crash
/// if it left something on stderr, and a silent no-result otherwise. Only a
/// recognized Python exception is passed on as the message; other stderr
/// (nsjail's log lines, for one) is logged and replaced by the exit status.
pub fn classify_missing_result(exit_code: Option<i32>, stderr: &str) -> ExecutionOutcome {
    let fault = |kind, message| {
        ExecutionOutcome::ProcessError(ProcessFault {
            kind,
            message,
            exit_code,
        })
    };
    let diagnostic = stderr_diagnostic(stderr);

    match exit_code {
        Some(0) | Some(EXIT_ENTRY_MISSING) => ExecutionOutcome::NoResultProduced,
        Some(EXIT_ENTRY_FAULT) => fault(
            FaultKind::EntryPointRaised,
            diagnostic.unwrap_or_else(|| "an unknown error".to_string()),
        ),
        Some(EXIT_NOT_SERIALIZABLE) => fault(
            FaultKind::NotSerializable,
            diagnostic.unwrap_or_else(|| "unknown type".to_string()),
        ),
        _ => match (diagnostic, stderr_tail(stderr)) {
            (Some(message), _) => fault(FaultKind::Crashed, message),
            (None, Some(tail)) => {
                warn!(?exit_code, stderr = %tail, "child failed without a Python exception");
                fault(FaultKind::Crashed, exit_status_message(exit_code))
            }
            (None, None) => ExecutionOutcome::NoResultProduced,
        },
    }
}

fn exit_status_message(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("process exited with code {}", code),
        None => "process was terminated by a signal".to_string(),
    }
}

/// Kills the child's process group on [`kill`](Self::kill) or when dropped.
///
/// The drop covers the caller abandoning the execution future, where
/// `kill_on_drop` alone would only reach the direct child.
struct ProcessGroupGuard {
    pid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    fn kill(&mut self) {
        kill_process_group(self.pid.take());
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(raw) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid = raw, error = %e, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
