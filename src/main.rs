//! nsjail-python-sandbox binary
//!
//! Serves `POST /execute` and `GET /health`. Every flag can also be set
//! through the environment variable named next to it.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use nsjail_python_sandbox_rs::server::{serve_with_shutdown, shutdown_signal, ServerConfig};
use nsjail_python_sandbox_rs::{IsolationPolicy, PythonSandbox, SandboxConfig};
use tracing_subscriber::EnvFilter;

/// Command line arguments for the sandbox server.
#[derive(Parser, Debug)]
#[command(name = "nsjail-python-sandbox")]
#[command(about = "Execute untrusted Python main() functions under nsjail over HTTP")]
#[command(version)]
struct Args {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Wall-clock budget per execution, in seconds
    #[arg(long, env = "SANDBOX_TIMEOUT_SECS", default_value = "15")]
    timeout: u64,

    /// Host directory for per-request workspaces
    #[arg(long, env = "SANDBOX_STAGING_DIR", default_value = "/tmp/nsjail")]
    staging_dir: PathBuf,

    /// Mount point of the staging directory inside the jail
    #[arg(long, env = "SANDBOX_JAIL_MOUNT_DIR", default_value = "/tmp")]
    jail_mount_dir: PathBuf,

    /// Path to the nsjail binary
    #[arg(long, env = "NSJAIL_PATH", default_value = "/usr/bin/nsjail")]
    nsjail_path: PathBuf,

    /// Path to the nsjail configuration
    #[arg(long, env = "NSJAIL_CONFIG", default_value = "/nsjail.cfg")]
    nsjail_config: PathBuf,

    /// Python interpreter
    #[arg(long, env = "SANDBOX_PYTHON", default_value = "python3")]
    interpreter: String,

    /// auto, isolated or direct
    #[arg(long, env = "SANDBOX_ISOLATION", default_value = "auto")]
    isolation: IsolationPolicy,

    /// Environment variable that marks a managed host without nsjail
    #[arg(long, env = "SANDBOX_MANAGED_MARKER", default_value = "K_SERVICE")]
    managed_marker: String,

    /// Maximum script size in characters
    #[arg(long, env = "SANDBOX_MAX_SCRIPT_CHARS", default_value = "50000")]
    max_script_chars: usize,

    /// Maximum request body size in bytes
    #[arg(long, env = "SANDBOX_MAX_BODY_BYTES", default_value = "1048576")] // 1MB
    max_body_size: usize,

    /// Maximum captured bytes per output stream
    #[arg(long, env = "SANDBOX_MAX_OUTPUT_BYTES", default_value = "1048576")] // 1MB
    max_output_bytes: usize,

    /// Maximum number of scripts running at once
    #[arg(long, env = "SANDBOX_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind_addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid bind address '{}:{}'", args.host, args.port))?;

    let mut builder = SandboxConfig::builder()
        .timeout(Duration::from_secs(args.timeout))
        .staging_dir(args.staging_dir)
        .jail_mount_dir(args.jail_mount_dir)
        .nsjail_path(args.nsjail_path)
        .nsjail_config(args.nsjail_config)
        .interpreter(args.interpreter)
        .managed_env_marker(args.managed_marker)
        .max_output_bytes(args.max_output_bytes)
        .isolation(args.isolation);
    if let Some(limit) = args.max_concurrent {
        builder = builder.max_concurrent_executions(limit);
    }
    let config = builder.build();

    tracing::info!(?config, "starting sandbox");
    let sandbox = PythonSandbox::new(config).context("failed to create sandbox")?;

    let server_config = ServerConfig::new()
        .with_bind_addr(bind_addr)
        .with_max_body_size(args.max_body_size)
        .with_max_script_chars(args.max_script_chars);

    serve_with_shutdown(Arc::new(sandbox), server_config, shutdown_signal()).await?;

    Ok(())
}
