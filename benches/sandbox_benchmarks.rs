//! Benchmarks for the Python sandbox.
//!
//! Run with: cargo bench
//!
//! The execution benchmarks need `python3` on PATH and run in direct mode.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

use nsjail_python_sandbox_rs::prelude::*;
use nsjail_python_sandbox_rs::sandbox::runner::classify_missing_result;
use nsjail_python_sandbox_rs::sandbox::wrapper::wrap_source;
use nsjail_python_sandbox_rs::{resolve, ScriptLimits};

const SUM_SCRIPT: &str = "def main():\n    return {\"sum\": 2+2}\n";

fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn direct_sandbox(dir: &std::path::Path) -> PythonSandbox {
    let config = SandboxConfig::builder()
        .staging_dir(dir)
        .timeout(Duration::from_secs(30))
        .isolation(IsolationPolicy::Direct)
        .build();
    PythonSandbox::new(config).unwrap()
}

/// Host-side work done on every request, without a child process.
fn bench_request_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("overhead");

    let large = format!("{}\n# {}", SUM_SCRIPT, "x".repeat(40_000));
    for (name, script) in [("small", SUM_SCRIPT), ("large", large.as_str())] {
        group.throughput(Throughput::Bytes(script.len() as u64));
        group.bench_with_input(BenchmarkId::new("validate", name), script, |b, script| {
            let limits = ScriptLimits::default();
            b.iter(|| limits.validate(black_box(script)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("wrap", name), script, |b, script| {
            b.iter(|| wrap_source(black_box(script), "/tmp/result_bench.json"));
        });
    }

    let stderr = "Traceback (most recent call last):\n  File \"/tmp/script.py\", line 2, in main\nValueError: boom\n";
    group.bench_function("classify_fault", |b| {
        b.iter(|| resolve(classify_missing_result(Some(4), black_box(stderr))));
    });

    group.finish();
}

/// Full round trips through a real interpreter.
fn bench_execution(c: &mut Criterion) {
    if !python_available() {
        eprintln!("Skipping execution benchmark: python3 not found");
        return;
    }

    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let sandbox = direct_sandbox(dir.path());

    let mut group = c.benchmark_group("execution");
    group.sample_size(20);

    group.bench_function("return_dict", |b| {
        b.iter(|| black_box(rt.block_on(sandbox.run(SUM_SCRIPT))));
    });

    group.bench_function("print_and_return", |b| {
        let script = "def main():\n    for i in range(100):\n        print(i)\n    return 1\n";
        b.iter(|| black_box(rt.block_on(sandbox.run(script))));
    });

    group.bench_function("raises", |b| {
        let script = "def main():\n    raise ValueError('boom')\n";
        b.iter(|| black_box(rt.block_on(sandbox.run(script))));
    });

    group.finish();
}

/// Concurrent executions sharing one sandbox.
fn bench_concurrent_execution(c: &mut Criterion) {
    if !python_available() {
        eprintln!("Skipping concurrent benchmark: python3 not found");
        return;
    }

    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Arc::new(direct_sandbox(dir.path()));

    let mut group = c.benchmark_group("concurrent");
    group.sample_size(10);

    for concurrency in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(*concurrency as u64));
        group.bench_with_input(
            BenchmarkId::new("executions", concurrency),
            concurrency,
            |b, &concurrency| {
                b.iter(|| {
                    rt.block_on(async {
                        let mut handles = Vec::new();
                        for _ in 0..concurrency {
                            let sandbox = Arc::clone(&sandbox);
                            handles.push(tokio::spawn(async move { sandbox.run(SUM_SCRIPT).await }));
                        }
                        for handle in handles {
                            black_box(handle.await.unwrap());
                        }
                    });
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_request_overhead,
    bench_execution,
    bench_concurrent_execution,
);

criterion_main!(benches);
