//! Example of concurrent executions sharing one sandbox.
//!
//! Every call gets its own workspace, so scripts never see each other's
//! files. A concurrency limit queues calls beyond it.
//!
//! Run with: cargo run --example concurrent_execution

use std::sync::Arc;
use std::time::{Duration, Instant};
use nsjail_python_sandbox_rs::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Concurrent Execution Example ===\n");

    let config = SandboxConfig::builder()
        .timeout(Duration::from_secs(10))
        .max_concurrent_executions(2)
        .build();
    let sandbox = Arc::new(PythonSandbox::new(config)?);
    println!("Isolation mode: {}\n", sandbox.mode());

    let tasks = vec![
        ("Task 1", "sum([i**2 for i in range(100)])", "Sum of squares"),
        (
            "Task 2",
            "len([x for x in range(1000) if x % 3 == 0])",
            "Count divisible by 3",
        ),
        (
            "Task 3",
            "''.join([chr(65 + i % 26) for i in range(50)])",
            "Generate letters",
        ),
        ("Task 4", "max([i * (100 - i) for i in range(101)])", "Maximum product"),
    ];

    println!("Starting {} concurrent tasks...\n", tasks.len());
    let start = Instant::now();

    let mut handles = Vec::new();
    for (name, expr, description) in tasks {
        let sandbox = Arc::clone(&sandbox);
        handles.push(tokio::spawn(async move {
            let script = format!("def main():\n    return {}\n", expr);
            let task_start = Instant::now();
            let response = sandbox.run(&script).await;
            (name, description, response, task_start.elapsed())
        }));
    }

    for handle in handles {
        match handle.await {
            Ok((name, description, response, elapsed)) => {
                println!("{} ({}) in {:?}", name, description, elapsed);
                println!("  {}", serde_json::to_string(&response).unwrap_or_default());
            }
            Err(e) => eprintln!("task panicked: {}", e),
        }
    }

    println!("\nAll tasks finished in {:?}", start.elapsed());
    Ok(())
}
