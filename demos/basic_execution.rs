//! Basic example of executing a `def main():` script.
//!
//! Run with: cargo run --example basic_execution
//!
//! Uses nsjail when `/usr/bin/nsjail` and `/nsjail.cfg` exist, and runs
//! `python3` directly otherwise.

use std::time::Duration;
use nsjail_python_sandbox_rs::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let config = SandboxConfig::builder()
        .timeout(Duration::from_secs(5))
        .build();

    println!("Creating sandbox with config: {:?}", config);
    let sandbox = PythonSandbox::new(config)?;
    println!("Isolation mode: {}", sandbox.mode());

    println!("\n=== Test 1: Return a value ===");
    let response = sandbox.run("def main():\n    return {\"sum\": 2 + 2}\n").await;
    println!("{}", serde_json::to_string(&response).unwrap_or_default());

    println!("\n=== Test 2: Print and return ===");
    let code = r#"
def main():
    for i in range(3):
        print(f"Count: {i}")
    return "done"
"#;
    match sandbox.execute(code).await? {
        ExecutionOutcome::Success { result, stdout } => {
            println!("result: {}", result);
            println!("stdout:\n{}", stdout);
        }
        other => println!("unexpected outcome: {:?}", other),
    }

    println!("\n=== Test 3: Helpers and imports ===");
    let code = r#"
import math

def area(r):
    return math.pi * r * r

def main():
    return [round(area(r), 2) for r in range(1, 4)]
"#;
    let response = sandbox.run(code).await;
    println!("{}", serde_json::to_string(&response).unwrap_or_default());

    Ok(())
}
