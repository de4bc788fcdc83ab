//! Example of the failure modes a script can hit.
//!
//! Run with: cargo run --example error_handling

use std::time::Duration;
use nsjail_python_sandbox_rs::prelude::*;
use nsjail_python_sandbox_rs::ScriptLimits;

#[tokio::main]
async fn main() -> Result<()> {
    let config = SandboxConfig::builder()
        .timeout(Duration::from_secs(2))
        .build();
    let sandbox = PythonSandbox::new(config)?;
    let limits = ScriptLimits::default();

    let cases = [
        ("No entry point", "print('hello')"),
        ("Exception", "def main():\n    raise ValueError('boom')"),
        ("Syntax error", "def main():\n    return (1 +"),
        ("Not serializable", "def main():\n    return {1, 2, 3}"),
        ("No result", "import sys\ndef main():\n    sys.exit(0)"),
        ("Timeout", "def main():\n    while True:\n        pass"),
    ];

    for (name, script) in cases {
        println!("=== {} ===", name);

        // The HTTP layer runs this check before anything is executed.
        if let Err(e) = limits.validate(script) {
            println!("rejected: {}\n", e.client_message());
            continue;
        }

        match sandbox.execute(script).await {
            Ok(outcome) => {
                println!("outcome: {}", outcome.label());
                if let Err(e) = outcome.into_result() {
                    println!("client sees: {}", e.client_message());
                    if let SandboxError::ProcessFault { exit_code, .. } = &e {
                        println!("exit code: {:?}", exit_code);
                    }
                }
            }
            Err(e) => eprintln!("sandbox error: {}", e),
        }
        println!();
    }

    Ok(())
}
