//! Visual Test Runner
//!
//! Renders every scene on the GPU and on the CPU reference rasterizer and
//! compares the two.
//!
//! Usage:
//!   lustre-visual-tests              # Run all tests
//!   lustre-visual-tests --filter foo # Run tests matching "foo"
//!   lustre-visual-tests --list       # List all tests

use anyhow::Result;
use lustre_test_suite::{runner::TestRunner, tests};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--list") {
        println!("Available test suites:");
        for suite in tests::all_suites() {
            println!("\n  {}:", suite.name);
            for case in &suite.cases {
                println!("    - {}", case.name);
            }
        }
        return Ok(());
    }

    let filter = args
        .iter()
        .position(|a| a == "--filter")
        .and_then(|i| args.get(i + 1))
        .cloned();

    println!("╔══════════════════════════════════════════╗");
    println!("║       LUSTRE GPU / CPU VISUAL TESTS      ║");
    println!("╚══════════════════════════════════════════╝\n");

    let mut runner = TestRunner::new()?;

    for suite in tests::all_suites() {
        runner.add_suite(suite);
    }

    if let Some(ref pattern) = filter {
        println!("Running tests matching: {}\n", pattern);
        runner.filter(pattern);
    }

    let result = runner.run();
    result.print_summary();

    if result.all_passed() {
        println!("\nAll tests passed!");
        Ok(())
    } else {
        std::process::exit(1);
    }
}
