//! Merge-path latency harness: prints a JSON report and fails on p95 regression.

use sr_server::latency::{BenchConfig, run_merge_benchmark};
use sr_server::{HARNESS_LOG_DIRECTIVES, init_tracing};

fn main() {
    // stderr only, so stdout stays a clean JSON report
    if let Err(e) = init_tracing(HARNESS_LOG_DIRECTIVES) {
        eprintln!("searchrank-latency-harness: logging disabled: {e}");
    }

    if let Err(e) = run() {
        eprintln!("searchrank-latency-harness failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let mut config = BenchConfig::default();
    if let Some(budget) = std::env::var("SEARCHRANK_P95_BUDGET_MS")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.p95_budget_ms = budget;
    }

    let report = run_merge_benchmark(&config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    report.check_budget()?;
    Ok(())
}
