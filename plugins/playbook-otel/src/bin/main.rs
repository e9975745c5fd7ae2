//! Playbook OTel CLI
//!
//! Replays recorded playbook lifecycle events through the correlator.
//!
//! # Usage
//!
//! ```bash
//! # Print the span tree of a recorded run
//! playbook-otel replay --input run.jsonl
//!
//! # Write exported spans and logs as JSON lines, with metrics on stderr
//! playbook-otel replay --input run.jsonl --format json --output records.jsonl --metrics
//!
//! # Read events from stdin
//! cat run.jsonl | playbook-otel -v replay --format yaml
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success - every event correlated cleanly
//! - 2: Replay finished with anomalies
//! - 3: Invalid input or arguments
//! - 4: File not found or inaccessible
//! - 10: Internal error

use clap::Parser;
use playbook_otel::{run_cli, ReplayCli};
use tracing::Level;

fn main() {
    let cli = ReplayCli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    // Diagnostics go to stderr so stdout stays clean for exported records
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let exit_code = run_cli(cli);
    std::process::exit(exit_code.into());
}
