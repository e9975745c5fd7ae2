//! Playbook OTel Correlator
//!
//! Converts the lifecycle events of a playbook run into a span tree and a
//! stream of span-correlated log records.
//!
//! ## Features
//!
//! - **Span Registry**: open unit spans keyed by unit identity
//! - **Event Correlator**: matches completions back to their spans and
//!   guarantees every span is closed exactly once
//! - **Run Aggregator**: per-run outcome counters reconciled against the
//!   engine's reported totals
//! - **Exporter boundary**: records leave through the `Exporter` trait
//! - **Telemetry**: explicit config from the environment, Prometheus metrics
//! - **Replay CLI**: drive the correlator from a JSON-lines event file
//!
//! ## Architecture
//!
//! 1. **Contracts** (`contracts/`): lifecycle events consumed from the
//!    execution engine.
//!
//! 2. **Registry** (`registry`): open spans per unit identity.
//!
//! 3. **Correlator** (`correlator`): the per-unit state machine.
//!
//! 4. **Aggregator** (`aggregator`): outcome counters.
//!
//! 5. **Telemetry** (`telemetry/`): config, exporters and metrics.
//!
//! 6. **CLI** (`cli/`): the `playbook-otel replay` command.
//!
//! ## Example
//!
//! ```rust
//! use playbook_otel::{
//!     contracts::{LifecycleEvent, Outcome, RunCounts},
//!     telemetry::{InMemoryExporter, TelemetryConfig},
//!     EventCorrelator,
//! };
//!
//! let mut correlator = EventCorrelator::new(TelemetryConfig::default(), InMemoryExporter::new());
//! correlator.handle(LifecycleEvent::run_start("site.yml"));
//! correlator.handle(LifecycleEvent::unit_start("t-1", "install pkg", "package"));
//! correlator.handle(LifecycleEvent::unit_complete("t-1", "host1", Outcome::Ok));
//! correlator.handle(LifecycleEvent::run_end(RunCounts::new(1, 0, 0, 0)));
//! correlator.shutdown().unwrap();
//!
//! assert_eq!(correlator.exporter().spans().len(), 2);
//! ```

pub mod aggregator;
pub mod cli;
pub mod correlator;
pub mod error;
pub mod registry;
pub mod run;
pub mod shared;
pub mod telemetry;

// Contracts module - located at ../contracts relative to src/
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use aggregator::RunAggregator;
pub use correlator::EventCorrelator;
pub use error::CorrelatorError;
pub use registry::{OpenOutcome, SpanHandle, SpanRegistry};
pub use run::{Run, UnitOfWork};
pub use shared::SharedCorrelator;
pub use telemetry::{
    CorrelatorMetrics, ExportError, Exporter, InMemoryExporter, JsonLinesExporter,
    TelemetryConfig, TelemetryError,
};

pub use contracts::{LifecycleEvent, Outcome, RunCounts, UnitId};

// Re-export CLI types for command-line usage
pub use cli::{ExitCode, OutputFormat, ReplayCli, ReplayCommands};

/// Crate version (from Cargo.toml)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the CLI application
///
/// This is the main entry point for the CLI binary.
pub fn run_cli(cli: ReplayCli) -> ExitCode {
    match cli::run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from_error(&e)
        }
    }
}
