//! CLI command definitions for the playbook correlator
//!
//! Provides Clap-based command definitions for replaying recorded
//! lifecycle event streams through the correlator.

use anyhow::Context;
use clap::{Parser, Subcommand};
use prometheus::Registry;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::output::{OutputFormat, ReplaySummary};
use super::{CliError, ExitCode};
use crate::contracts::LifecycleEvent;
use crate::correlator::EventCorrelator;
use crate::telemetry::{Exporter, InMemoryExporter, JsonLinesExporter, TelemetryConfig};

/// Playbook OTel CLI
///
/// Replay recorded playbook lifecycle events into spans and correlated logs.
#[derive(Parser, Debug)]
#[command(name = "playbook-otel")]
#[command(about = "Correlate playbook lifecycle events into spans and logs", long_about = None)]
#[command(version)]
pub struct ReplayCli {
    /// Output verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit diagnostic logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: ReplayCommands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum ReplayCommands {
    /// Replay a JSON-lines event stream
    ///
    /// Each non-empty line is one lifecycle event, for example
    /// `{"event":"run_start","source_name":"site.yml"}`. Lines starting
    /// with `#` are ignored.
    Replay {
        /// Event file to read, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output format
        ///
        /// `json` writes every exported span and log record as one JSON line;
        /// `table` and `yaml` print the assembled span tree.
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Write output to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print correlator metrics (Prometheus text format) to stderr
        #[arg(long)]
        metrics: bool,
    },
}

/// Parse a JSON-lines event stream.
///
/// Blank lines and `#` comments are skipped. The first malformed line
/// aborts parsing with its line number.
pub fn parse_events<R: BufRead>(reader: R) -> Result<Vec<LifecycleEvent>, CliError> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => {
                CliError::InvalidInput(format!("line {}: {}", index + 1, e))
            }
            _ => CliError::File(e),
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed)
            .map_err(|e| CliError::InvalidInput(format!("line {}: {}", index + 1, e)))?;
        events.push(event);
    }
    Ok(events)
}

fn read_events(input: &Path) -> anyhow::Result<Vec<LifecycleEvent>> {
    if input == Path::new("-") {
        let stdin = io::stdin();
        return parse_events(stdin.lock()).context("reading events from stdin");
    }

    let file = File::open(input)
        .map_err(CliError::from)
        .with_context(|| format!("opening {}", input.display()))?;
    parse_events(BufReader::new(file)).with_context(|| format!("reading {}", input.display()))
}

fn open_output(output: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .map_err(CliError::from)
                .with_context(|| format!("creating {}", path.display()))?;
            Ok(Box::new(io::BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

/// Replay events through a correlator feeding `exporter`.
pub fn replay<E: Exporter>(
    events: Vec<LifecycleEvent>,
    config: TelemetryConfig,
    exporter: E,
    registry: Arc<Registry>,
) -> anyhow::Result<EventCorrelator<E>> {
    let mut correlator = EventCorrelator::from_config(config, exporter, registry)
        .context("initializing correlator")?;
    correlator.handle_all(events);
    correlator.shutdown().context("shutting down exporter")?;
    Ok(correlator)
}

/// Execute the replay command
pub fn execute_replay(
    input: &Path,
    format: OutputFormat,
    output: Option<&Path>,
    print_metrics: bool,
) -> anyhow::Result<ExitCode> {
    let events = read_events(input)?;
    tracing::info!(events = events.len(), input = %input.display(), "Replaying events");

    let config = TelemetryConfig::from_env();
    let registry = Arc::new(Registry::new());

    let (anomalies, metrics) = match format {
        OutputFormat::Json => {
            let exporter = JsonLinesExporter::new(open_output(output)?, &config);
            let correlator = replay(events, config, exporter, registry)?;
            (correlator.diagnostics().to_vec(), correlator.metrics().cloned())
        }
        OutputFormat::Table | OutputFormat::Yaml => {
            let correlator = replay(events, config, InMemoryExporter::new(), registry)?;
            let summary = ReplaySummary::build(
                correlator.exporter().spans(),
                correlator.exporter().logs().len(),
                correlator.diagnostics(),
            );
            let mut out = open_output(output)?;
            if format == OutputFormat::Yaml {
                summary.render_yaml(&mut out)?;
            } else {
                summary.render_table(&mut out).map_err(CliError::from)?;
            }
            out.flush().map_err(CliError::from)?;
            (correlator.diagnostics().to_vec(), correlator.metrics().cloned())
        }
    };

    for anomaly in &anomalies {
        eprintln!("warning: {}", anomaly);
    }
    if print_metrics {
        match metrics {
            Some(metrics) => eprint!("{}", metrics.render()?),
            None => eprintln!("metrics disabled by OTEL_CORRELATOR_ENABLE_METRICS"),
        }
    }

    Ok(ExitCode::from_anomalies(anomalies.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{Outcome, RunCounts};
    use std::io::Cursor;

    #[test]
    fn test_cli_parses_replay() {
        let cli = ReplayCli::try_parse_from([
            "playbook-otel",
            "-vv",
            "replay",
            "--input",
            "events.jsonl",
            "--format",
            "json",
            "--metrics",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            ReplayCommands::Replay {
                input,
                format,
                output,
                metrics,
            } => {
                assert_eq!(input, PathBuf::from("events.jsonl"));
                assert_eq!(format, OutputFormat::Json);
                assert!(output.is_none());
                assert!(metrics);
            }
        }
    }

    #[test]
    fn test_parse_events_skips_blank_and_comments() {
        let input = "# recorded run\n\
                     {\"event\":\"run_start\",\"source_name\":\"site.yml\"}\n\
                     \n\
                     {\"event\":\"run_end\",\"counts\":{}}\n";
        let events = parse_events(Cursor::new(input)).unwrap();

        assert_eq!(
            events,
            vec![
                LifecycleEvent::run_start("site.yml"),
                LifecycleEvent::run_end(RunCounts::default()),
            ]
        );
    }

    #[test]
    fn test_parse_events_reports_line_number() {
        let input = "{\"event\":\"run_start\"}\nnot json\n";
        match parse_events(Cursor::new(input)) {
            Err(CliError::InvalidInput(msg)) => assert!(msg.starts_with("line 2:")),
            other => panic!("expected invalid input, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_events_rejects_non_utf8_as_invalid_input() {
        let input: &[u8] = b"{\"event\":\"run_start\"}\n\xff\xfe\n";
        match parse_events(Cursor::new(input)) {
            Err(CliError::InvalidInput(msg)) => assert!(msg.starts_with("line 2:")),
            other => panic!("expected invalid input, got {:?}", other),
        }
    }

    #[test]
    fn test_execute_replay_non_utf8_file_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("events.jsonl");
        std::fs::write(&input, b"\xff\xfe").unwrap();

        let err = execute_replay(&input, OutputFormat::Table, None, false).unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::InvalidInput);
    }

    #[test]
    fn test_replay_closes_everything() {
        let events = vec![
            LifecycleEvent::run_start("site.yml"),
            LifecycleEvent::unit_start("t", "install pkg", "package"),
            LifecycleEvent::unit_complete("t", "host1", Outcome::Ok),
            LifecycleEvent::run_end(RunCounts::new(1, 0, 0, 0)),
        ];
        let correlator = replay(
            events,
            TelemetryConfig::default(),
            InMemoryExporter::new(),
            Arc::new(Registry::new()),
        )
        .unwrap();

        assert!(correlator.exporter().is_shut_down());
        assert_eq!(correlator.exporter().spans().len(), 2);
        assert!(correlator.diagnostics().is_empty());
    }

    #[test]
    fn test_execute_replay_json_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("events.jsonl");
        let output = dir.path().join("records.jsonl");
        std::fs::write(
            &input,
            "{\"event\":\"run_start\",\"source_name\":\"site.yml\"}\n\
             {\"event\":\"unit_start\",\"identity\":\"t\",\"name\":\"ping\",\"kind\":\"ping\"}\n\
             {\"event\":\"run_end\",\"counts\":{}}\n",
        )
        .unwrap();

        let code = execute_replay(&input, OutputFormat::Json, Some(&output), false).unwrap();
        assert_eq!(code, ExitCode::Success);

        let written = std::fs::read_to_string(&output).unwrap();
        let types: Vec<String> = written
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["type"].to_string())
            .collect();
        // playbook_start, task_start, forced unit span, root span, playbook_end
        assert_eq!(types.len(), 5);
        assert_eq!(types.iter().filter(|t| t.as_str() == "\"span\"").count(), 2);
    }

    #[test]
    fn test_execute_replay_missing_file() {
        let err = execute_replay(
            Path::new("/nonexistent/events.jsonl"),
            OutputFormat::Table,
            None,
            false,
        )
        .unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::FileError);
    }
}
