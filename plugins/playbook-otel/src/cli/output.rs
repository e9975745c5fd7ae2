//! Output formatting for the replay command
//!
//! Renders the assembled span trees of a replay as YAML or a human-readable
//! table with status-based coloring. JSON output bypasses the summary: the
//! exported records themselves are written as JSON lines.

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use playbook_span::{AttributeKey, Attributes, Span, SpanStatus, SpanTree};
use serde::Serialize;
use std::io::Write;

use crate::error::CorrelatorError;

/// Output format options for CLI results
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum OutputFormat {
    /// Human-readable table format with colors
    #[default]
    Table,
    /// JSON format for machine processing
    Json,
    /// YAML format
    Yaml,
}

/// Replay result structure for rendering
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    /// One entry per run
    pub runs: Vec<TreeOutput>,
    /// Number of log records exported
    pub log_records: usize,
    /// Anomalies recorded while correlating
    pub anomalies: Vec<AnomalyOutput>,
}

/// A root span with its direct children
#[derive(Debug, Clone, Serialize)]
pub struct TreeOutput {
    pub root: SpanOutput,
    pub children: Vec<SpanOutput>,
}

/// Individual span output structure
#[derive(Debug, Clone, Serialize)]
pub struct SpanOutput {
    pub name: String,
    pub status: SpanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalyOutput {
    pub kind: String,
    pub message: String,
}

impl ReplaySummary {
    /// Assemble trees from exported spans
    pub fn build(spans: &[Span], log_records: usize, anomalies: &[CorrelatorError]) -> Self {
        let runs = SpanTree::assemble(spans.iter().cloned())
            .iter()
            .map(TreeOutput::from_tree)
            .collect();
        let anomalies = anomalies
            .iter()
            .map(|a| AnomalyOutput {
                kind: a.kind().to_string(),
                message: a.to_string(),
            })
            .collect();

        Self {
            runs,
            log_records,
            anomalies,
        }
    }

    /// Render as YAML
    pub fn render_yaml(&self, out: &mut dyn Write) -> Result<(), serde_yaml::Error> {
        serde_yaml::to_writer(out, self)
    }

    /// Render as human-readable table
    pub fn render_table(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out)?;
        writeln!(out, "{}", "Replay Results".cyan().bold())?;
        writeln!(out, "{}", "=".repeat(60))?;

        for run in &self.runs {
            writeln!(out)?;
            run.root.render_row(out, "")?;
            if let Some(stats) = stats_line(&run.root.attributes) {
                writeln!(out, "  {} {}", "Stats:".dimmed(), stats)?;
            }
            for child in &run.children {
                child.render_row(out, "  ")?;
            }
        }

        writeln!(out)?;
        writeln!(
            out,
            "{} run(s), {} log record(s)",
            self.runs.len(),
            self.log_records
        )?;

        if !self.anomalies.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", "Anomalies:".yellow().bold())?;
            for anomaly in &self.anomalies {
                writeln!(
                    out,
                    "  {} [{}] {}",
                    "!".yellow(),
                    anomaly.kind.dimmed(),
                    anomaly.message
                )?;
            }
        }
        Ok(())
    }
}

impl TreeOutput {
    pub fn from_tree(tree: &SpanTree) -> Self {
        Self {
            root: SpanOutput::from_span(&tree.root),
            children: tree.children.iter().map(SpanOutput::from_span).collect(),
        }
    }
}

impl SpanOutput {
    pub fn from_span(span: &Span) -> Self {
        Self {
            name: span.name.clone(),
            status: span.status(),
            error_detail: span.error_detail().map(str::to_string),
            duration_ms: span.duration_ms(),
            attributes: span.attributes().clone(),
        }
    }

    fn render_row(&self, out: &mut dyn Write, indent: &str) -> std::io::Result<()> {
        let host = self
            .attributes
            .get(&AttributeKey::HostName)
            .and_then(|v| v.as_str())
            .map(|h| format!(" @ {}", h.cyan()))
            .unwrap_or_default();
        let duration = self
            .duration_ms
            .map(|ms| format!(" ({})", format_duration(ms).dimmed()))
            .unwrap_or_default();

        write!(
            out,
            "{}{} {}{} {}{}",
            indent,
            status_icon(self.status),
            self.name,
            host,
            status_label(self.status),
            duration
        )?;
        if let Some(detail) = &self.error_detail {
            write!(out, " {}", detail.red())?;
        }
        writeln!(out)
    }
}

fn stats_line(attributes: &Attributes) -> Option<String> {
    let keys = [
        ("ok", AttributeKey::StatsOk),
        ("failed", AttributeKey::StatsFailures),
        ("skipped", AttributeKey::StatsSkipped),
        ("unreachable", AttributeKey::StatsUnreachable),
    ];
    let parts: Vec<String> = keys
        .iter()
        .filter_map(|(label, key)| {
            attributes
                .get(key)
                .and_then(|v| v.as_int())
                .map(|n| format!("{}={}", label, n))
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

fn status_icon(status: SpanStatus) -> ColoredString {
    match status {
        SpanStatus::Ok => "+".green(),
        SpanStatus::Error => "x".red(),
        SpanStatus::Unset => "-".white(),
    }
}

fn status_label(status: SpanStatus) -> ColoredString {
    match status {
        SpanStatus::Ok => "OK".green().bold(),
        SpanStatus::Error => "ERROR".red().bold(),
        SpanStatus::Unset => "UNSET".dimmed(),
    }
}

/// Format a duration in human-readable format
pub fn format_duration(ms: u64) -> String {
    if ms >= 60000 {
        let minutes = ms / 60000;
        let seconds = (ms % 60000) / 1000;
        format!("{}m {}s", minutes, seconds)
    } else if ms >= 1000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}
