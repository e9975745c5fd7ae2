//! Exporter boundary
//!
//! Finished spans and log records are handed to an `Exporter`. Transport
//! concerns (batching, retry, protocol encoding) belong to the exporter
//! implementation; the correlator only produces records and calls the trait.
//!
//! Two exporters ship with the crate:
//! - `InMemoryExporter` keeps everything in memory, for tests and for the
//!   CLI's tree rendering.
//! - `JsonLinesExporter` writes one JSON object per record to any writer.

use std::io::Write;

use playbook_span::{LogRecord, Span};
use serde::Serialize;
use thiserror::Error;

use super::{Resource, TelemetryConfig};

/// Errors raised by exporters
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Exporter is shut down")]
    ShutDown,
}

/// Sink for finished spans and correlated log records.
pub trait Exporter {
    fn export_span(&mut self, span: Span) -> Result<(), ExportError>;

    fn export_log(&mut self, record: LogRecord) -> Result<(), ExportError>;

    /// Push out anything buffered.
    fn force_flush(&mut self) -> Result<(), ExportError> {
        Ok(())
    }

    /// Flush and release resources. Later exports fail with `ShutDown`.
    fn shutdown(&mut self) -> Result<(), ExportError> {
        self.force_flush()
    }
}

impl<E: Exporter + ?Sized> Exporter for Box<E> {
    fn export_span(&mut self, span: Span) -> Result<(), ExportError> {
        (**self).export_span(span)
    }

    fn export_log(&mut self, record: LogRecord) -> Result<(), ExportError> {
        (**self).export_log(record)
    }

    fn force_flush(&mut self) -> Result<(), ExportError> {
        (**self).force_flush()
    }

    fn shutdown(&mut self) -> Result<(), ExportError> {
        (**self).shutdown()
    }
}

/// Collects records in memory, in export order.
#[derive(Debug, Default)]
pub struct InMemoryExporter {
    spans: Vec<Span>,
    logs: Vec<LogRecord>,
    flushes: usize,
    shut_down: bool,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn logs(&self) -> &[LogRecord] {
        &self.logs
    }

    /// Number of times `force_flush` was called.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Take all collected spans and logs, leaving the exporter empty.
    pub fn drain(&mut self) -> (Vec<Span>, Vec<LogRecord>) {
        (
            std::mem::take(&mut self.spans),
            std::mem::take(&mut self.logs),
        )
    }
}

impl Exporter for InMemoryExporter {
    fn export_span(&mut self, span: Span) -> Result<(), ExportError> {
        if self.shut_down {
            return Err(ExportError::ShutDown);
        }
        self.spans.push(span);
        Ok(())
    }

    fn export_log(&mut self, record: LogRecord) -> Result<(), ExportError> {
        if self.shut_down {
            return Err(ExportError::ShutDown);
        }
        self.logs.push(record);
        Ok(())
    }

    fn force_flush(&mut self) -> Result<(), ExportError> {
        self.flushes += 1;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ExportError> {
        self.force_flush()?;
        self.shut_down = true;
        Ok(())
    }
}

/// One line of `JsonLinesExporter` output.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExportRecord<'a> {
    Span { resource: &'a Resource, span: &'a Span },
    Log { resource: &'a Resource, log: &'a LogRecord },
}

/// Writes each record as a single JSON line.
pub struct JsonLinesExporter<W: Write> {
    writer: W,
    resource: Resource,
    shut_down: bool,
}

impl<W: Write> JsonLinesExporter<W> {
    pub fn new(writer: W, config: &TelemetryConfig) -> Self {
        tracing::debug!(
            service = %config.service_name,
            traces_endpoint = %config.traces_endpoint,
            logs_endpoint = %config.logs_endpoint,
            "JSON lines exporter ignores OTLP endpoints"
        );
        Self {
            writer,
            resource: config.resource(),
            shut_down: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn ensure_running(&self) -> Result<(), ExportError> {
        if self.shut_down {
            return Err(ExportError::ShutDown);
        }
        Ok(())
    }
}

fn write_line<W: Write>(writer: &mut W, record: &ExportRecord<'_>) -> Result<(), ExportError> {
    serde_json::to_writer(&mut *writer, record)?;
    writer.write_all(b"\n")?;
    Ok(())
}

impl<W: Write> Exporter for JsonLinesExporter<W> {
    fn export_span(&mut self, span: Span) -> Result<(), ExportError> {
        self.ensure_running()?;
        let line = ExportRecord::Span {
            resource: &self.resource,
            span: &span,
        };
        write_line(&mut self.writer, &line)
    }

    fn export_log(&mut self, record: LogRecord) -> Result<(), ExportError> {
        self.ensure_running()?;
        let line = ExportRecord::Log {
            resource: &self.resource,
            log: &record,
        };
        write_line(&mut self.writer, &line)
    }

    fn force_flush(&mut self) -> Result<(), ExportError> {
        self.writer.flush()?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ExportError> {
        if self.shut_down {
            return Ok(());
        }
        self.force_flush()?;
        self.shut_down = true;
        Ok(())
    }
}
