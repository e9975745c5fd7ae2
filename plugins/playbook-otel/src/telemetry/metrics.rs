//! Prometheus metrics for the correlator
//!
//! Provides metrics about the correlator itself (not about the observed run):
//! - `events_total` (counter) - Lifecycle events handled, by event type
//! - `spans_opened_total` (counter) - Spans opened
//! - `spans_closed_total` (counter) - Spans closed, by status
//! - `spans_forced_closed_total` (counter) - Spans force-closed at run end or abort
//! - `log_records_total` (counter) - Correlated log records emitted
//! - `anomalies_total` (counter) - Non-fatal anomalies, by kind
//! - `open_spans` (gauge) - Unit spans currently open
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use playbook_otel::telemetry::CorrelatorMetrics;
//!
//! let registry = Arc::new(prometheus::Registry::new());
//! let metrics = CorrelatorMetrics::new(registry.clone()).unwrap();
//! metrics.record_event("run_start");
//! println!("{}", metrics.render().unwrap());
//! ```

use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use super::{Result, TelemetryError};
use playbook_span::SpanStatus;

const NAMESPACE: &str = "playbook_otel";

/// Correlator metrics for Prometheus
#[derive(Clone)]
pub struct CorrelatorMetrics {
    events_total: CounterVec,
    spans_opened_total: Counter,
    spans_closed_total: CounterVec,
    spans_forced_closed_total: Counter,
    log_records_total: Counter,
    anomalies_total: CounterVec,
    open_spans: Gauge,
    registry: Arc<Registry>,
}

impl CorrelatorMetrics {
    /// Create the metrics and register them with the provided registry
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        let events_total = CounterVec::new(
            Opts::new("events_total", "Total number of lifecycle events handled")
                .namespace(NAMESPACE),
            &["event"],
        )?;

        let spans_opened_total = Counter::with_opts(
            Opts::new("spans_opened_total", "Total number of spans opened").namespace(NAMESPACE),
        )?;

        let spans_closed_total = CounterVec::new(
            Opts::new("spans_closed_total", "Total number of spans closed by status")
                .namespace(NAMESPACE),
            &["status"],
        )?;

        let spans_forced_closed_total = Counter::with_opts(
            Opts::new(
                "spans_forced_closed_total",
                "Total number of spans closed without a completion event",
            )
            .namespace(NAMESPACE),
        )?;

        let log_records_total = Counter::with_opts(
            Opts::new(
                "log_records_total",
                "Total number of correlated log records emitted",
            )
            .namespace(NAMESPACE),
        )?;

        let anomalies_total = CounterVec::new(
            Opts::new(
                "anomalies_total",
                "Total number of non-fatal correlation anomalies by kind",
            )
            .namespace(NAMESPACE),
            &["kind"],
        )?;

        let open_spans = Gauge::with_opts(
            Opts::new("open_spans", "Number of unit spans currently open").namespace(NAMESPACE),
        )?;

        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(spans_opened_total.clone()))?;
        registry.register(Box::new(spans_closed_total.clone()))?;
        registry.register(Box::new(spans_forced_closed_total.clone()))?;
        registry.register(Box::new(log_records_total.clone()))?;
        registry.register(Box::new(anomalies_total.clone()))?;
        registry.register(Box::new(open_spans.clone()))?;

        Ok(Self {
            events_total,
            spans_opened_total,
            spans_closed_total,
            spans_forced_closed_total,
            log_records_total,
            anomalies_total,
            open_spans,
            registry,
        })
    }

    pub fn record_event(&self, event: &str) {
        self.events_total.with_label_values(&[event]).inc();
    }

    pub fn span_opened(&self) {
        self.spans_opened_total.inc();
    }

    pub fn span_closed(&self, status: SpanStatus) {
        let status = status.to_string();
        self.spans_closed_total
            .with_label_values(&[status.as_str()])
            .inc();
    }

    pub fn span_forced_closed(&self) {
        self.spans_forced_closed_total.inc();
    }

    pub fn log_emitted(&self) {
        self.log_records_total.inc();
    }

    pub fn record_anomaly(&self, kind: &str) {
        self.anomalies_total.with_label_values(&[kind]).inc();
    }

    pub fn set_open_spans(&self, open: usize) {
        self.open_spans.set(open as f64);
    }

    /// Current value of `events_total` for one event type
    pub fn events(&self, event: &str) -> f64 {
        self.events_total.with_label_values(&[event]).get()
    }

    /// Current value of `anomalies_total` for one kind
    pub fn anomalies(&self, kind: &str) -> f64 {
        self.anomalies_total.with_label_values(&[kind]).get()
    }

    pub fn forced_closes(&self) -> f64 {
        self.spans_forced_closed_total.get()
    }

    pub fn open_spans(&self) -> f64 {
        self.open_spans.get()
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Config(e.to_string()))
    }
}
