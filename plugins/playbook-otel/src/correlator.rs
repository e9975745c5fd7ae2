//! Event correlator: turns lifecycle events into spans and correlated log records.
//!
//! Per unit identity the state machine is `absent -> open -> closed`:
//!
//! - `UnitStart` opens a span under the identity.
//! - The first `UnitComplete` (any target) closes that span with the
//!   target's outcome.
//! - A `UnitComplete` for another target of the same identity gets its own
//!   sibling span, backdated to the unit's start and closed immediately.
//! - A repeated `UnitComplete` for an already completed (identity, target)
//!   only emits its log record.
//! - `RunEnd` force-closes whatever is still open, then closes the root.
//!
//! The correlator is a passive observer: `handle` never fails. Anomalies are
//! recorded in `diagnostics`, logged, and processing continues with whatever
//! state is available.

use std::sync::Arc;

use playbook_span::{
    AttributeKey, Attributes, Completion, LogRecord, MessageKey, Span, SpanContext,
};
use prometheus::Registry;
use tracing::{debug, warn};

use crate::contracts::{LifecycleEvent, Outcome, RunCounts, UnitId};
use crate::error::CorrelatorError;
use crate::registry::{OpenOutcome, SpanRegistry};
use crate::run::{label_or_unknown, Run, UnitOfWork, UNKNOWN};
use crate::telemetry::{CorrelatorMetrics, Exporter, TelemetryConfig, TelemetryError};

/// Error detail for unit spans still open when the run ends.
pub const INCOMPLETE_DETAIL: &str = "unit did not complete before run end";
/// Error detail for a failed unit whose completion carried no payload.
pub const FAILED_DETAIL: &str = "task failed";
/// Error detail for a run replaced by a newer run start.
pub const SUPERSEDED_RUN_DETAIL: &str = "superseded by new run start";
/// Error detail used when the correlator shuts down mid-run.
pub const SHUTDOWN_DETAIL: &str = "shutdown before run end";

/// Correlates lifecycle events of one run at a time.
pub struct EventCorrelator<E: Exporter> {
    config: TelemetryConfig,
    exporter: E,
    registry: SpanRegistry,
    run: Option<Run>,
    metrics: Option<CorrelatorMetrics>,
    diagnostics: Vec<CorrelatorError>,
}

impl<E: Exporter> EventCorrelator<E> {
    /// Create a correlator without metrics.
    pub fn new(config: TelemetryConfig, exporter: E) -> Self {
        Self {
            config,
            exporter,
            registry: SpanRegistry::new(),
            run: None,
            metrics: None,
            diagnostics: Vec::new(),
        }
    }

    /// Create a correlator, registering metrics when the config enables them.
    pub fn from_config(
        config: TelemetryConfig,
        exporter: E,
        registry: Arc<Registry>,
    ) -> Result<Self, TelemetryError> {
        let metrics = if config.enable_metrics {
            Some(CorrelatorMetrics::new(registry)?)
        } else {
            None
        };
        let mut correlator = Self::new(config, exporter);
        correlator.metrics = metrics;
        Ok(correlator)
    }

    /// Process one lifecycle event.
    pub fn handle(&mut self, event: LifecycleEvent) {
        let event_kind = event.kind();
        debug!(event = event_kind, "Handling lifecycle event");
        if let Some(metrics) = &self.metrics {
            metrics.record_event(event_kind);
        }

        match event {
            LifecycleEvent::RunStart { source_name } => self.on_run_start(&source_name),
            LifecycleEvent::UnitStart {
                identity,
                name,
                kind,
            } => self.on_unit_start(identity, &name, &kind),
            LifecycleEvent::UnitComplete {
                identity,
                target,
                outcome,
                error_detail,
            } => self.on_unit_complete(identity, &target, outcome, error_detail),
            LifecycleEvent::RunEnd { counts } => self.on_run_end(counts),
        }

        if let Some(metrics) = &self.metrics {
            metrics.set_open_spans(self.registry.len());
        }
    }

    /// Process events in order.
    pub fn handle_all(&mut self, events: impl IntoIterator<Item = LifecycleEvent>) {
        for event in events {
            self.handle(event);
        }
    }

    /// Cancel the active run: force-close open unit spans and close the root
    /// with an error carrying `reason`. No-op without an active run.
    pub fn abort(&mut self, reason: &str) {
        if let Some(run) = self.run.take() {
            warn!(run = %run.source_name, reason = reason, "Aborting run");
            let counts = run.aggregator.counts();
            self.finish_run(run, Completion::error(reason), Completion::error(reason), counts);
        }
    }

    /// Abort any active run, then shut the exporter down.
    pub fn shutdown(&mut self) -> Result<(), TelemetryError> {
        self.abort(SHUTDOWN_DETAIL);
        self.exporter.shutdown()?;
        Ok(())
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn run(&self) -> Option<&Run> {
        self.run.as_ref()
    }

    /// Number of unit spans currently open.
    pub fn open_spans(&self) -> usize {
        self.registry.len()
    }

    pub fn diagnostics(&self) -> &[CorrelatorError] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<CorrelatorError> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn metrics(&self) -> Option<&CorrelatorMetrics> {
        self.metrics.as_ref()
    }

    pub fn exporter(&self) -> &E {
        &self.exporter
    }

    pub fn exporter_mut(&mut self) -> &mut E {
        &mut self.exporter
    }

    pub fn into_exporter(self) -> E {
        self.exporter
    }

    fn on_run_start(&mut self, source_name: &str) {
        let source_name = label_or_unknown(source_name);
        if let Some(previous) = self.run.take() {
            self.record(CorrelatorError::RunAlreadyActive {
                active: previous.source_name.clone(),
                source_name: source_name.clone(),
            });
            let counts = previous.aggregator.counts();
            self.finish_run(
                previous,
                Completion::error(INCOMPLETE_DETAIL),
                Completion::error(SUPERSEDED_RUN_DETAIL),
                counts,
            );
        }
        self.start_run(&source_name);
    }

    fn start_run(&mut self, source_name: &str) {
        let run = Run::start(source_name);
        let record = LogRecord::info(MessageKey::PlaybookStart, Some(run.root_context()))
            .with_attribute(AttributeKey::PlaybookFile, run.source_name.as_str());
        debug!(run = %run.source_name, "Opened root span");

        self.run = Some(run);
        if let Some(metrics) = &self.metrics {
            metrics.span_opened();
        }
        self.emit_log(record);
    }

    /// Open an implicit run when a run-scoped event arrives without one.
    fn ensure_run(&mut self, event: &'static str) {
        if self.run.is_none() {
            self.record(CorrelatorError::NoActiveRun { event });
            self.start_run(UNKNOWN);
        }
    }

    fn on_unit_start(&mut self, identity: UnitId, name: &str, kind: &str) {
        self.ensure_run("unit_start");
        let Some(run) = self.run.as_mut() else {
            return;
        };

        let unit = UnitOfWork::new(identity.clone(), name, kind);
        let attrs = unit.attributes();
        let span = Span::new_unit(run.root_context(), &unit.name)
            .with_start(unit.started_at)
            .with_attributes(attrs.clone());
        run.units.insert(identity.clone(), unit);

        let outcome = self.registry.open(identity.clone(), span);
        let context = outcome.handle().context;
        if let Some(metrics) = &self.metrics {
            metrics.span_opened();
        }
        if let OpenOutcome::Replaced { stale, .. } = outcome {
            self.record(CorrelatorError::DuplicateIdentity { identity });
            self.export_span(stale);
        }

        self.emit_log(LogRecord::info(MessageKey::TaskStart, Some(context)).with_attributes(attrs));
    }

    fn on_unit_complete(
        &mut self,
        identity: UnitId,
        target: &str,
        outcome: Outcome,
        error_detail: Option<String>,
    ) {
        self.ensure_run("unit_complete");
        let Some(run) = self.run.as_mut() else {
            return;
        };

        let target = label_or_unknown(target);
        let mut anomalies = Vec::new();
        let root = run.root_context();
        let unit = run.units.entry(identity.clone()).or_insert_with(|| {
            anomalies.push(CorrelatorError::UnknownIdentityOnComplete {
                identity: identity.clone(),
                target: target.clone(),
            });
            UnitOfWork::new(identity.clone(), UNKNOWN, UNKNOWN)
        });

        let mut log_attrs = Attributes::new();
        log_attrs.insert(AttributeKey::TaskName, unit.name.as_str().into());
        log_attrs.insert(AttributeKey::HostName, target.as_str().into());
        log_attrs.insert(AttributeKey::TaskStatus, outcome.as_str().into());

        if let Some(previous) = unit.completion_for(&target) {
            debug!(identity = %identity, target = %target, "Repeated completion; span already closed");
            self.emit_log(LogRecord::info(MessageKey::TaskEnd, Some(previous)).with_attributes(log_attrs));
            return;
        }

        run.aggregator.record(outcome);
        if outcome != Outcome::Failed && error_detail.is_some() {
            debug!(identity = %identity, outcome = %outcome, "Ignoring error detail on non-failed outcome");
        }
        let completion = completion_for(outcome, error_detail);
        let mut span_attrs = Attributes::new();
        span_attrs.insert(AttributeKey::TaskStatus, outcome.as_str().into());
        span_attrs.insert(AttributeKey::HostName, target.as_str().into());

        let (span, synthesized) =
            match self.registry.close(&identity, completion.clone(), span_attrs.clone()) {
                Some(span) => (span, false),
                None => {
                    let mut span = Span::new_unit(root, &unit.name)
                        .with_start(unit.started_at)
                        .with_attributes(unit.attributes());
                    if let Err(e) = span.extend_attributes(span_attrs) {
                        anomalies.push(e.into());
                    }
                    if let Err(e) = span.close(completion) {
                        anomalies.push(e.into());
                    }
                    (span, true)
                }
            };
        let context = span.context();
        unit.mark_completed(target, context);

        for anomaly in anomalies {
            self.record(anomaly);
        }
        if synthesized {
            if let Some(metrics) = &self.metrics {
                metrics.span_opened();
            }
        }
        self.export_span(span);
        self.emit_log(LogRecord::info(MessageKey::TaskEnd, Some(context)).with_attributes(log_attrs));
    }

    fn on_run_end(&mut self, reported: RunCounts) {
        let Some(run) = self.run.take() else {
            self.record(CorrelatorError::NoActiveRun { event: "run_end" });
            let (attrs, errors) = stats_attributes(&reported);
            for error in errors {
                self.record(error);
            }
            self.emit_log(LogRecord::info(MessageKey::PlaybookEnd, None).with_attributes(attrs));
            return;
        };

        let counts = match run.aggregator.reconcile(&reported) {
            Ok(counts) => counts,
            Err(mismatch) => {
                self.record(mismatch);
                reported
            }
        };
        self.finish_run(run, Completion::error(INCOMPLETE_DETAIL), Completion::ok(), counts);
    }

    /// Close everything belonging to `run` and emit its end record.
    ///
    /// The root span is closed on every path, even when its counter
    /// attributes cannot be computed.
    fn finish_run(
        &mut self,
        run: Run,
        unit_completion: Completion,
        root_completion: Completion,
        counts: RunCounts,
    ) {
        for span in self.registry.close_all(unit_completion) {
            warn!(span = %span.name, run = %run.source_name, "Force-closed unit span");
            if let Some(metrics) = &self.metrics {
                metrics.span_forced_closed();
            }
            self.export_span(span);
        }

        let mut root = run.root;
        let (attrs, errors) = stats_attributes(&counts);
        for error in errors {
            self.record(error);
        }
        if let Err(e) = root.extend_attributes(attrs.clone()) {
            self.record(e.into());
        }
        if let Err(e) = root.close(root_completion) {
            self.record(e.into());
        }

        let context: SpanContext = root.context();
        debug!(run = %run.source_name, counts = %counts, "Closed root span");
        self.export_span(root);
        self.emit_log(LogRecord::info(MessageKey::PlaybookEnd, Some(context)).with_attributes(attrs));

        if let Err(e) = self.exporter.force_flush() {
            self.record(e.into());
        }
    }

    fn record(&mut self, error: CorrelatorError) {
        warn!(kind = error.kind(), error = %error, "Correlation anomaly");
        if let Some(metrics) = &self.metrics {
            metrics.record_anomaly(error.kind());
        }
        self.diagnostics.push(error);
    }

    fn export_span(&mut self, span: Span) {
        if let Some(metrics) = &self.metrics {
            metrics.span_closed(span.status());
        }
        if let Err(e) = self.exporter.export_span(span) {
            self.record(e.into());
        }
    }

    fn emit_log(&mut self, record: LogRecord) {
        if let Some(metrics) = &self.metrics {
            metrics.log_emitted();
        }
        if let Err(e) = self.exporter.export_log(record) {
            self.record(e.into());
        }
    }
}

/// Terminal state of a unit span for a per-target outcome.
fn completion_for(outcome: Outcome, error_detail: Option<String>) -> Completion {
    match outcome {
        Outcome::Ok => Completion::ok(),
        Outcome::Failed => Completion::error(error_detail.unwrap_or_else(|| FAILED_DETAIL.to_string())),
        Outcome::Skipped | Outcome::Unreachable => Completion::unset(),
    }
}

/// `stats.*` attributes for `counts`.
///
/// Counters that do not fit an attribute integer are left out and reported.
fn stats_attributes(counts: &RunCounts) -> (Attributes, Vec<CorrelatorError>) {
    let mut attrs = Attributes::new();
    let mut errors = Vec::new();
    let fields = [
        (AttributeKey::StatsOk, counts.ok),
        (AttributeKey::StatsFailures, counts.failed),
        (AttributeKey::StatsSkipped, counts.skipped),
        (AttributeKey::StatsUnreachable, counts.unreachable),
    ];
    for (key, value) in fields {
        match i64::try_from(value) {
            Ok(value) => {
                attrs.insert(key, value.into());
            }
            Err(e) => errors.push(CorrelatorError::AttributeComputation(format!(
                "{}: {}",
                key, e
            ))),
        }
    }
    (attrs, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::InMemoryExporter;
    use playbook_span::SpanStatus;

    fn correlator() -> EventCorrelator<InMemoryExporter> {
        EventCorrelator::new(TelemetryConfig::default(), InMemoryExporter::new())
    }

    #[test]
    fn test_completion_for_outcomes() {
        assert_eq!(completion_for(Outcome::Ok, None).status, SpanStatus::Ok);
        assert_eq!(completion_for(Outcome::Skipped, None).status, SpanStatus::Unset);
        assert_eq!(
            completion_for(Outcome::Unreachable, Some("x".into())).status,
            SpanStatus::Unset
        );

        let failed = completion_for(Outcome::Failed, None);
        assert_eq!(failed.status, SpanStatus::Error);
        assert_eq!(failed.error_detail.as_deref(), Some(FAILED_DETAIL));
    }

    #[test]
    fn test_stats_attributes_partial_on_overflow() {
        let (attrs, errors) = stats_attributes(&RunCounts::new(u64::MAX, 2, 0, 0));
        assert!(attrs.get(&AttributeKey::StatsOk).is_none());
        assert_eq!(attrs.get(&AttributeKey::StatsFailures).and_then(|v| v.as_int()), Some(2));
        assert_eq!(attrs.len(), 3);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_unit_start_without_run_opens_implicit_run() {
        let mut c = correlator();
        c.handle(LifecycleEvent::unit_start("t", "install pkg", "package"));

        assert_eq!(c.run().map(|r| r.source_name.as_str()), Some(UNKNOWN));
        assert_eq!(c.open_spans(), 1);
        assert!(matches!(
            c.diagnostics(),
            [CorrelatorError::NoActiveRun { event: "unit_start" }]
        ));
    }

    #[test]
    fn test_duplicate_start_exports_stale_span() {
        let mut c = correlator();
        c.handle(LifecycleEvent::run_start("site.yml"));
        c.handle(LifecycleEvent::unit_start("t", "first", "command"));
        c.handle(LifecycleEvent::unit_start("t", "second", "command"));

        assert_eq!(c.open_spans(), 1);
        assert_eq!(c.exporter().spans().len(), 1);
        assert_eq!(c.exporter().spans()[0].name, "first");
        assert_eq!(c.exporter().spans()[0].status(), SpanStatus::Error);
        assert!(matches!(
            c.diagnostics(),
            [CorrelatorError::DuplicateIdentity { .. }]
        ));
    }

    #[test]
    fn test_restart_after_close_is_not_duplicate() {
        let mut c = correlator();
        c.handle(LifecycleEvent::run_start("site.yml"));
        c.handle(LifecycleEvent::unit_start("t", "loop", "command"));
        c.handle(LifecycleEvent::unit_complete("t", "host1", Outcome::Ok));
        c.handle(LifecycleEvent::unit_start("t", "loop", "command"));
        c.handle(LifecycleEvent::unit_complete("t", "host1", Outcome::Ok));

        assert!(c.diagnostics().is_empty());
        assert_eq!(c.exporter().spans().len(), 2);
        assert_eq!(c.run().map(|r| r.counts().ok), Some(2));
    }

    #[test]
    fn test_abort_closes_everything() {
        let mut c = correlator();
        c.handle(LifecycleEvent::run_start("site.yml"));
        c.handle(LifecycleEvent::unit_start("a", "one", "command"));
        c.handle(LifecycleEvent::unit_start("b", "two", "command"));
        c.abort("interrupted");

        assert!(c.run().is_none());
        assert_eq!(c.open_spans(), 0);
        let spans = c.exporter().spans();
        assert_eq!(spans.len(), 3);
        assert!(spans.iter().all(|s| s.is_closed()));
        assert!(spans.iter().all(|s| s.error_detail() == Some("interrupted")));
        assert_eq!(c.exporter().flushes(), 1);

        c.abort("again");
        assert_eq!(c.exporter().spans().len(), 3);
    }

    #[test]
    fn test_shutdown_mid_run() {
        let mut c = correlator();
        c.handle(LifecycleEvent::run_start("site.yml"));
        c.shutdown().unwrap();

        assert!(c.exporter().is_shut_down());
        let root = &c.exporter().spans()[0];
        assert_eq!(root.status(), SpanStatus::Error);
        assert_eq!(root.error_detail(), Some(SHUTDOWN_DETAIL));
    }

    #[test]
    fn test_export_failure_is_recorded_not_raised() {
        let mut c = correlator();
        c.exporter_mut().shutdown().unwrap();
        c.handle(LifecycleEvent::run_start("site.yml"));
        c.handle(LifecycleEvent::run_end(RunCounts::default()));

        assert!(c
            .diagnostics()
            .iter()
            .all(|d| matches!(d, CorrelatorError::Export(_))));
        assert!(!c.diagnostics().is_empty());
        assert!(c.run().is_none());
    }
}
