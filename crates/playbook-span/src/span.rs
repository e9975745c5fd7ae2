//! Core span types for playbook run instrumentation.
//!
//! Defines `Span`, `SpanKind`, `SpanStatus` and `Completion` used to build
//! the run/unit span hierarchy. A span's terminal state is written exactly
//! once: after `close`, its end time, status and attributes are frozen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::attributes::{AttributeKey, AttributeValue, Attributes};
use crate::context::SpanContext;

/// Errors raised when mutating a span.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpanError {
    #[error("span '{name}' ({span_id}) is already closed")]
    AlreadyClosed { span_id: Uuid, name: String },
}

/// Status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error,
}

impl std::fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpanStatus::Unset => write!(f, "unset"),
            SpanStatus::Ok => write!(f, "ok"),
            SpanStatus::Error => write!(f, "error"),
        }
    }
}

/// Type of span in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Run,
    Unit,
}

/// Terminal state applied when a span is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub status: SpanStatus,
    pub error_detail: Option<String>,
}

impl Completion {
    pub fn ok() -> Self {
        Self {
            status: SpanStatus::Ok,
            error_detail: None,
        }
    }

    pub fn unset() -> Self {
        Self {
            status: SpanStatus::Unset,
            error_detail: None,
        }
    }

    /// Error completion carrying a detail message.
    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: SpanStatus::Error,
            error_detail: Some(detail.into()),
        }
    }
}

/// A single span of a run's trace.
///
/// Spans form a two-level tree: one `Run` root with `Unit` children.
/// Fields that change over the span's life are private so the close-once
/// rule cannot be bypassed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub span_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<Uuid>,
    pub trace_id: Uuid,
    pub kind: SpanKind,
    pub name: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    attributes: Attributes,
    status: SpanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_detail: Option<String>,
}

impl Span {
    /// Create a root span for a run. Starts a new trace.
    pub fn new_run(name: &str) -> Self {
        Self::new(Uuid::new_v4(), None, SpanKind::Run, name)
    }

    /// Create a unit span parented to `parent`.
    pub fn new_unit(parent: SpanContext, name: &str) -> Self {
        Self::new(parent.trace_id, Some(parent.span_id), SpanKind::Unit, name)
    }

    fn new(trace_id: Uuid, parent_span_id: Option<Uuid>, kind: SpanKind, name: &str) -> Self {
        Self {
            span_id: Uuid::new_v4(),
            parent_span_id,
            trace_id,
            kind,
            name: name.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            attributes: Attributes::new(),
            status: SpanStatus::Unset,
            error_detail: None,
        }
    }

    /// Override the start time (used when a span is synthesized after the fact).
    pub fn with_start(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Builder-style attribute insertion for a freshly created span.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn context(&self) -> SpanContext {
        SpanContext {
            trace_id: self.trace_id,
            span_id: self.span_id,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    pub fn status(&self) -> SpanStatus {
        self.status
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: AttributeKey) -> Option<&AttributeValue> {
        self.attributes.get(&key)
    }

    /// Set an attribute. Fails once the span is closed.
    pub fn set_attribute(
        &mut self,
        key: AttributeKey,
        value: impl Into<AttributeValue>,
    ) -> Result<(), SpanError> {
        self.ensure_open()?;
        self.attributes.insert(key, value.into());
        Ok(())
    }

    /// Merge attributes into the span. Fails once the span is closed.
    pub fn extend_attributes(&mut self, attributes: Attributes) -> Result<(), SpanError> {
        self.ensure_open()?;
        self.attributes.extend(attributes);
        Ok(())
    }

    /// Close the span with the given terminal state.
    pub fn close(&mut self, completion: Completion) -> Result<(), SpanError> {
        self.ensure_open()?;
        let now = Utc::now();
        self.status = completion.status;
        self.error_detail = completion.error_detail;
        self.ended_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SpanError> {
        if self.is_closed() {
            return Err(SpanError::AlreadyClosed {
                span_id: self.span_id,
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_run_span() {
        let span = Span::new_run("site.yml");

        assert_eq!(span.kind, SpanKind::Run);
        assert_eq!(span.status(), SpanStatus::Unset);
        assert_eq!(span.name, "site.yml");
        assert!(span.parent_span_id.is_none());
        assert!(!span.is_closed());
    }

    #[test]
    fn test_new_unit_span_shares_trace() {
        let root = Span::new_run("site.yml");
        let unit = Span::new_unit(root.context(), "install pkg");

        assert_eq!(unit.kind, SpanKind::Unit);
        assert_eq!(unit.trace_id, root.trace_id);
        assert_eq!(unit.parent_span_id, Some(root.span_id));
        assert_ne!(unit.span_id, root.span_id);
    }

    #[test]
    fn test_close_ok() {
        let mut span = Span::new_run("site.yml");
        span.close(Completion::ok()).unwrap();

        assert_eq!(span.status(), SpanStatus::Ok);
        assert!(span.ended_at().is_some());
        assert!(span.duration_ms().is_some());
        assert!(span.error_detail().is_none());
    }

    #[test]
    fn test_close_error_records_detail() {
        let mut span = Span::new_run("site.yml");
        span.close(Completion::error("timeout")).unwrap();

        assert_eq!(span.status(), SpanStatus::Error);
        assert_eq!(span.error_detail(), Some("timeout"));
    }

    #[test]
    fn test_end_time_is_immutable() {
        let mut span = Span::new_run("site.yml");
        span.close(Completion::ok()).unwrap();
        let ended = span.ended_at();

        let err = span.close(Completion::error("late")).unwrap_err();
        assert!(matches!(err, SpanError::AlreadyClosed { .. }));
        assert_eq!(span.ended_at(), ended);
        assert_eq!(span.status(), SpanStatus::Ok);
        assert!(span.error_detail().is_none());
    }

    #[test]
    fn test_attributes_rejected_after_close() {
        let mut span = Span::new_run("site.yml");
        span.set_attribute(AttributeKey::PlaybookFile, "site.yml").unwrap();
        span.close(Completion::ok()).unwrap();

        assert!(span.set_attribute(AttributeKey::StatsOk, 1i64).is_err());
        assert!(span.extend_attributes(Attributes::new()).is_err());
        assert_eq!(span.attributes().len(), 1);
        assert!(span.attribute(AttributeKey::StatsOk).is_none());
    }

    #[test]
    fn test_with_start_backdates_span() {
        let earlier = Utc::now() - chrono::Duration::seconds(5);
        let mut span = Span::new_run("site.yml").with_start(earlier);
        span.close(Completion::unset()).unwrap();

        assert_eq!(span.started_at, earlier);
        assert!(span.duration_ms().unwrap() >= 5000);
    }

    #[test]
    fn test_json_serialization_roundtrip() {
        let root = Span::new_run("site.yml");
        let mut unit = Span::new_unit(root.context(), "install pkg");
        unit.set_attribute(AttributeKey::HostName, "host1").unwrap();
        unit.close(Completion::error("timeout")).unwrap();

        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "unit");
        assert_eq!(json["attributes"]["host.name"], "host1");

        let back: Span = serde_json::from_value(json).unwrap();
        assert_eq!(back, unit);
    }
}
