//! Span context used to correlate log records with spans.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifiers linking a record to a span in a run's trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanContext {
    /// Trace shared by every span of one run.
    pub trace_id: Uuid,
    /// The span this context points at.
    pub span_id: Uuid,
}
