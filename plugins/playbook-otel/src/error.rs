//! Error types for the playbook correlator
//!
//! None of these errors is fatal to the observed run. The correlator records
//! them as diagnostics, logs them and keeps processing events.

use playbook_span::SpanError;
use thiserror::Error;

use crate::contracts::{RunCounts, UnitId};
use crate::telemetry::ExportError;

/// Anomalies detected while correlating lifecycle events
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelatorError {
    /// A unit start arrived for an identity that already has an open span
    #[error("duplicate start for unit {identity}; stale span replaced")]
    DuplicateIdentity { identity: UnitId },

    /// A completion arrived for an identity that was never started
    #[error("completion for unknown unit {identity} on target {target}")]
    UnknownIdentityOnComplete { identity: UnitId, target: String },

    /// Counters aggregated from completions disagree with the reported totals
    #[error("aggregated counters ({computed}) differ from reported totals ({reported})")]
    CounterReconciliationMismatch {
        computed: RunCounts,
        reported: RunCounts,
    },

    /// An attribute could not be computed or applied
    #[error("attribute computation failed: {0}")]
    AttributeComputation(String),

    /// A run-scoped event arrived with no active run
    #[error("{event} received with no active run")]
    NoActiveRun { event: &'static str },

    /// A run start arrived while another run was still open
    #[error("run start for '{source_name}' while run '{active}' is still open")]
    RunAlreadyActive { active: String, source_name: String },

    /// The exporter rejected a record
    #[error("export failed: {0}")]
    Export(String),
}

impl CorrelatorError {
    /// Stable label used in metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            CorrelatorError::DuplicateIdentity { .. } => "duplicate_identity",
            CorrelatorError::UnknownIdentityOnComplete { .. } => "unknown_identity",
            CorrelatorError::CounterReconciliationMismatch { .. } => "counter_mismatch",
            CorrelatorError::AttributeComputation(_) => "attribute_computation",
            CorrelatorError::NoActiveRun { .. } => "no_active_run",
            CorrelatorError::RunAlreadyActive { .. } => "run_already_active",
            CorrelatorError::Export(_) => "export",
        }
    }
}

impl From<SpanError> for CorrelatorError {
    fn from(err: SpanError) -> Self {
        CorrelatorError::AttributeComputation(err.to_string())
    }
}

impl From<ExportError> for CorrelatorError {
    fn from(err: ExportError) -> Self {
        CorrelatorError::Export(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display() {
        let err = CorrelatorError::UnknownIdentityOnComplete {
            identity: UnitId::new("t-9"),
            target: "host1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "completion for unknown unit t-9 on target host1"
        );
    }

    #[test]
    fn test_span_error_becomes_attribute_error() {
        let err: CorrelatorError = SpanError::AlreadyClosed {
            span_id: Uuid::nil(),
            name: "x".to_string(),
        }
        .into();
        assert_eq!(err.kind(), "attribute_computation");
    }
}
