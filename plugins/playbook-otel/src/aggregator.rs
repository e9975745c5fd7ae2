//! Run aggregator: per-run outcome counters.
//!
//! Counters are built from completion events and reconciled against the
//! totals the engine reports at run end. Reported totals are authoritative.

use crate::contracts::{Outcome, RunCounts};
use crate::error::CorrelatorError;

/// Monotonic outcome counters for one run
#[derive(Debug, Clone, Default)]
pub struct RunAggregator {
    counts: RunCounts,
}

impl RunAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one per-target completion
    pub fn record(&mut self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Ok => &mut self.counts.ok,
            Outcome::Failed => &mut self.counts.failed,
            Outcome::Skipped => &mut self.counts.skipped,
            Outcome::Unreachable => &mut self.counts.unreachable,
        };
        *counter = counter.saturating_add(1);
    }

    pub fn counts(&self) -> RunCounts {
        self.counts
    }

    /// Compare aggregated counters with the reported totals.
    ///
    /// Returns the reported totals when they agree, or a mismatch error
    /// carrying both sets. Callers use `reported` either way.
    pub fn reconcile(&self, reported: &RunCounts) -> Result<RunCounts, CorrelatorError> {
        if self.counts == *reported {
            Ok(*reported)
        } else {
            Err(CorrelatorError::CounterReconciliationMismatch {
                computed: self.counts,
                reported: *reported,
            })
        }
    }
}
