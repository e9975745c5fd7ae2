//! Run and unit-of-work state tracked by the correlator.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use playbook_span::{AttributeKey, Attributes, Span, SpanContext};

use crate::aggregator::RunAggregator;
use crate::contracts::{RunCounts, UnitId};

/// Placeholder for names, kinds and targets the engine did not supply.
pub const UNKNOWN: &str = "unknown";

/// Trim a label, substituting `UNKNOWN` when nothing is left.
pub fn label_or_unknown(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}

/// One task definition of the active run.
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    pub identity: UnitId,
    pub name: String,
    pub kind: String,
    pub started_at: DateTime<Utc>,
    completed: BTreeMap<String, SpanContext>,
}

impl UnitOfWork {
    pub fn new(identity: UnitId, name: &str, kind: &str) -> Self {
        Self {
            identity,
            name: label_or_unknown(name),
            kind: label_or_unknown(kind),
            started_at: Utc::now(),
            completed: BTreeMap::new(),
        }
    }

    /// Attributes declared at unit start.
    pub fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert(AttributeKey::TaskName, self.name.as_str().into());
        attrs.insert(AttributeKey::TaskAction, self.kind.as_str().into());
        attrs
    }

    /// Span context recorded for `target`'s completion, if it already completed.
    pub fn completion_for(&self, target: &str) -> Option<SpanContext> {
        self.completed.get(target).copied()
    }

    pub(crate) fn mark_completed(&mut self, target: String, context: SpanContext) {
        self.completed.insert(target, context);
    }

    pub fn completed_targets(&self) -> impl Iterator<Item = &str> {
        self.completed.keys().map(String::as_str)
    }
}

/// The single active run.
#[derive(Debug)]
pub struct Run {
    pub source_name: String,
    pub started_at: DateTime<Utc>,
    pub(crate) root: Span,
    pub(crate) aggregator: RunAggregator,
    pub(crate) units: HashMap<UnitId, UnitOfWork>,
}

impl Run {
    /// Start a run and open its root span.
    pub fn start(source_name: &str) -> Self {
        let source_name = label_or_unknown(source_name);
        let mut attrs = Attributes::new();
        attrs.insert(AttributeKey::PlaybookFile, source_name.as_str().into());
        let root = Span::new_run(&source_name).with_attributes(attrs);

        Self {
            started_at: root.started_at,
            source_name,
            root,
            aggregator: RunAggregator::new(),
            units: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Span {
        &self.root
    }

    pub fn root_context(&self) -> SpanContext {
        self.root.context()
    }

    /// Counters aggregated from completions so far.
    pub fn counts(&self) -> RunCounts {
        self.aggregator.counts()
    }

    pub fn unit(&self, identity: &UnitId) -> Option<&UnitOfWork> {
        self.units.get(identity)
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_or_unknown() {
        assert_eq!(label_or_unknown("  install pkg \n"), "install pkg");
        assert_eq!(label_or_unknown(""), UNKNOWN);
        assert_eq!(label_or_unknown("   "), UNKNOWN);
    }

    #[test]
    fn test_run_start_opens_root() {
        let run = Run::start("site.yml");
        assert_eq!(run.source_name, "site.yml");
        assert_eq!(run.root().name, "site.yml");
        assert!(!run.root().is_closed());
        assert_eq!(
            run.root()
                .attribute(AttributeKey::PlaybookFile)
                .and_then(|v| v.as_str()),
            Some("site.yml")
        );
        assert_eq!(run.counts(), RunCounts::default());
    }

    #[test]
    fn test_run_without_source_is_unknown() {
        let run = Run::start("");
        assert_eq!(run.source_name, UNKNOWN);
    }

    #[test]
    fn test_unit_tracks_completed_targets() {
        let run = Run::start("site.yml");
        let mut unit = UnitOfWork::new(UnitId::new("t"), " install pkg ", "");
        assert_eq!(unit.name, "install pkg");
        assert_eq!(unit.kind, UNKNOWN);
        assert!(unit.completion_for("host1").is_none());

        unit.mark_completed("host1".to_string(), run.root_context());
        assert_eq!(unit.completion_for("host1"), Some(run.root_context()));
        assert_eq!(unit.completed_targets().collect::<Vec<_>>(), vec!["host1"]);
    }
}
