//! Span registry: the open unit spans of the active run, keyed by unit identity.
//!
//! The registry is the only shared mutable state of the correlator. It is
//! accessed from one thread at a time; `SharedCorrelator` adds the lock when
//! events fan in from several threads.

use std::collections::HashMap;

use playbook_span::{Attributes, Completion, Span, SpanContext};
use tracing::{debug, warn};

use crate::contracts::UnitId;

/// Error detail applied to a span displaced by a duplicate start.
pub const SUPERSEDED_DETAIL: &str = "superseded by duplicate unit start";

/// Lightweight reference to an open span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanHandle {
    pub context: SpanContext,
    pub name: String,
}

impl SpanHandle {
    fn of(span: &Span) -> Self {
        Self {
            context: span.context(),
            name: span.name.clone(),
        }
    }
}

/// Result of opening a span.
#[derive(Debug)]
pub enum OpenOutcome {
    /// The identity had no open span.
    Fresh(SpanHandle),
    /// The identity already had an open span; it was closed with an error
    /// completion and handed back so the caller can export it.
    Replaced { handle: SpanHandle, stale: Span },
}

impl OpenOutcome {
    pub fn handle(&self) -> &SpanHandle {
        match self {
            OpenOutcome::Fresh(handle) => handle,
            OpenOutcome::Replaced { handle, .. } => handle,
        }
    }
}

struct Entry {
    seq: u64,
    span: Span,
}

/// Open spans keyed by unit identity.
#[derive(Default)]
pub struct SpanRegistry {
    open: HashMap<UnitId, Entry>,
    next_seq: u64,
}

impl SpanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `span` as the open span for `identity`.
    pub fn open(&mut self, identity: UnitId, span: Span) -> OpenOutcome {
        let handle = SpanHandle::of(&span);
        let seq = self.next_seq;
        self.next_seq += 1;

        match self.open.insert(identity, Entry { seq, span }) {
            None => OpenOutcome::Fresh(handle),
            Some(previous) => {
                let mut stale = previous.span;
                finish(&mut stale, Completion::error(SUPERSEDED_DETAIL), Attributes::new());
                OpenOutcome::Replaced { handle, stale }
            }
        }
    }

    pub fn lookup(&self, identity: &UnitId) -> Option<SpanHandle> {
        self.open.get(identity).map(|entry| SpanHandle::of(&entry.span))
    }

    /// Close and remove the span for `identity`.
    ///
    /// Returns `None` when nothing is open under that identity; a repeated
    /// close is a no-op.
    pub fn close(
        &mut self,
        identity: &UnitId,
        completion: Completion,
        attributes: Attributes,
    ) -> Option<Span> {
        let mut span = self.open.remove(identity)?.span;
        finish(&mut span, completion, attributes);
        debug!(identity = %identity, span = %span.name, status = %span.status(), "Closed span");
        Some(span)
    }

    /// Force-close every open span, oldest first.
    pub fn close_all(&mut self, completion: Completion) -> Vec<Span> {
        let mut entries: Vec<Entry> = self.open.drain().map(|(_, entry)| entry).collect();
        entries.sort_by_key(|entry| entry.seq);

        entries
            .into_iter()
            .map(|entry| {
                let mut span = entry.span;
                finish(&mut span, completion.clone(), Attributes::new());
                span
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn contains(&self, identity: &UnitId) -> bool {
        self.open.contains_key(identity)
    }
}

/// Close a span on its way out of the registry.
///
/// Spans only leave the registry through here, so an entry that is already
/// closed means it was registered closed.
fn finish(span: &mut Span, completion: Completion, attributes: Attributes) {
    let result = span
        .extend_attributes(attributes)
        .and_then(|()| span.close(completion));
    if let Err(e) = &result {
        warn!(error = %e, "Registry entry was closed before leaving the registry");
    }
    debug_assert!(result.is_ok(), "registry entry already closed: {:?}", result);
}
