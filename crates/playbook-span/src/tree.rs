//! Reassembly of exported spans into run/unit hierarchies.
//!
//! Spans leave the correlator one at a time, children before their root.
//! `SpanTree::assemble` groups them back under their parents for display
//! and inspection.

use std::collections::HashMap;
use uuid::Uuid;

use crate::span::{Span, SpanStatus};

/// A root span with its direct children.
#[derive(Debug, Clone)]
pub struct SpanTree {
    pub root: Span,
    pub children: Vec<Span>,
}

impl SpanTree {
    /// Group spans into trees.
    ///
    /// Every span whose parent is absent from the input (roots, and
    /// children of a root that was never exported) becomes the root of its
    /// own tree. Trees and children are ordered by start time.
    pub fn assemble(spans: impl IntoIterator<Item = Span>) -> Vec<SpanTree> {
        let spans: Vec<Span> = spans.into_iter().collect();
        let ids: std::collections::HashSet<Uuid> = spans.iter().map(|s| s.span_id).collect();

        let mut roots = Vec::new();
        let mut children: HashMap<Uuid, Vec<Span>> = HashMap::new();
        for span in spans {
            match span.parent_span_id {
                Some(parent) if ids.contains(&parent) => {
                    children.entry(parent).or_default().push(span)
                }
                _ => roots.push(span),
            }
        }

        roots.sort_by_key(|s| s.started_at);
        roots
            .into_iter()
            .map(|root| {
                let mut kids = children.remove(&root.span_id).unwrap_or_default();
                kids.sort_by_key(|s| s.started_at);
                SpanTree { root, children: kids }
            })
            .collect()
    }

    /// Number of children that closed with an error status.
    pub fn failed_children(&self) -> usize {
        self.children
            .iter()
            .filter(|s| s.status() == SpanStatus::Error)
            .count()
    }

    /// Whether the root and every child have been closed.
    pub fn is_complete(&self) -> bool {
        self.root.is_closed() && self.children.iter().all(Span::is_closed)
    }

    /// Children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Span> + 'a {
        self.children.iter().filter(move |s| s.name == name)
    }
}
