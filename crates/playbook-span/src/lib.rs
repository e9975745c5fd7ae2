//! Span and log record types for playbook run instrumentation.
//!
//! This crate provides the shared record shapes produced by the correlator
//! and consumed by exporters.
//!
//! # Span Hierarchy
//!
//! ```text
//! Run (one per playbook execution)
//!   └─ Unit (one per task and target)
//! ```
//!
//! # Usage
//!
//! 1. Create a root span with `Span::new_run` and unit spans with `Span::new_unit`.
//! 2. Attach attributes with typed `AttributeKey`s before closing.
//! 3. Close each span exactly once with a `Completion`.
//! 4. Emit `LogRecord`s correlated to a span through its `SpanContext`.
//! 5. Use `SpanTree::assemble` to rebuild the hierarchy from exported spans.

pub mod attributes;
pub mod context;
pub mod record;
pub mod span;
pub mod tree;

pub use attributes::{AttributeKey, AttributeValue, Attributes};
pub use context::SpanContext;
pub use record::{LogLevel, LogRecord, MessageKey};
pub use span::{Completion, Span, SpanError, SpanKind, SpanStatus};
pub use tree::SpanTree;
