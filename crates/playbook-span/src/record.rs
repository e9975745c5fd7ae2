//! Structured log records correlated to spans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeKey, AttributeValue, Attributes};
use crate::context::SpanContext;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Fixed message keys for lifecycle log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKey {
    PlaybookStart,
    TaskStart,
    TaskEnd,
    PlaybookEnd,
}

impl MessageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKey::PlaybookStart => "playbook_start",
            MessageKey::TaskStart => "task_start",
            MessageKey::TaskEnd => "task_end",
            MessageKey::PlaybookEnd => "playbook_end",
        }
    }
}

impl std::fmt::Display for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured, leveled log record.
///
/// `span` is the context that was active when the record was produced;
/// it is `None` only when no run was active at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: MessageKey,
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<SpanContext>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: MessageKey, span: Option<SpanContext>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message,
            attributes: Attributes::new(),
            span,
        }
    }

    /// Info-level record correlated to `span`.
    pub fn info(message: MessageKey, span: Option<SpanContext>) -> Self {
        Self::new(LogLevel::Info, message, span)
    }

    pub fn with_attribute(mut self, key: AttributeKey, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key, value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn attribute(&self, key: AttributeKey) -> Option<&AttributeValue> {
        self.attributes.get(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_info_record() {
        let ctx = SpanContext {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
        };
        let record = LogRecord::info(MessageKey::TaskEnd, Some(ctx))
            .with_attribute(AttributeKey::HostName, "host1")
            .with_attribute(AttributeKey::TaskStatus, "ok");

        assert_eq!(record.level, LogLevel::Info);
        assert_eq!(record.span, Some(ctx));
        assert_eq!(
            record.attribute(AttributeKey::HostName).and_then(|v| v.as_str()),
            Some("host1")
        );
    }

    #[test]
    fn test_json_shape() {
        let record = LogRecord::info(MessageKey::PlaybookEnd, None)
            .with_attribute(AttributeKey::StatsFailures, 2i64);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["message"], "playbook_end");
        assert_eq!(json["level"], "info");
        assert_eq!(json["attributes"]["stats.failures"], 2);
        assert!(json.get("span").is_none());
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Warn > LogLevel::Info);
        assert!(LogLevel::Debug < LogLevel::Error);
    }
}
