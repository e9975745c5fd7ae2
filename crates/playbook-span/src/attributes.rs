//! Typed attribute keys and values.
//!
//! The set of recognized keys is closed so the wire names stay stable and a
//! misspelled key fails to compile instead of silently producing a new field.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute map carried by spans and log records.
pub type Attributes = BTreeMap<AttributeKey, AttributeValue>;

/// Recognized attribute keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttributeKey {
    /// Source file of the run (root span, run-level logs).
    #[serde(rename = "playbook.file")]
    PlaybookFile,
    #[serde(rename = "task.name")]
    TaskName,
    /// Action or module kind of the task.
    #[serde(rename = "task.action")]
    TaskAction,
    /// Per-target outcome label.
    #[serde(rename = "task.status")]
    TaskStatus,
    /// Target the task ran against.
    #[serde(rename = "host.name")]
    HostName,
    #[serde(rename = "stats.ok")]
    StatsOk,
    #[serde(rename = "stats.failures")]
    StatsFailures,
    #[serde(rename = "stats.skipped")]
    StatsSkipped,
    #[serde(rename = "stats.unreachable")]
    StatsUnreachable,
}

impl AttributeKey {
    /// Wire name of the key.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKey::PlaybookFile => "playbook.file",
            AttributeKey::TaskName => "task.name",
            AttributeKey::TaskAction => "task.action",
            AttributeKey::TaskStatus => "task.status",
            AttributeKey::HostName => "host.name",
            AttributeKey::StatsOk => "stats.ok",
            AttributeKey::StatsFailures => "stats.failures",
            AttributeKey::StatsSkipped => "stats.skipped",
            AttributeKey::StatsUnreachable => "stats.unreachable",
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute value: either a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    String(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            AttributeValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            AttributeValue::String(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_wire_names_match_serde() {
        let keys = [
            AttributeKey::PlaybookFile,
            AttributeKey::TaskName,
            AttributeKey::TaskAction,
            AttributeKey::TaskStatus,
            AttributeKey::HostName,
            AttributeKey::StatsOk,
            AttributeKey::StatsFailures,
            AttributeKey::StatsSkipped,
            AttributeKey::StatsUnreachable,
        ];
        for key in keys {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }

    #[test]
    fn test_attribute_map_serializes_with_wire_keys() {
        let mut attrs = Attributes::new();
        attrs.insert(AttributeKey::HostName, "web1".into());
        attrs.insert(AttributeKey::StatsOk, 3i64.into());

        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(json, serde_json::json!({"host.name": "web1", "stats.ok": 3}));

        let back: Attributes = serde_json::from_value(json).unwrap();
        assert_eq!(back, attrs);
    }

    #[test]
    fn test_value_accessors() {
        let s = AttributeValue::from("ok");
        let i = AttributeValue::from(7i64);

        assert_eq!(s.as_str(), Some("ok"));
        assert_eq!(s.as_int(), None);
        assert_eq!(i.as_int(), Some(7));
        assert_eq!(i.to_string(), "7");
    }
}
