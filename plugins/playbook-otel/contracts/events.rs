//! Lifecycle events emitted by the execution engine.
//!
//! Events are JSON-serializable with an `event` tag so a run can be
//! recorded as JSON lines and replayed later.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque identity of a unit of work, stable across its start and all of
/// its per-target completions.
///
/// Serialized as a string. Integer identities are accepted on input and
/// kept in their decimal form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl<'de> Deserialize<'de> for UnitId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(id) => UnitId(id),
            RawId::Unsigned(id) => UnitId(id.to_string()),
            RawId::Signed(id) => UnitId(id.to_string()),
        })
    }
}

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<u64> for UnitId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Per-target outcome of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Failed,
    Skipped,
    Unreachable,
}

impl Outcome {
    /// Label used for the `task.status` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
            Outcome::Unreachable => "unreachable",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate outcome counters for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunCounts {
    #[serde(default)]
    pub ok: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub unreachable: u64,
}

impl RunCounts {
    pub fn new(ok: u64, failed: u64, skipped: u64, unreachable: u64) -> Self {
        Self {
            ok,
            failed,
            skipped,
            unreachable,
        }
    }

    /// Counter for a single outcome.
    pub fn get(&self, outcome: Outcome) -> u64 {
        match outcome {
            Outcome::Ok => self.ok,
            Outcome::Failed => self.failed,
            Outcome::Skipped => self.skipped,
            Outcome::Unreachable => self.unreachable,
        }
    }

    pub fn total(&self) -> u64 {
        self.ok
            .saturating_add(self.failed)
            .saturating_add(self.skipped)
            .saturating_add(self.unreachable)
    }
}

impl fmt::Display for RunCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ok={} failed={} skipped={} unreachable={}",
            self.ok, self.failed, self.skipped, self.unreachable
        )
    }
}

/// A lifecycle event delivered by the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    RunStart {
        #[serde(default)]
        source_name: String,
    },
    UnitStart {
        identity: UnitId,
        #[serde(default)]
        name: String,
        #[serde(default)]
        kind: String,
    },
    UnitComplete {
        identity: UnitId,
        #[serde(default)]
        target: String,
        outcome: Outcome,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_detail: Option<String>,
    },
    RunEnd {
        #[serde(default)]
        counts: RunCounts,
    },
}

impl LifecycleEvent {
    pub fn run_start(source_name: impl Into<String>) -> Self {
        LifecycleEvent::RunStart {
            source_name: source_name.into(),
        }
    }

    pub fn unit_start(
        identity: impl Into<UnitId>,
        name: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        LifecycleEvent::UnitStart {
            identity: identity.into(),
            name: name.into(),
            kind: kind.into(),
        }
    }

    pub fn unit_complete(
        identity: impl Into<UnitId>,
        target: impl Into<String>,
        outcome: Outcome,
    ) -> Self {
        LifecycleEvent::UnitComplete {
            identity: identity.into(),
            target: target.into(),
            outcome,
            error_detail: None,
        }
    }

    /// Failed completion carrying an error payload.
    pub fn unit_failed(
        identity: impl Into<UnitId>,
        target: impl Into<String>,
        error_detail: impl Into<String>,
    ) -> Self {
        LifecycleEvent::UnitComplete {
            identity: identity.into(),
            target: target.into(),
            outcome: Outcome::Failed,
            error_detail: Some(error_detail.into()),
        }
    }

    pub fn run_end(counts: RunCounts) -> Self {
        LifecycleEvent::RunEnd { counts }
    }

    /// Short name of the event type, used for metrics labels and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::RunStart { .. } => "run_start",
            LifecycleEvent::UnitStart { .. } => "unit_start",
            LifecycleEvent::UnitComplete { .. } => "unit_complete",
            LifecycleEvent::RunEnd { .. } => "run_end",
        }
    }
}
