//! Care task row and its closed enumerations.
//!
//! # Invariants
//! - `priority` is always one of 0, 1, 2; raw inputs are clamped.
//! - `source_id`, when set, names the medication/meal/health-check row the
//!   task was generated from. Relationships are never inferred from titles.

use super::{require_text, require_timestamp, ValidationError};
use serde::{Deserialize, Serialize};

/// Kind of care a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Medication,
    Meal,
    Health,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Medication => "medication",
            Self::Meal => "meal",
            Self::Health => "health",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "medication" => Some(Self::Medication),
            "meal" => Some(Self::Meal),
            "health" => Some(Self::Health),
            _ => None,
        }
    }
}

/// Task lifecycle state.
///
/// `Completed` and `Missed` are terminal for a given schedule; rescheduling
/// returns a task to `Pending` at a new time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Missed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Missed => "missed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "missed" => Some(Self::Missed),
            _ => None,
        }
    }
}

/// Task priority. Serialized as the integer 0 (normal), 1 (high) or 2 (critical).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Priority {
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Clamps any raw integer into the closed priority set.
    pub fn from_raw(value: i64) -> Self {
        match value {
            i64::MIN..=0 => Self::Normal,
            1 => Self::High,
            _ => Self::Critical,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Self::Normal => 0,
            Self::High => 1,
            Self::Critical => 2,
        }
    }
}

impl From<i64> for Priority {
    fn from(value: i64) -> Self {
        Self::from_raw(value)
    }
}

impl From<Priority> for i64 {
    fn from(value: Priority) -> Self {
        value.as_i64()
    }
}

/// An actionable care item scheduled for a child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareTask {
    pub id: String,
    pub child_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Unix epoch milliseconds.
    pub scheduled_time: i64,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(default)]
    pub source_id: Option<String>,
}

impl CareTask {
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("task", "id", &self.id)?;
        require_text("task", "child_id", &self.child_id)?;
        require_text("task", "title", &self.title)?;
        if let Some(source_id) = &self.source_id {
            require_text("task", "source_id", source_id)?;
        }
        require_timestamp("task", "scheduled_time", self.scheduled_time)
    }
}

#[cfg(test)]
mod tests {
    use super::{CareTask, Priority, TaskKind, TaskStatus};

    #[test]
    fn priority_is_clamped_from_raw_values() {
        assert_eq!(Priority::from_raw(-4), Priority::Normal);
        assert_eq!(Priority::from_raw(1), Priority::High);
        assert_eq!(Priority::from_raw(9), Priority::Critical);
    }

    #[test]
    fn decodes_host_payload_and_clamps_priority() {
        let task: CareTask = serde_json::from_str(
            r#"{
                "id": "t1",
                "childId": "c1",
                "title": "Give Tylenol",
                "scheduledTime": 1000,
                "type": "medication",
                "status": "pending",
                "priority": 7,
                "sourceId": "med1"
            }"#,
        )
        .unwrap();

        assert_eq!(task.kind, TaskKind::Medication);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Priority::Critical);
        assert_eq!(task.source_id.as_deref(), Some("med1"));
        assert!(task.description.is_empty());
    }

    #[test]
    fn rejects_unknown_status() {
        let result = serde_json::from_str::<CareTask>(
            r#"{"id":"t1","childId":"c1","title":"x","scheduledTime":1,
                "type":"meal","status":"archived","priority":0}"#,
        );
        assert!(result.is_err());
    }
}
