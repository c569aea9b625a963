//! Child row.

use super::{require_text, require_timestamp, ValidationError};
use serde::{Deserialize, Serialize};

/// A child under care.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    pub id: String,
    pub name: String,
    pub age: u32,
    /// Derived flag kept in sync with the child's pending task rows.
    #[serde(default)]
    pub has_pending_tasks: bool,
    /// Set once the row has been received from the host device.
    #[serde(default)]
    pub is_synced: bool,
    /// Unix epoch milliseconds of the last mutation. Used for conflict checks.
    pub last_updated: i64,
}

impl Child {
    pub fn new(id: impl Into<String>, name: impl Into<String>, age: u32, now_ms: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age,
            has_pending_tasks: false,
            is_synced: false,
            last_updated: now_ms,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("child", "id", &self.id)?;
        require_text("child", "name", &self.name)?;
        require_timestamp("child", "last_updated", self.last_updated)
    }
}

#[cfg(test)]
mod tests {
    use super::Child;
    use crate::model::ValidationError;

    #[test]
    fn rejects_blank_name_but_accepts_any_age() {
        let blank = Child::new("c1", "  ", 3, 0);
        assert_eq!(
            blank.validate(),
            Err(ValidationError::EmptyField {
                entity: "child",
                field: "name"
            })
        );

        assert_eq!(Child::new("c1", "Ann", 40, 0).validate(), Ok(()));
    }

    #[test]
    fn decodes_camel_case_payload_with_defaults() {
        let child: Child =
            serde_json::from_str(r#"{"id":"c1","name":"Ann","age":5,"lastUpdated":10}"#).unwrap();
        assert!(!child.has_pending_tasks);
        assert!(!child.is_synced);
        assert_eq!(child.last_updated, 10);
    }
}
