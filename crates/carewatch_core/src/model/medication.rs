//! Medication row.

use super::{require_text, require_timestamp, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: String,
    pub child_id: String,
    pub name: String,
    pub dosage: String,
    pub scheduled_time: i64,
    pub frequency: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub last_administered: Option<i64>,
}

impl Medication {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("medication", "id", &self.id)?;
        require_text("medication", "child_id", &self.child_id)?;
        require_text("medication", "name", &self.name)?;
        require_text("medication", "dosage", &self.dosage)?;
        require_timestamp("medication", "scheduled_time", self.scheduled_time)
    }
}
