//! Health check row.

use super::{require_text, require_timestamp, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub id: String,
    pub child_id: String,
    pub check_type: String,
    pub scheduled_time: i64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub last_checked: Option<i64>,
}

impl HealthCheck {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("health_check", "id", &self.id)?;
        require_text("health_check", "child_id", &self.child_id)?;
        require_text("health_check", "check_type", &self.check_type)?;
        require_timestamp("health_check", "scheduled_time", self.scheduled_time)
    }
}
