//! Meal row.

use super::{require_text, require_timestamp, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: String,
    pub child_id: String,
    pub meal_type: String,
    pub scheduled_time: i64,
    #[serde(default)]
    pub dietary_restrictions: String,
    #[serde(default)]
    pub allergies: String,
    #[serde(default)]
    pub last_served: Option<i64>,
}

impl Meal {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("meal", "id", &self.id)?;
        require_text("meal", "child_id", &self.child_id)?;
        require_text("meal", "meal_type", &self.meal_type)?;
        require_timestamp("meal", "scheduled_time", self.scheduled_time)
    }

    /// Whether the meal lists any allergy the caretaker must check.
    pub fn has_allergies(&self) -> bool {
        !self.allergies.trim().is_empty()
    }
}
