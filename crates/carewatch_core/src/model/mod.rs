//! Care domain model shared by the cache, sync and view-model layers.
//!
//! # Responsibility
//! - Define the row shapes persisted in the local cache.
//! - Define the closed enumerations used by task rows.
//! - Validate rows before any write reaches storage.
//!
//! # Invariants
//! - Every row is identified by a stable, non-empty string id assigned by the
//!   host device (or by the seed dataset).
//! - Every non-child row references its owning child by `child_id`.
//! - Wire names are camelCase to match the host payload schema.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod care_task;
pub mod child;
pub mod health_check;
pub mod meal;
pub mod medication;

/// Row validation failure raised before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field is empty after trimming.
    EmptyField {
        entity: &'static str,
        field: &'static str,
    },
    /// A timestamp is negative.
    NegativeTimestamp {
        entity: &'static str,
        field: &'static str,
        value: i64,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField { entity, field } => write!(f, "{entity}.{field} must not be empty"),
            Self::NegativeTimestamp {
                entity,
                field,
                value,
            } => write!(f, "{entity}.{field} must not be negative, got {value}"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(
    entity: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField { entity, field });
    }
    Ok(())
}

pub(crate) fn require_timestamp(
    entity: &'static str,
    field: &'static str,
    value: i64,
) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::NegativeTimestamp {
            entity,
            field,
            value,
        });
    }
    Ok(())
}
