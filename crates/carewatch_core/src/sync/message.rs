//! Typed sync messages decoded from channel data items.
//!
//! # Invariants
//! - Decoding happens once, at the channel boundary. Everything past
//!   [`SyncMessage::decode`] works on typed rows.
//! - A malformed or invalid row is dropped and counted in
//!   [`RowBatch::rejected`]; it never fails the rest of its batch.

use super::channel::DataItem;
use super::{SyncError, SyncResult};
use crate::model::care_task::CareTask;
use crate::model::child::Child;
use crate::model::health_check::HealthCheck;
use crate::model::meal::Meal;
use crate::model::medication::Medication;
use crate::model::ValidationError;
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub mod paths {
    pub const CHILDREN: &str = "/children";
    pub const TASKS: &str = "/tasks";
    pub const MEDICATIONS: &str = "/medications";
    pub const MEALS: &str = "/meals";
    pub const HEALTH_CHECKS: &str = "/health-checks";
    pub const REQUEST_INITIAL_DATA: &str = "/request/initial-data";
}

/// Rows decoded from one data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBatch<T> {
    pub rows: Vec<T>,
    /// Rows dropped because they failed to decode or validate.
    pub rejected: usize,
}

impl<T> RowBatch<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self { rows, rejected: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMessage {
    Children(RowBatch<Child>),
    Tasks(RowBatch<CareTask>),
    Medications(RowBatch<Medication>),
    Meals(RowBatch<Meal>),
    HealthChecks(RowBatch<HealthCheck>),
    /// The companion asks the host for a full snapshot.
    RequestInitialData { timestamp: i64 },
}

#[derive(Debug, Serialize, Deserialize)]
struct InitialDataRequest {
    timestamp: i64,
}

impl SyncMessage {
    pub fn decode(item: &DataItem) -> SyncResult<Self> {
        match item.path.as_str() {
            paths::CHILDREN => Ok(Self::Children(decode_rows(item, Child::validate)?)),
            paths::TASKS => Ok(Self::Tasks(decode_rows(item, CareTask::validate)?)),
            paths::MEDICATIONS => Ok(Self::Medications(decode_rows(
                item,
                Medication::validate,
            )?)),
            paths::MEALS => Ok(Self::Meals(decode_rows(item, Meal::validate)?)),
            paths::HEALTH_CHECKS => Ok(Self::HealthChecks(decode_rows(
                item,
                HealthCheck::validate,
            )?)),
            paths::REQUEST_INITIAL_DATA => {
                let request: InitialDataRequest = serde_json::from_slice(&item.payload)
                    .map_err(|err| decode_error(item, err))?;
                Ok(Self::RequestInitialData {
                    timestamp: request.timestamp,
                })
            }
            other => Err(SyncError::UnknownPath(other.to_string())),
        }
    }

    pub fn encode(&self) -> SyncResult<DataItem> {
        let payload = match self {
            Self::Children(batch) => serde_json::to_vec(&batch.rows),
            Self::Tasks(batch) => serde_json::to_vec(&batch.rows),
            Self::Medications(batch) => serde_json::to_vec(&batch.rows),
            Self::Meals(batch) => serde_json::to_vec(&batch.rows),
            Self::HealthChecks(batch) => serde_json::to_vec(&batch.rows),
            Self::RequestInitialData { timestamp } => serde_json::to_vec(&InitialDataRequest {
                timestamp: *timestamp,
            }),
        }
        .map_err(|err| SyncError::Encode(err.to_string()))?;

        Ok(DataItem::new(self.path(), payload))
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Children(_) => paths::CHILDREN,
            Self::Tasks(_) => paths::TASKS,
            Self::Medications(_) => paths::MEDICATIONS,
            Self::Meals(_) => paths::MEALS,
            Self::HealthChecks(_) => paths::HEALTH_CHECKS,
            Self::RequestInitialData { .. } => paths::REQUEST_INITIAL_DATA,
        }
    }

    /// Apply order inside one batch: parents before rows that reference them.
    pub(crate) fn apply_rank(&self) -> u8 {
        match self {
            Self::Children(_) => 0,
            Self::Medications(_) | Self::Meals(_) | Self::HealthChecks(_) => 1,
            Self::Tasks(_) => 2,
            Self::RequestInitialData { .. } => 3,
        }
    }

    pub(crate) fn rejected(&self) -> usize {
        match self {
            Self::Children(batch) => batch.rejected,
            Self::Tasks(batch) => batch.rejected,
            Self::Medications(batch) => batch.rejected,
            Self::Meals(batch) => batch.rejected,
            Self::HealthChecks(batch) => batch.rejected,
            Self::RequestInitialData { .. } => 0,
        }
    }
}

fn decode_rows<T: DeserializeOwned>(
    item: &DataItem,
    validate: fn(&T) -> Result<(), ValidationError>,
) -> SyncResult<RowBatch<T>> {
    let values: Vec<serde_json::Value> =
        serde_json::from_slice(&item.payload).map_err(|err| decode_error(item, err))?;

    let mut batch = RowBatch::new(Vec::with_capacity(values.len()));
    for (index, value) in values.into_iter().enumerate() {
        let row = match serde_json::from_value::<T>(value) {
            Ok(row) => row,
            Err(err) => {
                warn!(
                    "event=sync_decode module=sync status=rejected path={} index={index} reason=malformed error={err}",
                    item.path
                );
                batch.rejected += 1;
                continue;
            }
        };
        if let Err(err) = validate(&row) {
            warn!(
                "event=sync_decode module=sync status=rejected path={} index={index} reason=invalid error={err}",
                item.path
            );
            batch.rejected += 1;
            continue;
        }
        batch.rows.push(row);
    }
    Ok(batch)
}

fn decode_error(item: &DataItem, err: serde_json::Error) -> SyncError {
    SyncError::Decode {
        path: item.path.clone(),
        message: err.to_string(),
    }
}
