//! Companion/host synchronization over the paired-device data channel.
//!
//! # Responsibility
//! - Keep the local cache populated from the paired host, or from the
//!   deterministic seed dataset while nothing has arrived yet.
//! - Decode inbound data items exactly once into [`SyncMessage`] and apply
//!   them with exhaustive dispatch.
//!
//! # Invariants
//! - Channel failures are logged and never abort the caller; cache failures
//!   propagate as [`SyncError::Cache`].
//! - Seeding only happens from `request_initial_data`, only on an empty cache,
//!   and never overwrites an existing row.

use crate::cache::CacheError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod channel;
pub mod manager;
pub mod message;
pub mod seed;

pub use channel::{
    ChannelError, DataEvent, DataEventKind, DataItem, DataListener, InMemoryPairingChannel,
    ListenerId, PairingChannel,
};
pub use manager::{
    apply_message, InitialDataOutcome, InitializeOutcome, SyncManager, SyncReport, SyncRole,
};
pub use message::{paths, RowBatch, SyncMessage};
pub use seed::{sample_dataset, seed_if_empty, SeedData};

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug)]
pub enum SyncError {
    Cache(CacheError),
    Channel(ChannelError),
    /// The data item path does not map to any known message.
    UnknownPath(String),
    /// The payload at `path` is not valid for its message type.
    Decode {
        path: String,
        message: String,
    },
    Encode(String),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cache(err) => write!(f, "{err}"),
            Self::Channel(err) => write!(f, "{err}"),
            Self::UnknownPath(path) => write!(f, "unknown sync path `{path}`"),
            Self::Decode { path, message } => {
                write!(f, "cannot decode payload at `{path}`: {message}")
            }
            Self::Encode(message) => write!(f, "cannot encode sync payload: {message}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Cache(err) => Some(err),
            Self::Channel(err) => Some(err),
            Self::UnknownPath(_) | Self::Decode { .. } | Self::Encode(_) => None,
        }
    }
}

impl From<CacheError> for SyncError {
    fn from(value: CacheError) -> Self {
        Self::Cache(value)
    }
}

impl From<ChannelError> for SyncError {
    fn from(value: ChannelError) -> Self {
        Self::Channel(value)
    }
}
