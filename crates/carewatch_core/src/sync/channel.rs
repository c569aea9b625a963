//! Paired-device data channel abstraction.
//!
//! The platform data layer (wearable data items keyed by path) is modeled as a
//! capability with four operations. [`InMemoryPairingChannel`] is a loopback
//! implementation that links a host and a companion inside one process.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

pub type ListenerId = u64;

/// One path-keyed item on the channel. `payload` is UTF-8 JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    pub path: String,
    pub payload: Vec<u8>,
}

impl DataItem {
    pub fn new(path: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataEventKind {
    Changed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEvent {
    pub kind: DataEventKind,
    pub item: DataItem,
}

impl DataEvent {
    pub fn changed(item: DataItem) -> Self {
        Self {
            kind: DataEventKind::Changed,
            item,
        }
    }

    pub fn deleted(item: DataItem) -> Self {
        Self {
            kind: DataEventKind::Deleted,
            item,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// No paired device is reachable.
    Unavailable(String),
    /// The channel refused the operation.
    Rejected { path: String, reason: String },
    UnknownListener(ListenerId),
}

impl Display for ChannelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "paired device unavailable: {reason}"),
            Self::Rejected { path, reason } => write!(f, "channel rejected `{path}`: {reason}"),
            Self::UnknownListener(id) => write!(f, "listener {id} is not registered"),
        }
    }
}

impl Error for ChannelError {}

/// Receives batches of change events from a channel.
pub trait DataListener: Send + Sync {
    fn on_data_changed(&self, events: &[DataEvent]);
}

/// Capability surface of the paired-device data layer.
pub trait PairingChannel: Send + Sync {
    fn add_listener(&self, listener: Arc<dyn DataListener>) -> Result<ListenerId, ChannelError>;
    fn remove_listener(&self, id: ListenerId) -> Result<(), ChannelError>;
    fn put_data_item(&self, item: DataItem) -> Result<(), ChannelError>;
    /// Enumerates the items currently stored on the channel.
    fn data_items(&self) -> Result<Vec<DataItem>, ChannelError>;
}

#[derive(Default)]
struct ChannelState {
    available: bool,
    next_listener_id: ListenerId,
    items: BTreeMap<String, DataItem>,
    listeners: BTreeMap<ListenerId, Arc<dyn DataListener>>,
}

/// In-process channel. Listeners are called synchronously after the internal
/// lock is released, so a listener may write back into the channel.
pub struct InMemoryPairingChannel {
    state: Mutex<ChannelState>,
}

impl InMemoryPairingChannel {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState {
                available: true,
                ..ChannelState::default()
            }),
        }
    }

    /// Simulates the paired device dropping off (or coming back).
    pub fn set_available(&self, available: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.available = available;
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.listeners.len())
            .unwrap_or(0)
    }

    /// Removes an item and emits a `Deleted` event for it.
    pub fn delete_data_item(&self, path: &str) -> Result<bool, ChannelError> {
        let (removed, listeners) = {
            let mut state = self.lock_available()?;
            let removed = state.items.remove(path);
            (removed, state.listeners.values().cloned().collect::<Vec<_>>())
        };
        match removed {
            Some(item) => {
                let events = [DataEvent::deleted(item)];
                for listener in listeners {
                    listener.on_data_changed(&events);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn lock_available(&self) -> Result<std::sync::MutexGuard<'_, ChannelState>, ChannelError> {
        let state = self
            .state
            .lock()
            .map_err(|_| ChannelError::Unavailable("channel state poisoned".to_string()))?;
        if !state.available {
            return Err(ChannelError::Unavailable("not connected".to_string()));
        }
        Ok(state)
    }
}

impl Default for InMemoryPairingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl PairingChannel for InMemoryPairingChannel {
    fn add_listener(&self, listener: Arc<dyn DataListener>) -> Result<ListenerId, ChannelError> {
        let mut state = self.lock_available()?;
        state.next_listener_id += 1;
        let id = state.next_listener_id;
        state.listeners.insert(id, listener);
        Ok(id)
    }

    fn remove_listener(&self, id: ListenerId) -> Result<(), ChannelError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ChannelError::Unavailable("channel state poisoned".to_string()))?;
        state
            .listeners
            .remove(&id)
            .map(|_| ())
            .ok_or(ChannelError::UnknownListener(id))
    }

    fn put_data_item(&self, item: DataItem) -> Result<(), ChannelError> {
        if item.path.trim().is_empty() || !item.path.starts_with('/') {
            return Err(ChannelError::Rejected {
                path: item.path,
                reason: "path must start with `/`".to_string(),
            });
        }

        let listeners = {
            let mut state = self.lock_available()?;
            state.items.insert(item.path.clone(), item.clone());
            state.listeners.values().cloned().collect::<Vec<_>>()
        };

        let events = [DataEvent::changed(item)];
        for listener in listeners {
            listener.on_data_changed(&events);
        }
        Ok(())
    }

    fn data_items(&self) -> Result<Vec<DataItem>, ChannelError> {
        let state = self.lock_available()?;
        Ok(state.items.values().cloned().collect())
    }
}
