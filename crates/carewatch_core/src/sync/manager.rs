//! Sync manager: channel lifecycle, catch-up, initial data and message apply.
//!
//! # Responsibility
//! - Register with the pairing channel and deregister on cleanup.
//! - Companion role: apply entity messages into the cache, seed when empty,
//!   and ask the host for a full snapshot.
//! - Host role: answer snapshot requests by publishing the whole cache.
//!
//! # Invariants
//! - The channel holds only a weak reference to the manager; dropping the
//!   manager ends delivery even without `cleanup`.
//! - No manager lock is held while calling into the channel.

use super::channel::{DataEvent, DataEventKind, DataItem, DataListener, ListenerId, PairingChannel};
use super::message::{RowBatch, SyncMessage};
use super::seed::seed_if_empty;
use super::{SyncError, SyncResult};
use crate::cache::{
    children, health_checks, meals, medications, tasks, CacheStore, UpsertMode, UpsertOutcome,
};
use crate::clock::now_epoch_ms;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, Weak};

/// Which side of the pairing this manager runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRole {
    /// Wearable side: consumes host data, keeps the offline cache.
    Companion,
    /// Phone side: owns the data and publishes snapshots on request.
    Host,
}

/// Summary of applied sync messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Rows written into the cache.
    pub applied: usize,
    /// Rows that matched stored state or lost the merge.
    pub unchanged: usize,
    /// Rows or items dropped: undecodable, invalid, orphaned or unknown path.
    pub skipped: usize,
}

impl SyncReport {
    fn absorb(&mut self, other: SyncReport) {
        self.applied += other.applied;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
    }

    fn from_outcome(outcome: UpsertOutcome, rejected: usize) -> Self {
        Self {
            applied: outcome.written,
            unchanged: outcome.unchanged,
            skipped: outcome.orphaned + rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitialDataOutcome {
    /// The seed dataset was inserted.
    pub seeded: bool,
    /// The request item reached the channel.
    pub request_sent: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitializeOutcome {
    pub listening: bool,
    /// Result of applying items already present on the channel.
    pub caught_up: SyncReport,
    /// Set for the companion role only.
    pub initial_data: Option<InitialDataOutcome>,
}

pub struct SyncManager {
    store: CacheStore,
    channel: Arc<dyn PairingChannel>,
    role: SyncRole,
    listener_id: Mutex<Option<ListenerId>>,
}

struct ManagerListener {
    manager: Weak<SyncManager>,
}

impl DataListener for ManagerListener {
    fn on_data_changed(&self, events: &[DataEvent]) {
        if let Some(manager) = self.manager.upgrade() {
            manager.on_data_changed(events);
        }
    }
}

impl SyncManager {
    pub fn new(store: CacheStore, channel: Arc<dyn PairingChannel>, role: SyncRole) -> Arc<Self> {
        Arc::new(Self {
            store,
            channel,
            role,
            listener_id: Mutex::new(None),
        })
    }

    pub fn role(&self) -> SyncRole {
        self.role
    }

    pub fn is_listening(&self) -> bool {
        self.listener_id
            .lock()
            .map(|id| id.is_some())
            .unwrap_or(false)
    }

    /// Registers for change events, then (companion) applies items already on
    /// the channel and requests initial data.
    ///
    /// A channel that cannot be reached leaves the manager offline; the cache
    /// is still seeded when empty.
    pub fn initialize(self: &Arc<Self>) -> SyncResult<InitializeOutcome> {
        let listening = self.register_listener();
        let mut outcome = InitializeOutcome {
            listening,
            ..InitializeOutcome::default()
        };

        if self.role == SyncRole::Host {
            info!("event=sync_init module=sync status=ok role=host listening={listening}");
            return Ok(outcome);
        }

        match self.channel.data_items() {
            Ok(items) => outcome.caught_up = self.apply_items(&items)?,
            Err(err) => warn!(
                "event=sync_catch_up module=sync status=error error_code=channel_unavailable error={err}"
            ),
        }
        outcome.initial_data = Some(self.request_initial_data()?);

        info!(
            "event=sync_init module=sync status=ok role=companion listening={listening} caught_up={}",
            outcome.caught_up.applied
        );
        Ok(outcome)
    }

    /// Seeds the cache when empty, then asks the host for a full snapshot.
    pub fn request_initial_data(&self) -> SyncResult<InitialDataOutcome> {
        let now_ms = now_epoch_ms();
        let seeded = seed_if_empty(&self.store, now_ms)?.is_some();

        let request = SyncMessage::RequestInitialData { timestamp: now_ms }.encode()?;
        let request_sent = match self.channel.put_data_item(request) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "event=sync_request module=sync status=error error_code=request_failed error={err}"
                );
                false
            }
        };

        Ok(InitialDataOutcome {
            seeded,
            request_sent,
        })
    }

    /// Listener entry point. Errors are logged per item; the batch continues.
    pub fn on_data_changed(&self, events: &[DataEvent]) -> SyncReport {
        let items = events
            .iter()
            .filter_map(|event| match event.kind {
                DataEventKind::Changed => Some(event.item.clone()),
                DataEventKind::Deleted => {
                    debug!(
                        "event=sync_event module=sync status=ignored kind=deleted path={}",
                        event.item.path
                    );
                    None
                }
            })
            .collect::<Vec<_>>();

        match self.apply_items(&items) {
            Ok(report) => report,
            Err(err) => {
                warn!("event=sync_apply module=sync status=error error={err}");
                SyncReport::default()
            }
        }
    }

    /// Publishes every cached row, one data item per entity path.
    ///
    /// Returns the number of items put on the channel.
    pub fn publish_snapshot(&self) -> SyncResult<usize> {
        let messages = self.store.read(|conn| {
            Ok::<_, SyncError>(vec![
                SyncMessage::Children(RowBatch::new(children::list_children(conn)?)),
                SyncMessage::Medications(RowBatch::new(medications::list_all_medications(conn)?)),
                SyncMessage::Meals(RowBatch::new(meals::list_all_meals(conn)?)),
                SyncMessage::HealthChecks(RowBatch::new(health_checks::list_all_health_checks(
                    conn,
                )?)),
                SyncMessage::Tasks(RowBatch::new(tasks::list_all_tasks(conn)?)),
            ])
        })?;

        let mut published = 0;
        for message in messages {
            self.channel.put_data_item(message.encode()?)?;
            published += 1;
        }
        info!("event=sync_publish module=sync status=ok items={published}");
        Ok(published)
    }

    /// Deregisters the channel listener. Safe to call more than once.
    pub fn cleanup(&self) {
        let id = match self.listener_id.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(id) = id {
            if let Err(err) = self.channel.remove_listener(id) {
                warn!("event=sync_cleanup module=sync status=error error={err}");
            }
        }
    }

    fn register_listener(self: &Arc<Self>) -> bool {
        if self.is_listening() {
            return true;
        }
        let listener = Arc::new(ManagerListener {
            manager: Arc::downgrade(self),
        });
        match self.channel.add_listener(listener) {
            Ok(id) => {
                if let Ok(mut slot) = self.listener_id.lock() {
                    *slot = Some(id);
                }
                true
            }
            Err(err) => {
                warn!(
                    "event=sync_listen module=sync status=error error_code=listener_failed error={err}"
                );
                false
            }
        }
    }

    fn apply_items(&self, items: &[DataItem]) -> SyncResult<SyncReport> {
        let mut report = SyncReport::default();
        let mut messages = Vec::with_capacity(items.len());
        for item in items {
            match SyncMessage::decode(item) {
                Ok(message) => messages.push(message),
                Err(err) => {
                    warn!(
                        "event=sync_decode module=sync status=skipped path={} error={err}",
                        item.path
                    );
                    report.skipped += 1;
                }
            }
        }
        messages.sort_by_key(SyncMessage::apply_rank);

        for message in messages {
            match (self.role, message) {
                (SyncRole::Host, SyncMessage::RequestInitialData { timestamp }) => {
                    info!("event=sync_request module=sync status=received requested_at={timestamp}");
                    if let Err(err) = self.publish_snapshot() {
                        warn!("event=sync_publish module=sync status=error error={err}");
                    }
                }
                (SyncRole::Host, message) => {
                    debug!(
                        "event=sync_event module=sync status=ignored role=host path={}",
                        message.path()
                    );
                }
                (SyncRole::Companion, SyncMessage::RequestInitialData { .. }) => {
                    debug!("event=sync_event module=sync status=ignored role=companion path=request");
                }
                (SyncRole::Companion, message) => {
                    report.absorb(apply_message(&self.store, message)?);
                }
            }
        }
        Ok(report)
    }
}

impl Drop for SyncManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Applies one decoded message to the cache with merge semantics.
///
/// `RequestInitialData` is a no-op here; answering it is a host concern.
pub fn apply_message(store: &CacheStore, message: SyncMessage) -> SyncResult<SyncReport> {
    let rejected = message.rejected();
    let path = message.path();
    let outcome = match message {
        SyncMessage::Children(batch) => {
            let rows = batch
                .rows
                .into_iter()
                .map(|mut child| {
                    child.is_synced = true;
                    child
                })
                .collect::<Vec<_>>();
            store.upsert_children(&rows, UpsertMode::Merge)?
        }
        SyncMessage::Tasks(batch) => store.upsert_tasks(&batch.rows, UpsertMode::Merge)?,
        SyncMessage::Medications(batch) => {
            store.upsert_medications(&batch.rows, UpsertMode::Merge)?
        }
        SyncMessage::Meals(batch) => store.upsert_meals(&batch.rows, UpsertMode::Merge)?,
        SyncMessage::HealthChecks(batch) => {
            store.upsert_health_checks(&batch.rows, UpsertMode::Merge)?
        }
        SyncMessage::RequestInitialData { .. } => UpsertOutcome::default(),
    };

    let report = SyncReport::from_outcome(outcome, rejected);
    info!(
        "event=sync_apply module=sync status=ok path={path} applied={} unchanged={} skipped={}",
        report.applied, report.unchanged, report.skipped
    );
    Ok(report)
}
