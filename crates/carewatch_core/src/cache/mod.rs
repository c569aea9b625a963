//! Local cache store: the offline source of truth on the companion device.
//!
//! # Responsibility
//! - Own the shared SQLite connection for all care tables.
//! - Run every write inside one transaction and publish table changes after
//!   commit.
//! - Provide live queries that re-emit a fresh snapshot after every change to
//!   a watched table.
//!
//! # Invariants
//! - Writes are upserts by primary key; no application path hard-deletes rows.
//! - The connection lock is never held across an `.await`.
//! - A live query always yields its current snapshot first. Bursts of writes
//!   may coalesce into one emission, but the last emission reflects the latest
//!   committed state.

use crate::db::{open_db, open_db_in_memory, DbError};
use log::debug;
use rusqlite::{Connection, Transaction};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub(crate) mod children;
pub(crate) mod health_checks;
pub(crate) mod meals;
pub(crate) mod medications;
pub(crate) mod tasks;

pub type CacheResult<T> = Result<T, CacheError>;

const TABLE_COUNT: usize = 5;

/// Storage-level failure of the local cache.
#[derive(Debug)]
pub enum CacheError {
    Db(DbError),
    /// A persisted value does not decode into the domain model.
    InvalidData(String),
    /// Another thread panicked while holding the connection.
    LockPoisoned,
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid cached data: {message}"),
            Self::LockPoisoned => write!(f, "cache connection lock poisoned"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::LockPoisoned => None,
        }
    }
}

impl From<DbError> for CacheError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Cache tables that can be watched for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTable {
    Children,
    Tasks,
    Medications,
    Meals,
    HealthChecks,
}

impl CacheTable {
    pub const ALL: [CacheTable; TABLE_COUNT] = [
        Self::Children,
        Self::Tasks,
        Self::Medications,
        Self::Meals,
        Self::HealthChecks,
    ];

    const fn index(self) -> usize {
        match self {
            Self::Children => 0,
            Self::Tasks => 1,
            Self::Medications => 2,
            Self::Meals => 3,
            Self::HealthChecks => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Children => "children",
            Self::Tasks => "tasks",
            Self::Medications => "medications",
            Self::Meals => "meals",
            Self::HealthChecks => "health_checks",
        }
    }
}

/// How an upsert treats a row whose primary key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// Apply the incoming row using the merge policy of each table.
    Merge,
    /// Leave the existing row untouched (seed path).
    KeepExisting,
}

/// Per-call write summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Rows inserted or updated.
    pub written: usize,
    /// Rows left unchanged because the stored row wins (newer or kept).
    pub unchanged: usize,
    /// Rows rejected because their owning child is not cached.
    pub orphaned: usize,
}

impl UpsertOutcome {
    pub fn merge(self, other: UpsertOutcome) -> Self {
        Self {
            written: self.written + other.written,
            unchanged: self.unchanged + other.unchanged,
            orphaned: self.orphaned + other.orphaned,
        }
    }
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCounts {
    pub children: u64,
    pub tasks: u64,
    pub medications: u64,
    pub meals: u64,
    pub health_checks: u64,
}

impl CacheCounts {
    pub fn total(&self) -> u64 {
        self.children + self.tasks + self.medications + self.meals + self.health_checks
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TableVersions([u64; TABLE_COUNT]);

impl TableVersions {
    fn get(&self, table: CacheTable) -> u64 {
        self.0[table.index()]
    }
}

/// Broadcast of committed table changes.
///
/// Cloning shares the same feed. A feed can also be created on its own for
/// repositories that are not backed by [`CacheStore`].
#[derive(Clone)]
pub struct ChangeFeed {
    tx: Arc<watch::Sender<TableVersions>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(TableVersions::default());
        Self { tx: Arc::new(tx) }
    }

    /// Marks the given tables as changed.
    pub fn notify(&self, tables: &[CacheTable]) {
        if tables.is_empty() {
            return;
        }
        self.tx.send_modify(|versions| {
            for table in tables {
                versions.0[table.index()] += 1;
            }
        });
        debug!(
            "event=cache_changed module=cache status=ok tables={}",
            tables
                .iter()
                .map(|table| table.name())
                .collect::<Vec<_>>()
                .join(",")
        );
    }

    /// Subscribes to changes of `tables`. Changes committed before this call
    /// are not reported.
    pub fn subscribe(&self, tables: &[CacheTable]) -> ChangeSubscription {
        let rx = self.tx.subscribe();
        let seen = *rx.borrow();
        ChangeSubscription {
            rx,
            tables: tables.to_vec(),
            seen,
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver side of a [`ChangeFeed`] filtered to a set of tables.
pub struct ChangeSubscription {
    rx: watch::Receiver<TableVersions>,
    tables: Vec<CacheTable>,
    seen: TableVersions,
}

impl ChangeSubscription {
    /// Waits until any watched table changed since the last call.
    ///
    /// Returns `false` once the feed is gone and no further change can arrive.
    pub async fn changed(&mut self) -> bool {
        loop {
            let current = *self.rx.borrow_and_update();
            let touched = self
                .tables
                .iter()
                .any(|table| current.get(*table) != self.seen.get(*table));
            self.seen = current;
            if touched {
                return true;
            }
            if self.rx.changed().await.is_err() {
                return false;
            }
        }
    }
}

type Loader<T, E> = Arc<dyn Fn() -> Result<T, E> + Send + Sync>;

/// Continuously updating read: current snapshot first, then one snapshot per
/// observed change.
pub struct LiveQuery<T, E = CacheError> {
    subscription: ChangeSubscription,
    loader: Loader<T, E>,
    /// A snapshot is owed to the caller (initially, or after a change that was
    /// observed but not yet loaded).
    stale: bool,
}

impl<T, E> LiveQuery<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new(
        subscription: ChangeSubscription,
        loader: impl Fn() -> Result<T, E> + Send + Sync + 'static,
    ) -> Self {
        Self {
            subscription,
            loader: Arc::new(loader),
            stale: true,
        }
    }

    /// Returns the next snapshot, or `None` when the change feed is closed.
    ///
    /// The loader runs on tokio's blocking pool. Cancel safe: a change seen
    /// by a dropped call is reloaded by the next one.
    pub async fn next(&mut self) -> Option<Result<T, E>> {
        if !self.stale {
            if !self.subscription.changed().await {
                return None;
            }
            self.stale = true;
        }

        let loader = Arc::clone(&self.loader);
        match tokio::task::spawn_blocking(move || loader()).await {
            Ok(snapshot) => {
                self.stale = false;
                Some(snapshot)
            }
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => None,
        }
    }
}

/// Shared handle over the cache connection and its change feed.
#[derive(Clone)]
pub struct CacheStore {
    conn: Arc<Mutex<Connection>>,
    changes: ChangeFeed,
}

impl CacheStore {
    /// Opens (and migrates) a file-backed cache.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens (and migrates) an in-memory cache.
    pub fn open_in_memory() -> CacheResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            changes: ChangeFeed::new(),
        }
    }

    pub fn changes(&self) -> ChangeFeed {
        self.changes.clone()
    }

    /// Runs a read against the connection.
    pub fn read<R, E>(&self, f: impl FnOnce(&Connection) -> Result<R, E>) -> Result<R, E>
    where
        E: From<CacheError>,
    {
        let guard = self.conn.lock().map_err(|_| CacheError::LockPoisoned)?;
        f(&guard)
    }

    /// Runs `f` in one transaction, commits, then notifies watchers of `tables`.
    ///
    /// Nothing is notified when `f` fails; the transaction rolls back on drop.
    pub fn write<R, E>(
        &self,
        tables: &[CacheTable],
        f: impl FnOnce(&Transaction<'_>) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<CacheError>,
    {
        let result = {
            let mut guard = self.conn.lock().map_err(|_| CacheError::LockPoisoned)?;
            let tx = guard.transaction().map_err(CacheError::from)?;
            let result = f(&tx)?;
            tx.commit().map_err(CacheError::from)?;
            result
        };
        self.changes.notify(tables);
        Ok(result)
    }

    /// Builds a live query over `tables` driven by `loader`.
    pub fn live<T, E>(
        &self,
        tables: &[CacheTable],
        loader: impl Fn() -> Result<T, E> + Send + Sync + 'static,
    ) -> LiveQuery<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        LiveQuery::new(self.changes.subscribe(tables), loader)
    }

    pub fn counts(&self) -> CacheResult<CacheCounts> {
        self.read(|conn| {
            Ok(CacheCounts {
                children: count_rows(conn, CacheTable::Children)?,
                tasks: count_rows(conn, CacheTable::Tasks)?,
                medications: count_rows(conn, CacheTable::Medications)?,
                meals: count_rows(conn, CacheTable::Meals)?,
                health_checks: count_rows(conn, CacheTable::HealthChecks)?,
            })
        })
    }

    /// Whether every care table is empty.
    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.counts()?.total() == 0)
    }
}

pub(crate) fn count_rows(conn: &Connection, table: CacheTable) -> CacheResult<u64> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {};", table.name()),
        [],
        |row| row.get(0),
    )?;
    u64::try_from(count).map_err(|_| CacheError::InvalidData(format!("negative count {count}")))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(table: &str, column: &str, value: i64) -> CacheResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CacheError::InvalidData(format!(
            "invalid {column} value `{other}` in {table}.{column}"
        ))),
    }
}

pub(crate) fn child_exists(conn: &Connection, child_id: &str) -> CacheResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM children WHERE id = ?1);",
        [child_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn conflict_clause(mode: UpsertMode, merge: &str) -> String {
    match mode {
        UpsertMode::Merge => format!("ON CONFLICT(id) DO UPDATE SET {merge}"),
        UpsertMode::KeepExisting => "ON CONFLICT(id) DO NOTHING".to_string(),
    }
}
