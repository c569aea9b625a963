//! FFI use-case API for the Flutter shell.
//!
//! # Responsibility
//! - Expose caretaker actions and sync intake to Dart via FRB.
//! - Translate core errors into `{ ok, message }` envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Every call opens the cache at one process-wide path.

use carewatch_core::clock::now_epoch_ms;
use carewatch_core::sync::{apply_message, seed_if_empty, DataItem};
use carewatch_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CacheStore, CareRepositories, CareTask, CoreConfig, RepoResult, SyncMessage,
};
use std::path::PathBuf;
use std::sync::OnceLock;

static CARE_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Action response envelope shared by every care command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CareActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// ID of the row the action touched, when it succeeded.
    pub target_id: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl CareActionResponse {
    fn success(message: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            ok: true,
            target_id: Some(target_id.into()),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            target_id: None,
            message: message.into(),
        }
    }
}

/// Result of applying one inbound data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncApplyResponse {
    pub ok: bool,
    pub applied: u32,
    pub unchanged: u32,
    pub skipped: u32,
    pub message: String,
}

/// Pending task projection for the task list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTaskItem {
    pub task_id: String,
    pub child_id: String,
    pub title: String,
    /// `medication|meal|health`
    pub kind: String,
    pub scheduled_time: i64,
    /// 0 normal, 1 high, 2 critical.
    pub priority: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTasksResponse {
    pub ok: bool,
    pub items: Vec<PendingTaskItem>,
    pub message: String,
}

/// Seeds the sample dataset when the cache holds no rows.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics; an already populated cache is reported as success.
#[flutter_rust_bridge::frb(sync)]
pub fn care_seed_if_empty() -> CareActionResponse {
    let result = open_store().and_then(|store| {
        seed_if_empty(&store, now_epoch_ms()).map_err(|err| err.to_string())
    });
    match result {
        Ok(Some(outcome)) => CareActionResponse::success(
            format!("Seeded {} row(s).", outcome.written),
            "seed",
        ),
        Ok(None) => CareActionResponse::success("Cache already populated.", "seed"),
        Err(err) => CareActionResponse::failure(format!("care_seed_if_empty failed: {err}")),
    }
}

/// Applies one paired-device data item (`path` + JSON payload) to the cache.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Malformed rows are skipped and counted; unknown paths fail the call.
#[flutter_rust_bridge::frb(sync)]
pub fn care_apply_sync_payload(path: String, payload_json: String) -> SyncApplyResponse {
    let item = DataItem::new(path.trim(), payload_json.into_bytes());
    let result = SyncMessage::decode(&item)
        .map_err(|err| err.to_string())
        .and_then(|message| {
            let store = open_store()?;
            apply_message(&store, message).map_err(|err| err.to_string())
        });
    match result {
        Ok(report) => SyncApplyResponse {
            ok: true,
            applied: to_u32(report.applied),
            unchanged: to_u32(report.unchanged),
            skipped: to_u32(report.skipped),
            message: format!("Applied {} row(s).", report.applied),
        },
        Err(err) => SyncApplyResponse {
            ok: false,
            applied: 0,
            unchanged: 0,
            skipped: 0,
            message: format!("care_apply_sync_payload failed: {err}"),
        },
    }
}

/// Lists pending tasks, earliest first, higher priority first on ties.
#[flutter_rust_bridge::frb(sync)]
pub fn care_list_pending_tasks() -> PendingTasksResponse {
    match with_repositories(|repos| repos.tasks.list_pending_tasks()) {
        Ok(tasks) => {
            let items = tasks.into_iter().map(to_pending_item).collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No pending tasks.".to_string()
            } else {
                format!("{} pending task(s).", items.len())
            };
            PendingTasksResponse {
                ok: true,
                items,
                message,
            }
        }
        Err(err) => PendingTasksResponse {
            ok: false,
            items: Vec::new(),
            message: format!("care_list_pending_tasks failed: {err}"),
        },
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn care_complete_task(task_id: String) -> CareActionResponse {
    respond("care_complete_task", |repos| {
        let task = repos.tasks.complete_task(task_id.trim(), now_epoch_ms())?;
        Ok((format!("{} completed.", task.title), task.id))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn care_miss_task(task_id: String) -> CareActionResponse {
    respond("care_miss_task", |repos| {
        let task = repos.tasks.miss_task(task_id.trim(), now_epoch_ms())?;
        Ok((format!("{} marked as missed.", task.title), task.id))
    })
}

/// Moves a task to `scheduled_time` (epoch ms) and back to pending.
#[flutter_rust_bridge::frb(sync)]
pub fn care_reschedule_task(task_id: String, scheduled_time: i64) -> CareActionResponse {
    respond("care_reschedule_task", |repos| {
        let task = repos
            .tasks
            .reschedule_task(task_id.trim(), scheduled_time)?;
        Ok((format!("{} rescheduled.", task.title), task.id))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn care_mark_medication_administered(medication_id: String) -> CareActionResponse {
    respond("care_mark_medication_administered", |repos| {
        let medication = repos
            .medications
            .mark_administered(medication_id.trim(), now_epoch_ms())?;
        Ok((
            format!("{} administered.", medication.name),
            medication.id,
        ))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn care_mark_meal_served(meal_id: String) -> CareActionResponse {
    respond("care_mark_meal_served", |repos| {
        let meal = repos.meals.mark_served(meal_id.trim(), now_epoch_ms())?;
        Ok((format!("{} served.", meal.meal_type), meal.id))
    })
}

/// Records a health check; blank `notes` keep the stored notes.
#[flutter_rust_bridge::frb(sync)]
pub fn care_record_health_check(check_id: String, notes: Option<String>) -> CareActionResponse {
    let notes = notes
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    respond("care_record_health_check", |repos| {
        let check = repos
            .health_checks
            .record_check(check_id.trim(), notes, now_epoch_ms())?;
        Ok((format!("{} recorded.", check.check_type), check.id))
    })
}

fn resolve_care_db_path() -> PathBuf {
    CARE_DB_PATH
        .get_or_init(|| CoreConfig::from_env().db_path)
        .clone()
}

fn open_store() -> Result<CacheStore, String> {
    CacheStore::open(resolve_care_db_path()).map_err(|err| format!("care DB open failed: {err}"))
}

fn with_repositories<T>(f: impl FnOnce(&CareRepositories) -> RepoResult<T>) -> Result<T, String> {
    let store = open_store()?;
    let repos = CareRepositories::from_store(&store);
    f(&repos).map_err(|err| err.to_string())
}

fn respond(
    operation: &str,
    f: impl FnOnce(&CareRepositories) -> RepoResult<(String, String)>,
) -> CareActionResponse {
    match with_repositories(f) {
        Ok((message, target_id)) => CareActionResponse::success(message, target_id),
        Err(err) => {
            log::warn!("event=ffi_call module=ffi status=error op={operation} error={err}");
            CareActionResponse::failure(format!("{operation} failed: {err}"))
        }
    }
}

fn to_pending_item(task: CareTask) -> PendingTaskItem {
    PendingTaskItem {
        kind: task.kind.as_str().to_string(),
        priority: task.priority.as_i64(),
        task_id: task.id,
        child_id: task.child_id,
        title: task.title,
        scheduled_time: task.scheduled_time,
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
