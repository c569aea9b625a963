//! Task repository: completion, miss and reschedule actions.
//!
//! # Invariants
//! - `complete_task` and `miss_task` only leave `pending`; repeating the same
//!   transition is a no-op that returns the stored task.
//! - Completing a task with a `source_id` stamps the source row's
//!   `last_administered` / `last_served` / `last_checked` in the same commit.
//! - The owning child's `has_pending_tasks` flag is recomputed on every change.

use super::{RepoError, RepoResult, RepoStream};
use crate::cache::{
    children, health_checks, meals, medications, tasks, CacheStore, CacheTable,
};
use crate::model::care_task::{CareTask, TaskKind, TaskStatus};
use crate::model::require_timestamp;
use log::{debug, info};
use rusqlite::Connection;

pub trait TaskRepository: Send + Sync {
    fn get_task(&self, id: &str) -> RepoResult<CareTask>;
    fn list_tasks_for_child(&self, child_id: &str) -> RepoResult<Vec<CareTask>>;
    fn list_pending_tasks(&self) -> RepoResult<Vec<CareTask>>;
    fn observe_tasks_for_child(&self, child_id: &str) -> RepoStream<Vec<CareTask>>;
    fn observe_pending_tasks(&self) -> RepoStream<Vec<CareTask>>;
    fn complete_task(&self, id: &str, now_ms: i64) -> RepoResult<CareTask>;
    fn miss_task(&self, id: &str, now_ms: i64) -> RepoResult<CareTask>;
    fn reschedule_task(&self, id: &str, scheduled_time: i64) -> RepoResult<CareTask>;
}

/// Cache-backed task repository.
pub struct CacheTaskRepository {
    store: CacheStore,
}

impl CacheTaskRepository {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    fn transition(&self, id: &str, to: TaskStatus, now_ms: i64) -> RepoResult<CareTask> {
        let task = self.store.write(&CacheTable::ALL, |tx| {
            let task = load_task(tx, id)?;
            if task.status == to {
                return Ok(task);
            }
            if task.status != TaskStatus::Pending {
                return Err(RepoError::InvalidTransition {
                    id: id.to_string(),
                    from: task.status,
                    to,
                });
            }

            tasks::set_task_status(tx, id, to)?;
            if to == TaskStatus::Completed {
                if let Some(source_id) = task.source_id.as_deref() {
                    stamp_source(tx, task.kind, source_id, now_ms)?;
                }
            }
            children::refresh_pending_flag(tx, &task.child_id)?;
            Ok(CareTask { status: to, ..task })
        })?;

        info!(
            "event=task_status module=repo status=ok task_id={} task_status={}",
            task.id,
            task.status.as_str()
        );
        Ok(task)
    }
}

impl TaskRepository for CacheTaskRepository {
    fn get_task(&self, id: &str) -> RepoResult<CareTask> {
        self.store.read(|conn| load_task(conn, id))
    }

    fn list_tasks_for_child(&self, child_id: &str) -> RepoResult<Vec<CareTask>> {
        Ok(self.store.tasks_for_child(child_id)?)
    }

    fn list_pending_tasks(&self) -> RepoResult<Vec<CareTask>> {
        Ok(self.store.pending_tasks()?)
    }

    fn observe_tasks_for_child(&self, child_id: &str) -> RepoStream<Vec<CareTask>> {
        let store = self.store.clone();
        let child_id = child_id.to_string();
        self.store.live(&[CacheTable::Tasks], move || {
            store.tasks_for_child(&child_id).map_err(RepoError::from)
        })
    }

    fn observe_pending_tasks(&self) -> RepoStream<Vec<CareTask>> {
        let store = self.store.clone();
        self.store.live(&[CacheTable::Tasks], move || {
            store.pending_tasks().map_err(RepoError::from)
        })
    }

    fn complete_task(&self, id: &str, now_ms: i64) -> RepoResult<CareTask> {
        self.transition(id, TaskStatus::Completed, now_ms)
    }

    fn miss_task(&self, id: &str, now_ms: i64) -> RepoResult<CareTask> {
        self.transition(id, TaskStatus::Missed, now_ms)
    }

    fn reschedule_task(&self, id: &str, scheduled_time: i64) -> RepoResult<CareTask> {
        require_timestamp("task", "scheduled_time", scheduled_time)?;
        self.store
            .write(&[CacheTable::Tasks, CacheTable::Children], |tx| {
                let task = load_task(tx, id)?;
                tasks::reschedule_task(tx, id, scheduled_time)?;
                children::refresh_pending_flag(tx, &task.child_id)?;
                Ok(CareTask {
                    scheduled_time,
                    status: TaskStatus::Pending,
                    ..task
                })
            })
    }
}

fn load_task(conn: &Connection, id: &str) -> RepoResult<CareTask> {
    tasks::get_task(conn, id)?.ok_or_else(|| RepoError::not_found("task", id))
}

fn stamp_source(conn: &Connection, kind: TaskKind, source_id: &str, now_ms: i64) -> RepoResult<()> {
    let changed = match kind {
        TaskKind::Medication => medications::set_last_administered(conn, source_id, now_ms)?,
        TaskKind::Meal => meals::set_last_served(conn, source_id, now_ms)?,
        TaskKind::Health => health_checks::record_check(conn, source_id, None, now_ms)?,
    };
    if changed == 0 {
        debug!(
            "event=task_source_stamp module=repo status=skipped kind={} source_id={source_id}",
            kind.as_str()
        );
    }
    Ok(())
}
