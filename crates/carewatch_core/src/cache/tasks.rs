//! `tasks` table access.
//!
//! Merge policy: last writer wins for every column. The pending flag of every
//! child that gained or lost a task row is recomputed in the same write.

use super::children::refresh_pending_flag;
use super::{
    child_exists, conflict_clause, CacheError, CacheResult, CacheStore, CacheTable, UpsertMode,
    UpsertOutcome,
};
use crate::model::care_task::{CareTask, Priority, TaskKind, TaskStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

const TASK_SELECT_SQL: &str = "SELECT
    id,
    child_id,
    title,
    description,
    scheduled_time,
    kind,
    status,
    priority,
    source_id
FROM tasks";

const TASK_MERGE_SQL: &str = "child_id = excluded.child_id,
    title = excluded.title,
    description = excluded.description,
    scheduled_time = excluded.scheduled_time,
    kind = excluded.kind,
    status = excluded.status,
    priority = excluded.priority,
    source_id = excluded.source_id";

pub(crate) fn upsert_tasks(
    conn: &Connection,
    rows: &[CareTask],
    mode: UpsertMode,
) -> CacheResult<UpsertOutcome> {
    let sql = format!(
        "INSERT INTO tasks (
            id, child_id, title, description, scheduled_time, kind, status, priority, source_id
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         {};",
        conflict_clause(mode, TASK_MERGE_SQL)
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut outcome = UpsertOutcome::default();
    let mut touched: BTreeSet<String> = BTreeSet::new();

    for task in rows {
        if !child_exists(conn, &task.child_id)? {
            outcome.orphaned += 1;
            continue;
        }
        let previous_owner: Option<String> = conn
            .query_row("SELECT child_id FROM tasks WHERE id = ?1;", [task.id.as_str()], |row| {
                row.get(0)
            })
            .optional()?;
        let changed = stmt.execute(params![
            task.id.as_str(),
            task.child_id.as_str(),
            task.title.as_str(),
            task.description.as_str(),
            task.scheduled_time,
            task.kind.as_str(),
            task.status.as_str(),
            task.priority.as_i64(),
            task.source_id.as_deref(),
        ])?;
        if changed == 0 {
            outcome.unchanged += 1;
        } else {
            outcome.written += 1;
            touched.insert(task.child_id.clone());
            touched.extend(previous_owner);
        }
    }

    for child_id in &touched {
        refresh_pending_flag(conn, child_id)?;
    }
    Ok(outcome)
}

pub(crate) fn get_task(conn: &Connection, id: &str) -> CacheResult<Option<CareTask>> {
    let mut stmt = conn.prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
    let row = stmt
        .query_row([id], |row| Ok(parse_task_row(row)))
        .optional()?;
    row.transpose()
}

pub(crate) fn list_tasks_for_child(conn: &Connection, child_id: &str) -> CacheResult<Vec<CareTask>> {
    collect_tasks(
        conn,
        &format!(
            "{TASK_SELECT_SQL} WHERE child_id = ?1 ORDER BY scheduled_time ASC, priority DESC, id ASC;"
        ),
        &[child_id],
    )
}

/// Pending tasks across all children, earliest first, most urgent first on ties.
pub(crate) fn list_pending_tasks(conn: &Connection) -> CacheResult<Vec<CareTask>> {
    collect_tasks(
        conn,
        &format!(
            "{TASK_SELECT_SQL} WHERE status = 'pending'
             ORDER BY scheduled_time ASC, priority DESC, id ASC;"
        ),
        &[],
    )
}

pub(crate) fn list_all_tasks(conn: &Connection) -> CacheResult<Vec<CareTask>> {
    collect_tasks(conn, &format!("{TASK_SELECT_SQL} ORDER BY id ASC;"), &[])
}

/// Returns the number of matched rows (0 when the id is unknown).
pub(crate) fn set_task_status(
    conn: &Connection,
    id: &str,
    status: TaskStatus,
) -> CacheResult<usize> {
    Ok(conn.execute(
        "UPDATE tasks SET status = ?1 WHERE id = ?2;",
        params![status.as_str(), id],
    )?)
}

pub(crate) fn reschedule_task(
    conn: &Connection,
    id: &str,
    scheduled_time: i64,
) -> CacheResult<usize> {
    Ok(conn.execute(
        "UPDATE tasks SET scheduled_time = ?1, status = 'pending' WHERE id = ?2;",
        params![scheduled_time, id],
    )?)
}

/// Completes every pending task generated from `source_id`.
///
/// Returns the completed tasks as they were before the update.
pub(crate) fn complete_pending_for_source(
    conn: &Connection,
    source_id: &str,
) -> CacheResult<Vec<CareTask>> {
    let pending = collect_tasks(
        conn,
        &format!("{TASK_SELECT_SQL} WHERE source_id = ?1 AND status = 'pending' ORDER BY id ASC;"),
        &[source_id],
    )?;
    conn.execute(
        "UPDATE tasks SET status = 'completed' WHERE source_id = ?1 AND status = 'pending';",
        [source_id],
    )?;
    Ok(pending)
}

fn collect_tasks(conn: &Connection, sql: &str, args: &[&str]) -> CacheResult<Vec<CareTask>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(args.iter()))?;
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(parse_task_row(row)?);
    }
    Ok(tasks)
}

fn parse_task_row(row: &Row<'_>) -> CacheResult<CareTask> {
    let kind_text: String = row.get("kind")?;
    let kind = TaskKind::parse(&kind_text).ok_or_else(|| {
        CacheError::InvalidData(format!("invalid task kind `{kind_text}` in tasks.kind"))
    })?;

    let status_text: String = row.get("status")?;
    let status = TaskStatus::parse(&status_text).ok_or_else(|| {
        CacheError::InvalidData(format!("invalid task status `{status_text}` in tasks.status"))
    })?;

    Ok(CareTask {
        id: row.get("id")?,
        child_id: row.get("child_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        scheduled_time: row.get("scheduled_time")?,
        kind,
        status,
        priority: Priority::from_raw(row.get("priority")?),
        source_id: row.get("source_id")?,
    })
}

impl CacheStore {
    /// Inserts task rows. Rows whose child is not cached are counted as orphaned.
    pub fn upsert_tasks(&self, rows: &[CareTask], mode: UpsertMode) -> CacheResult<UpsertOutcome> {
        self.write(&[CacheTable::Tasks, CacheTable::Children], |tx| {
            upsert_tasks(tx, rows, mode)
        })
    }

    pub fn task(&self, id: &str) -> CacheResult<Option<CareTask>> {
        self.read(|conn| get_task(conn, id))
    }

    pub fn tasks_for_child(&self, child_id: &str) -> CacheResult<Vec<CareTask>> {
        self.read(|conn| list_tasks_for_child(conn, child_id))
    }

    pub fn pending_tasks(&self) -> CacheResult<Vec<CareTask>> {
        self.read(list_pending_tasks)
    }
}
