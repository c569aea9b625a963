//! `children` table access.
//!
//! Merge policy: an inbound row replaces the stored one only when its
//! `last_updated` is not older than the stored value. `has_pending_tasks` is
//! always recomputed from the local task rows after a write.

use super::{
    bool_to_int, conflict_clause, int_to_bool, CacheResult, CacheStore, CacheTable, UpsertMode,
    UpsertOutcome,
};
use crate::model::child::Child;
use rusqlite::{params, Connection, OptionalExtension, Row};

const CHILD_SELECT_SQL: &str = "SELECT
    id,
    name,
    age,
    has_pending_tasks,
    is_synced,
    last_updated
FROM children";

const CHILD_MERGE_SQL: &str = "name = excluded.name,
    age = excluded.age,
    has_pending_tasks = excluded.has_pending_tasks,
    is_synced = excluded.is_synced,
    last_updated = excluded.last_updated
 WHERE excluded.last_updated >= children.last_updated";

pub(crate) fn upsert_children(
    conn: &Connection,
    rows: &[Child],
    mode: UpsertMode,
) -> CacheResult<UpsertOutcome> {
    let sql = format!(
        "INSERT INTO children (id, name, age, has_pending_tasks, is_synced, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         {};",
        conflict_clause(mode, CHILD_MERGE_SQL)
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut outcome = UpsertOutcome::default();

    for child in rows {
        let changed = stmt.execute(params![
            child.id.as_str(),
            child.name.as_str(),
            i64::from(child.age),
            bool_to_int(child.has_pending_tasks),
            bool_to_int(child.is_synced),
            child.last_updated,
        ])?;
        if changed == 0 {
            outcome.unchanged += 1;
        } else {
            outcome.written += 1;
            refresh_pending_flag(conn, &child.id)?;
        }
    }

    Ok(outcome)
}

pub(crate) fn get_child(conn: &Connection, id: &str) -> CacheResult<Option<Child>> {
    let mut stmt = conn.prepare(&format!("{CHILD_SELECT_SQL} WHERE id = ?1;"))?;
    let row = stmt
        .query_row([id], |row| Ok(parse_child_row(row)))
        .optional()?;
    row.transpose()
}

pub(crate) fn list_children(conn: &Connection) -> CacheResult<Vec<Child>> {
    let mut stmt = conn.prepare(&format!("{CHILD_SELECT_SQL} ORDER BY name ASC, id ASC;"))?;
    let mut rows = stmt.query([])?;
    let mut children = Vec::new();
    while let Some(row) = rows.next()? {
        children.push(parse_child_row(row)?);
    }
    Ok(children)
}

/// Recomputes `has_pending_tasks` from the child's task rows.
///
/// `last_updated` is left alone: it belongs to the host's version of the row
/// and guards merges of later host edits.
pub(crate) fn refresh_pending_flag(conn: &Connection, child_id: &str) -> CacheResult<()> {
    conn.execute(
        "UPDATE children
         SET has_pending_tasks = EXISTS(
            SELECT 1 FROM tasks WHERE tasks.child_id = ?1 AND tasks.status = 'pending'
         )
         WHERE id = ?1;",
        [child_id],
    )?;
    Ok(())
}

fn parse_child_row(row: &Row<'_>) -> CacheResult<Child> {
    let age: i64 = row.get("age")?;
    let age = u32::try_from(age).map_err(|_| {
        super::CacheError::InvalidData(format!("invalid age `{age}` in children.age"))
    })?;

    Ok(Child {
        id: row.get("id")?,
        name: row.get("name")?,
        age,
        has_pending_tasks: int_to_bool(
            "children",
            "has_pending_tasks",
            row.get("has_pending_tasks")?,
        )?,
        is_synced: int_to_bool("children", "is_synced", row.get("is_synced")?)?,
        last_updated: row.get("last_updated")?,
    })
}

impl CacheStore {
    pub fn upsert_children(&self, rows: &[Child], mode: UpsertMode) -> CacheResult<UpsertOutcome> {
        self.write(&[CacheTable::Children], |tx| upsert_children(tx, rows, mode))
    }

    pub fn child(&self, id: &str) -> CacheResult<Option<Child>> {
        self.read(|conn| get_child(conn, id))
    }

    pub fn children(&self) -> CacheResult<Vec<Child>> {
        self.read(list_children)
    }
}
