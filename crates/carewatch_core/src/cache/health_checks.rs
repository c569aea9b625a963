//! `health_checks` table access.
//!
//! Merge policy: `last_checked` keeps the later timestamp; inbound `notes`
//! replace stored notes only when present.

use super::{
    child_exists, conflict_clause, CacheResult, CacheStore, CacheTable, UpsertMode,
    UpsertOutcome,
};
use crate::model::health_check::HealthCheck;
use rusqlite::{params, Connection, OptionalExtension, Row};

const HEALTH_CHECK_SELECT_SQL: &str = "SELECT
    id,
    child_id,
    check_type,
    scheduled_time,
    notes,
    last_checked
FROM health_checks";

const HEALTH_CHECK_MERGE_SQL: &str = "child_id = excluded.child_id,
    check_type = excluded.check_type,
    scheduled_time = excluded.scheduled_time,
    notes = COALESCE(excluded.notes, health_checks.notes),
    last_checked = MAX(
        COALESCE(excluded.last_checked, health_checks.last_checked),
        COALESCE(health_checks.last_checked, excluded.last_checked)
    )";

pub(crate) fn upsert_health_checks(
    conn: &Connection,
    rows: &[HealthCheck],
    mode: UpsertMode,
) -> CacheResult<UpsertOutcome> {
    let sql = format!(
        "INSERT INTO health_checks (
            id, child_id, check_type, scheduled_time, notes, last_checked
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         {};",
        conflict_clause(mode, HEALTH_CHECK_MERGE_SQL)
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut outcome = UpsertOutcome::default();

    for check in rows {
        if !child_exists(conn, &check.child_id)? {
            outcome.orphaned += 1;
            continue;
        }
        let changed = stmt.execute(params![
            check.id.as_str(),
            check.child_id.as_str(),
            check.check_type.as_str(),
            check.scheduled_time,
            check.notes.as_deref(),
            check.last_checked,
        ])?;
        if changed == 0 {
            outcome.unchanged += 1;
        } else {
            outcome.written += 1;
        }
    }

    Ok(outcome)
}

pub(crate) fn get_health_check(conn: &Connection, id: &str) -> CacheResult<Option<HealthCheck>> {
    let mut stmt = conn.prepare(&format!("{HEALTH_CHECK_SELECT_SQL} WHERE id = ?1;"))?;
    let row = stmt
        .query_row([id], |row| Ok(parse_health_check_row(row)))
        .optional()?;
    row.transpose()
}

pub(crate) fn list_health_checks_for_child(
    conn: &Connection,
    child_id: &str,
) -> CacheResult<Vec<HealthCheck>> {
    collect_health_checks(
        conn,
        &format!(
            "{HEALTH_CHECK_SELECT_SQL} WHERE child_id = ?1 ORDER BY scheduled_time ASC, id ASC;"
        ),
        Some(child_id),
    )
}

pub(crate) fn list_all_health_checks(conn: &Connection) -> CacheResult<Vec<HealthCheck>> {
    collect_health_checks(
        conn,
        &format!("{HEALTH_CHECK_SELECT_SQL} ORDER BY id ASC;"),
        None,
    )
}

/// Stamps `last_checked`; `notes` is only replaced when provided.
pub(crate) fn record_check(
    conn: &Connection,
    id: &str,
    notes: Option<&str>,
    at_ms: i64,
) -> CacheResult<usize> {
    Ok(conn.execute(
        "UPDATE health_checks
         SET last_checked = ?1, notes = COALESCE(?2, notes)
         WHERE id = ?3;",
        params![at_ms, notes, id],
    )?)
}

fn collect_health_checks(
    conn: &Connection,
    sql: &str,
    child_id: Option<&str>,
) -> CacheResult<Vec<HealthCheck>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = match child_id {
        Some(child_id) => stmt.query([child_id])?,
        None => stmt.query([])?,
    };
    let mut checks = Vec::new();
    while let Some(row) = rows.next()? {
        checks.push(parse_health_check_row(row)?);
    }
    Ok(checks)
}

fn parse_health_check_row(row: &Row<'_>) -> CacheResult<HealthCheck> {
    Ok(HealthCheck {
        id: row.get("id")?,
        child_id: row.get("child_id")?,
        check_type: row.get("check_type")?,
        scheduled_time: row.get("scheduled_time")?,
        notes: row.get("notes")?,
        last_checked: row.get("last_checked")?,
    })
}

impl CacheStore {
    pub fn upsert_health_checks(
        &self,
        rows: &[HealthCheck],
        mode: UpsertMode,
    ) -> CacheResult<UpsertOutcome> {
        self.write(&[CacheTable::HealthChecks], |tx| {
            upsert_health_checks(tx, rows, mode)
        })
    }

    pub fn health_check(&self, id: &str) -> CacheResult<Option<HealthCheck>> {
        self.read(|conn| get_health_check(conn, id))
    }

    pub fn health_checks_for_child(&self, child_id: &str) -> CacheResult<Vec<HealthCheck>> {
        self.read(|conn| list_health_checks_for_child(conn, child_id))
    }
}
