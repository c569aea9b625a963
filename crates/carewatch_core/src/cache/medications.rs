//! `medications` table access.
//!
//! Merge policy: descriptive columns are last-writer-wins; `last_administered`
//! keeps the later of the stored and inbound timestamps.

use super::{
    bool_to_int, child_exists, conflict_clause, int_to_bool, CacheResult, CacheStore, CacheTable,
    UpsertMode, UpsertOutcome,
};
use crate::model::medication::Medication;
use rusqlite::{params, Connection, OptionalExtension, Row};

const MEDICATION_SELECT_SQL: &str = "SELECT
    id,
    child_id,
    name,
    dosage,
    scheduled_time,
    frequency,
    instructions,
    is_critical,
    last_administered
FROM medications";

const MEDICATION_MERGE_SQL: &str = "child_id = excluded.child_id,
    name = excluded.name,
    dosage = excluded.dosage,
    scheduled_time = excluded.scheduled_time,
    frequency = excluded.frequency,
    instructions = excluded.instructions,
    is_critical = excluded.is_critical,
    last_administered = MAX(
        COALESCE(excluded.last_administered, medications.last_administered),
        COALESCE(medications.last_administered, excluded.last_administered)
    )";

pub(crate) fn upsert_medications(
    conn: &Connection,
    rows: &[Medication],
    mode: UpsertMode,
) -> CacheResult<UpsertOutcome> {
    let sql = format!(
        "INSERT INTO medications (
            id, child_id, name, dosage, scheduled_time, frequency, instructions,
            is_critical, last_administered
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         {};",
        conflict_clause(mode, MEDICATION_MERGE_SQL)
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut outcome = UpsertOutcome::default();

    for medication in rows {
        if !child_exists(conn, &medication.child_id)? {
            outcome.orphaned += 1;
            continue;
        }
        let changed = stmt.execute(params![
            medication.id.as_str(),
            medication.child_id.as_str(),
            medication.name.as_str(),
            medication.dosage.as_str(),
            medication.scheduled_time,
            medication.frequency.as_str(),
            medication.instructions.as_str(),
            bool_to_int(medication.is_critical),
            medication.last_administered,
        ])?;
        if changed == 0 {
            outcome.unchanged += 1;
        } else {
            outcome.written += 1;
        }
    }

    Ok(outcome)
}

pub(crate) fn get_medication(conn: &Connection, id: &str) -> CacheResult<Option<Medication>> {
    let mut stmt = conn.prepare(&format!("{MEDICATION_SELECT_SQL} WHERE id = ?1;"))?;
    let row = stmt
        .query_row([id], |row| Ok(parse_medication_row(row)))
        .optional()?;
    row.transpose()
}

pub(crate) fn list_medications_for_child(
    conn: &Connection,
    child_id: &str,
) -> CacheResult<Vec<Medication>> {
    let mut stmt = conn.prepare(&format!(
        "{MEDICATION_SELECT_SQL} WHERE child_id = ?1 ORDER BY scheduled_time ASC, id ASC;"
    ))?;
    let mut rows = stmt.query([child_id])?;
    let mut medications = Vec::new();
    while let Some(row) = rows.next()? {
        medications.push(parse_medication_row(row)?);
    }
    Ok(medications)
}

pub(crate) fn list_all_medications(conn: &Connection) -> CacheResult<Vec<Medication>> {
    let mut stmt = conn.prepare(&format!("{MEDICATION_SELECT_SQL} ORDER BY id ASC;"))?;
    let mut rows = stmt.query([])?;
    let mut medications = Vec::new();
    while let Some(row) = rows.next()? {
        medications.push(parse_medication_row(row)?);
    }
    Ok(medications)
}

pub(crate) fn set_last_administered(conn: &Connection, id: &str, at_ms: i64) -> CacheResult<usize> {
    Ok(conn.execute(
        "UPDATE medications SET last_administered = ?1 WHERE id = ?2;",
        params![at_ms, id],
    )?)
}

fn parse_medication_row(row: &Row<'_>) -> CacheResult<Medication> {
    Ok(Medication {
        id: row.get("id")?,
        child_id: row.get("child_id")?,
        name: row.get("name")?,
        dosage: row.get("dosage")?,
        scheduled_time: row.get("scheduled_time")?,
        frequency: row.get("frequency")?,
        instructions: row.get("instructions")?,
        is_critical: int_to_bool("medications", "is_critical", row.get("is_critical")?)?,
        last_administered: row.get("last_administered")?,
    })
}

impl CacheStore {
    pub fn upsert_medications(
        &self,
        rows: &[Medication],
        mode: UpsertMode,
    ) -> CacheResult<UpsertOutcome> {
        self.write(&[CacheTable::Medications], |tx| {
            upsert_medications(tx, rows, mode)
        })
    }

    pub fn medication(&self, id: &str) -> CacheResult<Option<Medication>> {
        self.read(|conn| get_medication(conn, id))
    }

    pub fn medications_for_child(&self, child_id: &str) -> CacheResult<Vec<Medication>> {
        self.read(|conn| list_medications_for_child(conn, child_id))
    }
}
