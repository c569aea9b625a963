//! `meals` table access. `last_served` merges like `last_administered`.

use super::{
    child_exists, conflict_clause, CacheResult, CacheStore, CacheTable, UpsertMode,
    UpsertOutcome,
};
use crate::model::meal::Meal;
use rusqlite::{params, Connection, OptionalExtension, Row};

const MEAL_SELECT_SQL: &str = "SELECT
    id,
    child_id,
    meal_type,
    scheduled_time,
    dietary_restrictions,
    allergies,
    last_served
FROM meals";

const MEAL_MERGE_SQL: &str = "child_id = excluded.child_id,
    meal_type = excluded.meal_type,
    scheduled_time = excluded.scheduled_time,
    dietary_restrictions = excluded.dietary_restrictions,
    allergies = excluded.allergies,
    last_served = MAX(
        COALESCE(excluded.last_served, meals.last_served),
        COALESCE(meals.last_served, excluded.last_served)
    )";

pub(crate) fn upsert_meals(
    conn: &Connection,
    rows: &[Meal],
    mode: UpsertMode,
) -> CacheResult<UpsertOutcome> {
    let sql = format!(
        "INSERT INTO meals (
            id, child_id, meal_type, scheduled_time, dietary_restrictions, allergies, last_served
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         {};",
        conflict_clause(mode, MEAL_MERGE_SQL)
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut outcome = UpsertOutcome::default();

    for meal in rows {
        if !child_exists(conn, &meal.child_id)? {
            outcome.orphaned += 1;
            continue;
        }
        let changed = stmt.execute(params![
            meal.id.as_str(),
            meal.child_id.as_str(),
            meal.meal_type.as_str(),
            meal.scheduled_time,
            meal.dietary_restrictions.as_str(),
            meal.allergies.as_str(),
            meal.last_served,
        ])?;
        if changed == 0 {
            outcome.unchanged += 1;
        } else {
            outcome.written += 1;
        }
    }

    Ok(outcome)
}

pub(crate) fn get_meal(conn: &Connection, id: &str) -> CacheResult<Option<Meal>> {
    let mut stmt = conn.prepare(&format!("{MEAL_SELECT_SQL} WHERE id = ?1;"))?;
    let row = stmt
        .query_row([id], |row| Ok(parse_meal_row(row)))
        .optional()?;
    row.transpose()
}

pub(crate) fn list_meals_for_child(conn: &Connection, child_id: &str) -> CacheResult<Vec<Meal>> {
    collect_meals(
        conn,
        &format!("{MEAL_SELECT_SQL} WHERE child_id = ?1 ORDER BY scheduled_time ASC, id ASC;"),
        Some(child_id),
    )
}

pub(crate) fn list_all_meals(conn: &Connection) -> CacheResult<Vec<Meal>> {
    collect_meals(conn, &format!("{MEAL_SELECT_SQL} ORDER BY id ASC;"), None)
}

pub(crate) fn set_last_served(conn: &Connection, id: &str, at_ms: i64) -> CacheResult<usize> {
    Ok(conn.execute(
        "UPDATE meals SET last_served = ?1 WHERE id = ?2;",
        params![at_ms, id],
    )?)
}

fn collect_meals(conn: &Connection, sql: &str, child_id: Option<&str>) -> CacheResult<Vec<Meal>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = match child_id {
        Some(child_id) => stmt.query([child_id])?,
        None => stmt.query([])?,
    };
    let mut meals = Vec::new();
    while let Some(row) = rows.next()? {
        meals.push(parse_meal_row(row)?);
    }
    Ok(meals)
}

fn parse_meal_row(row: &Row<'_>) -> CacheResult<Meal> {
    Ok(Meal {
        id: row.get("id")?,
        child_id: row.get("child_id")?,
        meal_type: row.get("meal_type")?,
        scheduled_time: row.get("scheduled_time")?,
        dietary_restrictions: row.get("dietary_restrictions")?,
        allergies: row.get("allergies")?,
        last_served: row.get("last_served")?,
    })
}

impl CacheStore {
    pub fn upsert_meals(&self, rows: &[Meal], mode: UpsertMode) -> CacheResult<UpsertOutcome> {
        self.write(&[CacheTable::Meals], |tx| upsert_meals(tx, rows, mode))
    }

    pub fn meal(&self, id: &str) -> CacheResult<Option<Meal>> {
        self.read(|conn| get_meal(conn, id))
    }

    pub fn meals_for_child(&self, child_id: &str) -> CacheResult<Vec<Meal>> {
        self.read(|conn| list_meals_for_child(conn, child_id))
    }
}
