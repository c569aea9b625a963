use carewatch_core::db::migrations::latest_version;
use carewatch_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

const CARE_TABLES: [&str; 5] = ["children", "tasks", "medications", "meals", "health_checks"];

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in CARE_TABLES {
        assert_table_exists(&conn, table);
    }
    assert_column_exists(&conn, "tasks", "source_id");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("carewatch.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "children");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn foreign_keys_reject_rows_without_child() {
    let conn = open_db_in_memory().unwrap();

    let result = conn.execute(
        "INSERT INTO medications (id, child_id, name, dosage, scheduled_time, frequency)
         VALUES ('med-x', 'nobody', 'Tylenol', '5ml', 0, 'Daily');",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn deleting_child_cascades_to_owned_rows() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO children (id, name, age, last_updated) VALUES ('c1', 'Sarah Johnson', 4, 0);
         INSERT INTO meals (id, child_id, meal_type, scheduled_time) VALUES ('m1', 'c1', 'Lunch', 0);
         INSERT INTO tasks (id, child_id, title, scheduled_time, kind, status, priority, source_id)
         VALUES ('t1', 'c1', 'Serve Lunch', 0, 'meal', 'pending', 1, 'm1');
         DELETE FROM children WHERE id = 'c1';",
    )
    .unwrap();

    let remaining: i64 = conn
        .query_row(
            "SELECT (SELECT COUNT(*) FROM meals) + (SELECT COUNT(*) FROM tasks);",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn priority_outside_range_is_rejected_by_schema() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO children (id, name, age, last_updated) VALUES ('c1', 'Emma Davis', 3, 0);",
        [],
    )
    .unwrap();

    let result = conn.execute(
        "INSERT INTO tasks (id, child_id, title, scheduled_time, kind, status, priority)
         VALUES ('t1', 'c1', 'Weigh in', 0, 'health', 'pending', 7);",
        [],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}

fn assert_column_exists(conn: &Connection, table_name: &str, column: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2);",
            [table_name, column],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "column {table_name}.{column} does not exist");
}
