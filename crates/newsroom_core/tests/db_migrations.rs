use newsroom_core::config::DatabaseSettings;
use newsroom_core::db::migrations::{latest_version, schema_version as read_version};
use newsroom_core::db::{open_db, open_db_in_memory, open_db_with_settings, DbError};
use rusqlite::Connection;

const TABLES: &[&str] = &["users", "stories", "translations", "tasks", "audit_log"];

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in TABLES {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("newsroom.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "stories");
}

#[test]
fn settings_without_path_open_in_memory() {
    let conn = open_db_with_settings(&DatabaseSettings::default()).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
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
fn audit_log_rejects_update_and_delete() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO audit_log (user_id, action, target_type, target_id, metadata, timestamp)
         VALUES ('u', 'STORY_CREATED', 'STORY', 's', '{}', 1);",
        [],
    )
    .unwrap();

    let update = conn
        .execute("UPDATE audit_log SET action = 'STORY_EDITED';", [])
        .map_err(DbError::from)
        .unwrap_err();
    assert!(update.is_constraint_violation());
    assert!(update.to_string().contains("append-only"));

    let delete = conn
        .execute("DELETE FROM audit_log;", [])
        .map_err(DbError::from)
        .unwrap_err();
    assert!(delete.is_constraint_violation());

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM audit_log;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn slot_checks_reject_a_review_stage_without_reviewer() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO users (id, display_name, user_type, role) VALUES ('u', 'Jo', 'STAFF', 'JOURNALIST');",
        [],
    )
    .unwrap();

    let err = conn
        .execute(
            "INSERT INTO stories (id, title, body, stage, author_id, language, created_at, updated_at)
             VALUES ('s', 'T', '', 'NEEDS_JOURNALIST_REVIEW', 'u', 'ENGLISH', 1, 1);",
            [],
        )
        .map_err(DbError::from)
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

fn schema_version(conn: &Connection) -> u32 {
    read_version(conn).unwrap()
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
