// src/db/migrations.rs
//
// Versioned schema for the sync cache.
//
// PRINCIPLES:
// - Migrations are append-only; an applied version is never edited
// - Each version applies in its own transaction with its version row
// - A database written by a newer build is refused, never downgraded

use rusqlite::{params, Connection, OptionalExtension};
use crate::error::{AppError, AppResult};

/// (version, sql) in ascending order
const MIGRATIONS: &[(i32, &str)] = &[(1, include_str!("../../schema.sql"))];

fn latest_version() -> i32 {
    MIGRATIONS.last().map(|(version, _)| *version).unwrap_or(0)
}

/// Bring the schema up to the latest version.
///
/// Safe to call on every start.
pub fn initialize_database(conn: &Connection) -> AppResult<()> {
    let current = get_schema_version(conn)?;
    let latest = latest_version();

    if current > latest {
        return Err(AppError::Other(format!(
            "Database schema {} is newer than this build supports ({})",
            current, latest
        )));
    }

    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        apply_migration(conn, *version, sql)?;
        log::info!("Applied schema migration {}", version);
    }

    log::debug!("Database schema at version {}", latest);
    Ok(())
}

/// 0 for a database that has never been migrated
fn get_schema_version(conn: &Connection) -> AppResult<i32> {
    let tracked: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    if tracked.is_none() {
        return Ok(0);
    }

    let version: Option<i32> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

fn apply_migration(conn: &Connection, version: i32, sql: &str) -> AppResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(sql)
        .map_err(|e| AppError::Other(format!("Schema migration {} failed: {}", version, e)))?;
    tx.execute(
        "INSERT INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
        params![version],
    )?;

    tx.commit()?;
    Ok(())
}

/// Run SQLite's integrity check
pub fn verify_database_integrity(conn: &Connection) -> AppResult<()> {
    let result: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;

    if result != "ok" {
        return Err(AppError::Other(format!("Database integrity check failed: {}", result)));
    }
    Ok(())
}

/// Size and row counts of the sync tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    pub size_bytes: i64,
    pub cached_entity_count: i64,
    pub pinned_entity_count: i64,
    pub progress_count: i64,
    pub partition_count: i64,
}

pub fn get_database_stats(conn: &Connection) -> AppResult<DatabaseStats> {
    let size_bytes: i64 = conn.query_row(
        "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
        [],
        |row| row.get(0),
    )?;

    let stats = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM catalog_cache),
            (SELECT COUNT(*) FROM catalog_cache WHERE pinned = 1),
            (SELECT COUNT(*) FROM progress_records),
            (SELECT COUNT(*) FROM sync_state)",
        [],
        |row| {
            Ok(DatabaseStats {
                size_bytes,
                cached_entity_count: row.get(0)?,
                pinned_entity_count: row.get(1)?,
                progress_count: row.get(2)?,
                partition_count: row.get(3)?,
            })
        },
    )?;

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::create_test_connection;

    fn user_tables(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap()
    }

    #[test]
    fn test_fresh_database_gets_every_table() {
        let conn = create_test_connection().unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        initialize_database(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), latest_version());
        assert_eq!(
            user_tables(&conn),
            vec!["catalog_cache", "progress_records", "schema_version", "sync_state"]
        );
    }

    #[test]
    fn test_initialize_twice_is_a_no_op() {
        let conn = create_test_connection().unwrap();

        initialize_database(&conn).unwrap();
        initialize_database(&conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let conn = create_test_connection().unwrap();
        initialize_database(&conn).unwrap();
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (99, datetime('now'))",
            [],
        )
        .unwrap();

        assert!(initialize_database(&conn).is_err());
    }

    #[test]
    fn test_score_check_constraint() {
        let conn = create_test_connection().unwrap();
        initialize_database(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO progress_records (partition, external_id, status, episodes_watched, score, updated_at)
             VALUES ('library', 1, 'watching', 3, 11, datetime('now'))",
            [],
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_stats_of_empty_database() {
        let conn = create_test_connection().unwrap();
        initialize_database(&conn).unwrap();

        let stats = get_database_stats(&conn).unwrap();

        assert!(stats.size_bytes > 0);
        assert_eq!(stats.cached_entity_count, 0);
        assert_eq!(stats.pinned_entity_count, 0);
        assert_eq!(stats.progress_count, 0);
        assert_eq!(stats.partition_count, 0);
        verify_database_integrity(&conn).unwrap();
    }
}
