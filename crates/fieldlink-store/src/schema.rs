//! Database schema and migrations.

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if version < SCHEMA_VERSION {
        migrate(conn, version)?;
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

/// Create the initial schema (version 1).
///
/// Timestamps are fixed-width UTC text (`YYYY-MM-DDTHH:MM:SS.mmmZ`), so
/// lexical order is chronological and SQLite date functions accept them.
/// Foreign keys are declared but not enforced: detections and tracks may
/// reference devices that have not been fetched yet.
fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS devices (
            id TEXT PRIMARY KEY,
            name TEXT,
            type TEXT,
            status TEXT,
            latitude REAL,
            longitude REAL,
            altitude REAL,
            last_seen TEXT,
            battery_level REAL,
            firmware_version TEXT,
            metadata TEXT,
            tags TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tracks (
            id TEXT PRIMARY KEY,
            device_id TEXT REFERENCES devices(id),
            start_time TEXT,
            end_time TEXT,
            total_distance REAL,
            average_speed REAL,
            max_speed REAL,
            metadata TEXT,
            created_at TEXT NOT NULL
        );

        -- Appended on every save; not deduplicated.
        CREATE TABLE IF NOT EXISTS track_points (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            track_id TEXT REFERENCES tracks(id),
            timestamp TEXT,
            latitude REAL,
            longitude REAL,
            altitude REAL,
            speed REAL,
            heading REAL
        );
        CREATE INDEX IF NOT EXISTS idx_points_track ON track_points(track_id);

        CREATE TABLE IF NOT EXISTS detections (
            id TEXT PRIMARY KEY,
            device_id TEXT REFERENCES devices(id),
            timestamp TEXT,
            detection_type TEXT,
            confidence REAL,
            latitude REAL,
            longitude REAL,
            altitude REAL,
            bbox_x REAL,
            bbox_y REAL,
            bbox_width REAL,
            bbox_height REAL,
            metadata TEXT,
            track_id TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_det_time ON detections(timestamp);
        CREATE INDEX IF NOT EXISTS idx_det_type ON detections(detection_type);
        CREATE INDEX IF NOT EXISTS idx_det_device ON detections(device_id);
        "#,
    )?;

    Ok(())
}

/// Run migrations from old_version to current.
fn migrate(conn: &Connection, old_version: i32) -> Result<()> {
    tracing::info!(
        "Migrating schema from version {} to {}",
        old_version,
        SCHEMA_VERSION
    );
    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(conn: &Connection, kind: &str) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
            .unwrap()
            .query_map([kind], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_initialize_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let tables = names(&conn, "table");
        for table in ["devices", "tracks", "track_points", "detections", "schema_version"] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }

        let indexes = names(&conn, "index");
        for index in ["idx_det_time", "idx_det_type", "idx_det_device"] {
            assert!(indexes.contains(&index.to_string()), "missing index {index}");
        }
    }

    #[test]
    fn test_schema_version_tracking() {
        let conn = Connection::open_in_memory().unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        // Re-opening an initialized database is a no-op.
        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
