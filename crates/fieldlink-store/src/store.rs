//! Main store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::{debug, info};

use fieldlink_types::{BoundingBox, Detection, Device, Location, Track};

use crate::error::{Error, Result};
use crate::models::{DetectionAnalytics, DetectionPoint, SavedTracks, StoredDetection, StoredDevice};
use crate::schema;

/// Storage format for every timestamp column.
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// SQLite store for devices, tracks, track points and detections.
///
/// Holds a single connection; every public call locks it for the duration
/// of one statement or one transaction, so a `Store` can be shared between
/// threads behind an `Arc`.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        Self::from_connection(conn)
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Detections and tracks may name devices that were never fetched.
        // The bundled SQLite enforces foreign keys by default, so switch
        // enforcement off for this connection.
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-transaction rolls the transaction back on drop, so the
        // connection is still consistent.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // === Writes ===

    /// Insert or overwrite devices.
    ///
    /// Every column of an existing row is replaced by the incoming value and
    /// `updated_at` is refreshed; `created_at` is kept. Runs in one
    /// transaction. Returns the number of devices written.
    pub fn save_devices(&self, devices: &[Device]) -> Result<usize> {
        let now = format_timestamp(OffsetDateTime::now_utc())?;
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO devices (id, name, type, status, latitude, longitude, altitude,
                                      last_seen, battery_level, firmware_version, metadata, tags,
                                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    type = excluded.type,
                    status = excluded.status,
                    latitude = excluded.latitude,
                    longitude = excluded.longitude,
                    altitude = excluded.altitude,
                    last_seen = excluded.last_seen,
                    battery_level = excluded.battery_level,
                    firmware_version = excluded.firmware_version,
                    metadata = excluded.metadata,
                    tags = excluded.tags,
                    updated_at = excluded.updated_at",
            )?;

            for device in devices {
                let location = device.location.unwrap_or_default();
                stmt.execute(params![
                    device.id,
                    device.name,
                    device.device_type,
                    device.status,
                    location.latitude,
                    location.longitude,
                    location.altitude,
                    format_optional(device.last_seen)?,
                    device.battery_level,
                    device.firmware_version,
                    metadata_text(&device.metadata)?,
                    serde_json::to_string(&device.tags)?,
                    now,
                ])?;
            }
        }
        tx.commit()?;

        debug!("Saved {} devices", devices.len());
        Ok(devices.len())
    }

    /// Insert or overwrite tracks and append their points.
    ///
    /// Points are appended on every call, so saving the same track twice
    /// stores its points twice. Runs in one transaction.
    pub fn save_tracks(&self, tracks: &[Track]) -> Result<SavedTracks> {
        let now = format_timestamp(OffsetDateTime::now_utc())?;
        let mut saved = SavedTracks::default();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut track_stmt = tx.prepare(
                "INSERT INTO tracks (id, device_id, start_time, end_time, total_distance,
                                     average_speed, max_speed, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    device_id = excluded.device_id,
                    start_time = excluded.start_time,
                    end_time = excluded.end_time,
                    total_distance = excluded.total_distance,
                    average_speed = excluded.average_speed,
                    max_speed = excluded.max_speed,
                    metadata = excluded.metadata",
            )?;
            let mut point_stmt = tx.prepare(
                "INSERT INTO track_points (track_id, timestamp, latitude, longitude, altitude,
                                           speed, heading)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for track in tracks {
                track_stmt.execute(params![
                    track.id,
                    track.device_id,
                    format_optional(track.start_time)?,
                    format_optional(track.end_time)?,
                    track.total_distance,
                    track.average_speed,
                    track.max_speed,
                    metadata_text(&track.metadata)?,
                    now,
                ])?;
                saved.tracks += 1;

                for point in &track.points {
                    let location = point.location.unwrap_or_default();
                    point_stmt.execute(params![
                        track.id,
                        format_optional(point.timestamp)?,
                        location.latitude,
                        location.longitude,
                        location.altitude,
                        point.speed,
                        point.heading,
                    ])?;
                    saved.points += 1;
                }
            }
        }
        tx.commit()?;

        debug!("Saved {} tracks with {} points", saved.tracks, saved.points);
        Ok(saved)
    }

    /// Insert detections that are not stored yet.
    ///
    /// An existing row with the same id is left untouched. Runs in one
    /// transaction. Returns the number of new rows.
    pub fn save_detections(&self, detections: &[Detection]) -> Result<usize> {
        let now = format_timestamp(OffsetDateTime::now_utc())?;
        let mut inserted = 0;
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO detections (id, device_id, timestamp, detection_type, confidence,
                                         latitude, longitude, altitude,
                                         bbox_x, bbox_y, bbox_width, bbox_height,
                                         metadata, track_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(id) DO NOTHING",
            )?;

            for detection in detections {
                let location = detection.location.unwrap_or_default();
                let bbox = detection.bounding_box.unwrap_or_default();
                inserted += stmt.execute(params![
                    detection.id,
                    detection.device_id,
                    format_optional(detection.timestamp)?,
                    detection.detection_type,
                    detection.confidence,
                    location.latitude,
                    location.longitude,
                    location.altitude,
                    bbox.x,
                    bbox.y,
                    bbox.width,
                    bbox.height,
                    metadata_text(&detection.metadata)?,
                    detection.associated_track.as_ref().map(|t| t.id.as_str()),
                    now,
                ])?;
            }
        }
        tx.commit()?;

        debug!(
            "Saved {} new detections ({} already stored)",
            inserted,
            detections.len() - inserted
        );
        Ok(inserted)
    }

    // === Analytics ===

    /// Detection counts and mean confidence per type, UTC date and device
    /// over the last `days` days, newest date first.
    ///
    /// A window reaching back before 1970 covers every stored detection.
    pub fn recent_detection_analytics(&self, days: u32) -> Result<Vec<DetectionAnalytics>> {
        let cutoff = OffsetDateTime::now_utc()
            .checked_sub(Duration::days(i64::from(days)))
            .map_or(OffsetDateTime::UNIX_EPOCH, |t| t.max(OffsetDateTime::UNIX_EPOCH));
        let cutoff = format_timestamp(cutoff)?;
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT detection_type,
                    DATE(timestamp) AS date,
                    AVG(confidence) AS avg_confidence,
                    COUNT(*) AS detection_count,
                    device_id
             FROM detections
             WHERE timestamp >= ?1
             GROUP BY detection_type, DATE(timestamp), device_id
             ORDER BY date DESC, detection_type, device_id",
        )?;

        let rows = stmt
            .query_map([cutoff], |row| {
                Ok(DetectionAnalytics {
                    detection_type: row.get(0)?,
                    date: row.get(1)?,
                    avg_confidence: row.get(2)?,
                    detection_count: count_column(row, 3)?,
                    device_id: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// The most recent `limit` detections that have both coordinates,
    /// newest first.
    pub fn detection_points(&self, limit: u32) -> Result<Vec<DetectionPoint>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, device_id, timestamp, detection_type, confidence, latitude, longitude
             FROM detections
             WHERE latitude IS NOT NULL AND longitude IS NOT NULL
             ORDER BY timestamp DESC
             LIMIT ?1",
        )?;

        let points = stmt
            .query_map([limit], |row| {
                Ok(DetectionPoint {
                    id: row.get(0)?,
                    device_id: row.get(1)?,
                    timestamp: timestamp_column(row, 2)?,
                    detection_type: row.get(3)?,
                    confidence: row.get(4)?,
                    latitude: row.get(5)?,
                    longitude: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(points)
    }

    // === Reads ===

    /// Get a device by ID.
    pub fn get_device(&self, device_id: &str) -> Result<Option<StoredDevice>> {
        let conn = self.conn();
        let device = conn
            .query_row(
                "SELECT id, name, type, status, latitude, longitude, altitude, last_seen,
                        battery_level, firmware_version, metadata, tags, created_at, updated_at
                 FROM devices WHERE id = ?1",
                [device_id],
                |row| {
                    Ok(StoredDevice {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        device_type: row.get(2)?,
                        status: row.get(3)?,
                        location: Location {
                            latitude: row.get(4)?,
                            longitude: row.get(5)?,
                            altitude: row.get(6)?,
                        },
                        last_seen: timestamp_column(row, 7)?,
                        battery_level: row.get(8)?,
                        firmware_version: row.get(9)?,
                        metadata: json_column(row, 10)?,
                        tags: json_column::<Option<Vec<String>>>(row, 11)?.unwrap_or_default(),
                        created_at: timestamp_column(row, 12)?,
                        updated_at: timestamp_column(row, 13)?,
                    })
                },
            )
            .optional()?;

        Ok(device)
    }

    /// Get a detection by ID.
    pub fn get_detection(&self, detection_id: &str) -> Result<Option<StoredDetection>> {
        let conn = self.conn();
        let detection = conn
            .query_row(
                "SELECT id, device_id, timestamp, detection_type, confidence,
                        latitude, longitude, altitude, bbox_x, bbox_y, bbox_width, bbox_height,
                        metadata, track_id, created_at
                 FROM detections WHERE id = ?1",
                [detection_id],
                |row| {
                    Ok(StoredDetection {
                        id: row.get(0)?,
                        device_id: row.get(1)?,
                        timestamp: timestamp_column(row, 2)?,
                        detection_type: row.get(3)?,
                        confidence: row.get(4)?,
                        location: Location {
                            latitude: row.get(5)?,
                            longitude: row.get(6)?,
                            altitude: row.get(7)?,
                        },
                        bounding_box: BoundingBox {
                            x: row.get(8)?,
                            y: row.get(9)?,
                            width: row.get(10)?,
                            height: row.get(11)?,
                        },
                        metadata: json_column(row, 12)?,
                        track_id: row.get(13)?,
                        created_at: timestamp_column(row, 14)?,
                    })
                },
            )
            .optional()?;

        Ok(detection)
    }

    pub fn count_devices(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM devices", None)
    }

    pub fn count_tracks(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM tracks", None)
    }

    /// Count track points, optionally for one track.
    pub fn count_track_points(&self, track_id: Option<&str>) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM track_points WHERE ?1 IS NULL OR track_id = ?1",
            Some(track_id),
        )
    }

    pub fn count_detections(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM detections", None)
    }

    fn count(&self, sql: &str, filter: Option<Option<&str>>) -> Result<u64> {
        let conn = self.conn();
        let count = match filter {
            Some(value) => conn.query_row(sql, [value], |row| count_column(row, 0))?,
            None => conn.query_row(sql, [], |row| count_column(row, 0))?,
        };
        Ok(count)
    }
}

/// Format a timestamp in the fixed-width UTC storage format.
fn format_timestamp(timestamp: OffsetDateTime) -> Result<String> {
    timestamp
        .to_offset(UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .map_err(|e| Error::InvalidTimestamp(e.to_string()))
}

fn format_optional(timestamp: Option<OffsetDateTime>) -> Result<Option<String>> {
    timestamp.map(format_timestamp).transpose()
}

/// Parse a stored timestamp; unrecognized text reads as `None`.
fn parse_timestamp(text: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(text, TIMESTAMP_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .or_else(|_| OffsetDateTime::parse(text, &Rfc3339))
        .ok()
}

/// Metadata as stored: JSON text, `{}` for null.
fn metadata_text(metadata: &Value) -> Result<String> {
    if metadata.is_null() {
        Ok("{}".to_string())
    } else {
        Ok(serde_json::to_string(metadata)?)
    }
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<OffsetDateTime>> {
    let text: Option<String> = row.get(idx)?;
    Ok(text.as_deref().and_then(parse_timestamp))
}

fn json_column<T: serde::de::DeserializeOwned + Default>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let text: Option<String> = row.get(idx)?;
    match text {
        None => Ok(T::default()),
        Some(text) => serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
    }
}

fn count_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let count: i64 = row.get(idx)?;
    Ok(u64::try_from(count).unwrap_or_default())
}
