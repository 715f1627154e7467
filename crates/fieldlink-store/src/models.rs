//! Data models for stored data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use fieldlink_types::{BoundingBox, Location};

/// A device row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDevice {
    pub id: String,
    pub name: Option<String>,
    pub device_type: Option<String>,
    pub status: Option<String>,
    /// Flattened from the `latitude`/`longitude`/`altitude` columns.
    pub location: Location,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
    pub battery_level: Option<f64>,
    pub firmware_version: Option<String>,
    pub metadata: Value,
    pub tags: Vec<String>,
    /// When the row was first written.
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    /// When the row was last overwritten.
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// A detection row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDetection {
    pub id: String,
    pub device_id: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    pub detection_type: Option<String>,
    pub confidence: Option<f64>,
    pub location: Location,
    pub bounding_box: BoundingBox,
    pub metadata: Value,
    /// Id of the associated track, if the server reported one.
    pub track_id: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// Rows written by [`Store::save_tracks`](crate::Store::save_tracks).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTracks {
    /// Tracks inserted or overwritten.
    pub tracks: usize,
    /// Points appended.
    pub points: usize,
}

/// One aggregate row of the detection analytics report.
///
/// Grouped by detection type, UTC calendar date and device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionAnalytics {
    pub detection_type: Option<String>,
    /// `YYYY-MM-DD`.
    pub date: Option<String>,
    pub avg_confidence: Option<f64>,
    pub detection_count: u64,
    pub device_id: Option<String>,
}

/// A detection with known coordinates, for plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionPoint {
    pub id: String,
    pub device_id: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    pub detection_type: Option<String>,
    pub confidence: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
}
