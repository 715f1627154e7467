//! Telemetry records exchanged with the remote GraphQL service.
//!
//! Every field the server may leave out is optional (or defaults to an
//! empty collection / JSON `null`), so a partially populated record still
//! decodes instead of failing the whole response.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

pub use self::lenient_timestamp::parse_timestamp;

/// Treat an explicit `null` like a missing field.
///
/// Use with `#[serde(default, deserialize_with = "null_as_default")]`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Optional wire timestamps that never fail a decode.
///
/// Serializes as RFC 3339. Deserializes RFC 3339, or an ISO 8601 date-time
/// without an offset (taken as UTC). Anything else becomes `None` and is
/// logged at warn.
///
/// Use with `#[serde(default, with = "lenient_timestamp")]`.
pub mod lenient_timestamp {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use time::format_description::BorrowedFormatItem;
    use time::format_description::well_known::Rfc3339;
    use time::macros::format_description;
    use time::{OffsetDateTime, PrimitiveDateTime};
    use tracing::warn;

    const NAIVE_FORMAT: &[BorrowedFormatItem<'static>] =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]");

    /// Parse RFC 3339, falling back to an offset-less date-time in UTC.
    pub fn parse_timestamp(text: &str) -> Option<OffsetDateTime> {
        OffsetDateTime::parse(text, &Rfc3339)
            .or_else(|_| PrimitiveDateTime::parse(text, NAIVE_FORMAT).map(PrimitiveDateTime::assume_utc))
            .ok()
    }

    pub fn serialize<S: Serializer>(
        timestamp: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        time::serde::rfc3339::option::serialize(timestamp, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => {
                let parsed = parse_timestamp(&text);
                if parsed.is_none() {
                    warn!("Ignoring unparseable timestamp {:?}", text);
                }
                parsed
            }
            Some(other) => {
                warn!("Ignoring non-string timestamp {}", other);
                None
            }
        })
    }
}

/// A geographic position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in decimal degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Altitude in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Location {
    /// Create a location from latitude, longitude and altitude.
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            altitude: Some(altitude),
        }
    }

    /// Whether both horizontal coordinates are known.
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// A field device (sensor, camera, tracker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Server-assigned identifier.
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Device kind, `type` on the wire.
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default, with = "lenient_timestamp")]
    pub last_seen: Option<OffsetDateTime>,
    /// Battery charge as reported by the device.
    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    /// Opaque structured metadata.
    #[serde(default)]
    pub metadata: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

/// A single sample along a track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    #[serde(default, with = "lenient_timestamp")]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
}

/// A movement track recorded by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default, with = "lenient_timestamp")]
    pub start_time: Option<OffsetDateTime>,
    #[serde(default, with = "lenient_timestamp")]
    pub end_time: Option<OffsetDateTime>,
    #[serde(default)]
    pub total_distance: Option<f64>,
    #[serde(default)]
    pub average_speed: Option<f64>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    /// Ordered samples, oldest first as delivered by the server.
    #[serde(default, deserialize_with = "null_as_default")]
    pub points: Vec<TrackPoint>,
    #[serde(default)]
    pub metadata: Value,
}

/// Short reference to a track, as nested inside other records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRef {
    pub id: String,
    #[serde(default, with = "lenient_timestamp")]
    pub start_time: Option<OffsetDateTime>,
    #[serde(default, with = "lenient_timestamp")]
    pub end_time: Option<OffsetDateTime>,
}

/// Image-space region of a visual detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

/// Something a device detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub id: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default, with = "lenient_timestamp")]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(default)]
    pub detection_type: Option<String>,
    /// Expected in `0.0..=1.0`; not validated.
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub associated_track: Option<TrackRef>,
}

/// Input of the `createEvent` mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub name: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default)]
    pub metadata: Value,
}

/// An event as returned by the server after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default, with = "lenient_timestamp")]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default, with = "lenient_timestamp")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "lenient_timestamp")]
    pub updated_at: Option<OffsetDateTime>,
}

/// Server-side filter for live detections.
///
/// `None` means "no restriction"; unset fields are left out of the
/// serialized variables entirely rather than sent as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
}

impl DetectionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only detections from this device.
    #[must_use]
    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Only detections of this type.
    #[must_use]
    pub fn detection_type(mut self, detection_type: impl Into<String>) -> Self {
        self.detection_type = Some(detection_type.into());
        self
    }

    /// Only detections at or above this confidence.
    #[must_use]
    pub fn min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = Some(min_confidence);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_device_decodes_wire_names() {
        let device: Device = serde_json::from_value(json!({
            "id": "dev-1",
            "name": "North gate",
            "type": "CAMERA",
            "status": "ONLINE",
            "location": {"latitude": 40.7, "longitude": -74.0, "altitude": null},
            "lastSeen": "2025-09-09T10:00:00Z",
            "batteryLevel": 87.5,
            "firmwareVersion": "1.4.2",
            "metadata": {"zone": "a"},
            "tags": ["outdoor"]
        }))
        .unwrap();

        assert_eq!(device.device_type.as_deref(), Some("CAMERA"));
        assert_eq!(device.battery_level, Some(87.5));
        assert_eq!(device.location.unwrap().altitude, None);
        assert_eq!(device.last_seen.unwrap().year(), 2025);
        assert_eq!(device.tags, vec!["outdoor".to_string()]);
    }

    #[test]
    fn test_missing_fields_default() {
        let detection: Detection = serde_json::from_value(json!({"id": "det-1"})).unwrap();
        assert!(detection.timestamp.is_none());
        assert!(detection.location.is_none());
        assert!(detection.metadata.is_null());

        let track: Track =
            serde_json::from_value(json!({"id": "trk-1", "points": null, "startTime": null}))
                .unwrap();
        assert!(track.points.is_empty());
        assert!(track.start_time.is_none());
    }

    #[test]
    fn test_offsetless_timestamp_read_as_utc() {
        let device: Device =
            serde_json::from_value(json!({"id": "dev-1", "lastSeen": "2025-09-09T10:00:00"}))
                .unwrap();
        assert_eq!(device.last_seen, Some(time::macros::datetime!(2025-09-09 10:00:00 UTC)));

        let point: TrackPoint =
            serde_json::from_value(json!({"timestamp": "2025-09-09T10:00:00.250"})).unwrap();
        assert_eq!(
            point.timestamp,
            Some(time::macros::datetime!(2025-09-09 10:00:00.25 UTC))
        );
    }

    #[test]
    fn test_bad_timestamp_keeps_rest_of_record() {
        let devices: Vec<Device> = serde_json::from_value(json!([
            {"id": "dev-1", "name": "Gate", "lastSeen": "2025-09-09T10:00:00Z"},
            {"id": "dev-2", "name": "Yard", "lastSeen": "last tuesday"},
            {"id": "dev-3", "lastSeen": 1757412000}
        ]))
        .unwrap();

        assert_eq!(devices.len(), 3);
        assert!(devices[0].last_seen.is_some());
        assert_eq!(devices[1].name.as_deref(), Some("Yard"));
        assert!(devices[1].last_seen.is_none());
        assert!(devices[2].last_seen.is_none());
    }

    #[test]
    fn test_timestamp_serializes_as_rfc3339() {
        let point = TrackPoint {
            timestamp: Some(OffsetDateTime::UNIX_EPOCH),
            ..Default::default()
        };
        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value["timestamp"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_event_input_uses_wire_names() {
        let input = EventInput {
            name: "Sample".to_string(),
            event_type: "ANOMALY_DETECTED".to_string(),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            device_id: "dev-1".to_string(),
            location: Some(Location::new(1.0, 2.0, 3.0)),
            metadata: json!({"source": "demo"}),
        };
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value["type"], "ANOMALY_DETECTED");
        assert_eq!(value["deviceId"], "dev-1");
        assert_eq!(value["timestamp"], "1970-01-01T00:00:00Z");
        assert_eq!(value["location"]["altitude"], 3.0);
    }

    #[test]
    fn test_empty_filter_serializes_to_empty_object() {
        let value = serde_json::to_value(DetectionFilter::new()).unwrap();
        assert_eq!(value, json!({}));
    }

    proptest! {
        #[test]
        fn prop_filter_never_sends_null(
            device in proptest::option::of("[a-z0-9-]{1,12}"),
            kind in proptest::option::of("[A-Z_]{1,12}"),
            confidence in proptest::option::of(0.0f64..=1.0),
        ) {
            let filter = DetectionFilter {
                device_id: device.clone(),
                detection_type: kind.clone(),
                min_confidence: confidence,
            };
            let value = serde_json::to_value(&filter).unwrap();
            let object = value.as_object().unwrap();

            prop_assert!(object.values().all(|v| !v.is_null()));
            prop_assert_eq!(object.contains_key("deviceId"), device.is_some());
            prop_assert_eq!(object.contains_key("detectionType"), kind.is_some());
            prop_assert_eq!(object.contains_key("minConfidence"), confidence.is_some());
        }
    }
}
