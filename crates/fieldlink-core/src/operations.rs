//! GraphQL documents and their typed request/response shapes.
//!
//! Each query or mutation is described by a marker type implementing
//! [`GraphqlOperation`], which pairs the document text with the Rust types
//! of its variables and its `data` object. Optional variables are left out
//! of the serialized object when unset, never sent as `null`.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use fieldlink_types::{CreatedEvent, Detection, Device, EventInput, Track, null_as_default};

// ==========================================================================
// Documents
// ==========================================================================

pub const INTROSPECTION: &str = r#"
query IntrospectionQuery {
  __schema {
    types {
      name
      kind
      description
      fields {
        name
        type { name kind }
        description
      }
    }
  }
}
"#;

pub const GET_DEVICES: &str = r#"
query GetDevices($limit: Int, $offset: Int) {
  devices(limit: $limit, offset: $offset) {
    id
    name
    type
    status
    location { latitude longitude altitude }
    lastSeen
    batteryLevel
    firmwareVersion
    metadata
    tags
  }
}
"#;

pub const GET_DEVICE: &str = r#"
query GetDevice($deviceId: ID!) {
  device(id: $deviceId) {
    id
    name
    type
    status
    location { latitude longitude altitude }
    lastSeen
    batteryLevel
    firmwareVersion
    metadata
    tracks { id startTime endTime totalDistance averageSpeed }
    recentDetections(limit: 10) {
      id timestamp detectionType confidence
      location { latitude longitude }
    }
  }
}
"#;

pub const GET_TRACKS: &str = r#"
query GetTracks($deviceId: ID, $startTime: DateTime, $endTime: DateTime, $limit: Int) {
  tracks(deviceId: $deviceId, startTime: $startTime, endTime: $endTime, limit: $limit) {
    id deviceId startTime endTime totalDistance averageSpeed maxSpeed
    points {
      timestamp
      location { latitude longitude altitude }
      speed heading
    }
    metadata
  }
}
"#;

pub const GET_DETECTIONS: &str = r#"
query GetDetections($deviceId: ID, $detectionType: String, $startTime: DateTime,
                    $endTime: DateTime, $limit: Int, $minConfidence: Float) {
  detections(deviceId: $deviceId, detectionType: $detectionType, startTime: $startTime,
             endTime: $endTime, limit: $limit, minConfidence: $minConfidence) {
    id deviceId timestamp detectionType confidence
    location { latitude longitude altitude }
    boundingBox { x y width height }
    metadata
    associatedTrack { id startTime endTime }
  }
}
"#;

pub const CREATE_EVENT: &str = r#"
mutation CreateEvent($input: CreateEventInput!) {
  createEvent(input: $input) {
    id name type timestamp deviceId
    location { latitude longitude altitude }
    metadata createdAt updatedAt
  }
}
"#;

/// Live detection feed; results arrive under `detectionCreated`.
pub const SUB_DETECTIONS: &str = r#"
subscription NewDetections($deviceId: ID, $detectionType: String, $minConfidence: Float) {
  detectionCreated(deviceId: $deviceId, detectionType: $detectionType, minConfidence: $minConfidence) {
    id deviceId timestamp detectionType confidence
    location { latitude longitude altitude }
    metadata
  }
}
"#;

/// Response field carrying [`SUB_DETECTIONS`] results.
pub const DETECTION_CREATED_FIELD: &str = "detectionCreated";

// ==========================================================================
// Response envelope
// ==========================================================================

/// Source position of a GraphQL error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}

/// One entry of a response's `errors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locations: Vec<ErrorLocation>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl fmt::Display for GraphqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            let path: Vec<String> = self
                .path
                .iter()
                .map(|segment| match segment {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            write!(f, "{} (at {})", self.message, path.join("."))
        }
    }
}

/// A decoded GraphQL response: optional `data` plus protocol errors.
///
/// Errors and data may both be present; the caller decides what to keep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlResponse<T> {
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<GraphqlError>,
}

impl<T> GraphqlResponse<T> {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Messages of all errors, in order.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Records extracted from a query response together with any errors the
/// server reported alongside them.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    pub value: T,
    pub errors: Vec<GraphqlError>,
}

impl<T> QueryResult<T> {
    /// Extract a value from a response, defaulting when `data` is absent.
    pub fn from_response<D>(response: GraphqlResponse<D>, extract: impl FnOnce(D) -> T) -> Self
    where
        T: Default,
    {
        Self {
            value: response.data.map(extract).unwrap_or_default(),
            errors: response.errors,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

// ==========================================================================
// Typed operations
// ==========================================================================

/// A GraphQL document with typed variables and `data`.
pub trait GraphqlOperation {
    /// Variables object; serializing to `null` or `{}` omits `variables`.
    type Variables: Serialize;
    /// Shape of the response `data` object.
    type Data: DeserializeOwned;

    const DOCUMENT: &'static str;
    /// Operation name, used in logs.
    const NAME: &'static str;
}

/// Schema introspection.
pub struct Introspection;

impl GraphqlOperation for Introspection {
    type Variables = ();
    type Data = IntrospectionData;

    const DOCUMENT: &'static str = INTROSPECTION;
    const NAME: &'static str = "IntrospectionQuery";
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntrospectionData {
    #[serde(default, rename = "__schema")]
    pub schema: Option<SchemaInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub types: Vec<SchemaType>,
}

/// A named type as reported by introspection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaType {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaField {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Paged device listing.
pub struct GetDevices;

impl GraphqlOperation for GetDevices {
    type Variables = DevicesVariables;
    type Data = DevicesData;

    const DOCUMENT: &'static str = GET_DEVICES;
    const NAME: &'static str = "GetDevices";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DevicesVariables {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevicesData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub devices: Vec<Device>,
}

/// One device with its tracks and most recent detections.
pub struct GetDevice;

impl GraphqlOperation for GetDevice {
    type Variables = DeviceVariables;
    type Data = DeviceData;

    const DOCUMENT: &'static str = GET_DEVICE;
    const NAME: &'static str = "GetDevice";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceVariables {
    pub device_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceData {
    #[serde(default)]
    pub device: Option<DeviceDetail>,
}

/// A device as returned by [`GetDevice`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDetail {
    #[serde(flatten)]
    pub device: Device,
    /// Track summaries; points are not included.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tracks: Vec<Track>,
    /// Up to ten latest detections.
    #[serde(default, deserialize_with = "null_as_default")]
    pub recent_detections: Vec<Detection>,
}

/// Tracks within a time window.
pub struct GetTracks;

impl GraphqlOperation for GetTracks {
    type Variables = TrackFilter;
    type Data = TracksData;

    const DOCUMENT: &'static str = GET_TRACKS;
    const NAME: &'static str = "GetTracks";
}

/// Variables of [`GetTracks`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub start_time: Option<OffsetDateTime>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub end_time: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl TrackFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Restrict to `[start, end]`.
    #[must_use]
    pub fn window(mut self, start: OffsetDateTime, end: OffsetDateTime) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TracksData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tracks: Vec<Track>,
}

/// Detections within a time window.
pub struct GetDetections;

impl GraphqlOperation for GetDetections {
    type Variables = DetectionQuery;
    type Data = DetectionsData;

    const DOCUMENT: &'static str = GET_DETECTIONS;
    const NAME: &'static str = "GetDetections";
}

/// Variables of [`GetDetections`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_type: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub start_time: Option<OffsetDateTime>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub end_time: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
}

impl DetectionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    #[must_use]
    pub fn detection_type(mut self, detection_type: impl Into<String>) -> Self {
        self.detection_type = Some(detection_type.into());
        self
    }

    /// Restrict to `[start, end]`.
    #[must_use]
    pub fn window(mut self, start: OffsetDateTime, end: OffsetDateTime) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = Some(min_confidence);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionsData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub detections: Vec<Detection>,
}

/// The `createEvent` mutation.
pub struct CreateEvent;

impl GraphqlOperation for CreateEvent {
    type Variables = CreateEventVariables;
    type Data = CreateEventData;

    const DOCUMENT: &'static str = CREATE_EVENT;
    const NAME: &'static str = "createEvent";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateEventVariables {
    pub input: EventInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateEventData {
    #[serde(default, rename = "createEvent")]
    pub create_event: Option<CreatedEvent>,
}
