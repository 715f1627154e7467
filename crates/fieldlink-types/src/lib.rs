//! Shared telemetry types for fieldlink.
//!
//! These are the records the remote GraphQL service hands out (devices,
//! tracks, detections, events) plus the detection filter used by live
//! subscriptions. They are used by the transport (`fieldlink-core`), the
//! local database (`fieldlink-store`) and the CLI alike.
//!
//! # Example
//!
//! ```
//! use fieldlink_types::{Detection, DetectionFilter};
//!
//! let detection: Detection = serde_json::from_str(r#"{"id": "det-1", "confidence": 0.9}"#)?;
//! assert_eq!(detection.confidence, Some(0.9));
//!
//! let filter = DetectionFilter::new().min_confidence(0.7);
//! assert_eq!(serde_json::to_string(&filter)?, r#"{"minConfidence":0.7}"#);
//! # Ok::<(), serde_json::Error>(())
//! ```

pub mod types;

pub use types::{
    BoundingBox, CreatedEvent, Detection, DetectionFilter, Device, EventInput, Location, Track,
    TrackPoint, TrackRef, lenient_timestamp, null_as_default, parse_timestamp,
};
