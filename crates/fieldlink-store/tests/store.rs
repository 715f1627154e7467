//! Store behavior against real SQLite databases.

use std::sync::Arc;
use std::thread;

use serde_json::{Value, json};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use fieldlink_store::Store;
use fieldlink_types::{Detection, Device, Location, Track, TrackPoint};

fn device(id: &str, name: &str) -> Device {
    Device {
        id: id.to_string(),
        name: Some(name.to_string()),
        device_type: Some("CAMERA".to_string()),
        status: Some("ONLINE".to_string()),
        location: Some(Location::new(40.7128, -74.006, 10.0)),
        last_seen: Some(datetime!(2025-09-09 10:00:00 UTC)),
        battery_level: Some(87.5),
        firmware_version: Some("1.4.2".to_string()),
        metadata: json!({"site": "north-gate"}),
        tags: vec!["perimeter".to_string()],
    }
}

fn detection(id: &str, device_id: &str, kind: &str, confidence: f64, at: OffsetDateTime) -> Detection {
    Detection {
        id: id.to_string(),
        device_id: Some(device_id.to_string()),
        timestamp: Some(at),
        detection_type: Some(kind.to_string()),
        confidence: Some(confidence),
        location: Some(Location::new(40.7, -74.0, 3.0)),
        bounding_box: None,
        metadata: Value::Null,
        associated_track: None,
    }
}

fn point(minute: u8, latitude: f64) -> TrackPoint {
    TrackPoint {
        timestamp: Some(datetime!(2025-09-09 10:00:00 UTC) + Duration::minutes(i64::from(minute))),
        location: Some(Location::new(latitude, -74.0, 0.0)),
        speed: Some(1.2),
        heading: Some(90.0),
    }
}

#[test]
fn test_refetching_devices_keeps_one_row_each() {
    let store = Store::open_in_memory().unwrap();
    let devices = vec![device("dev-1", "Gate camera"), device("dev-2", "Yard camera")];

    assert_eq!(store.save_devices(&devices).unwrap(), 2);
    let first = store.get_device("dev-1").unwrap().unwrap();

    assert_eq!(store.save_devices(&devices).unwrap(), 2);
    assert_eq!(store.count_devices().unwrap(), 2);

    let second = store.get_device("dev-1").unwrap().unwrap();
    assert_eq!(second.name, first.name);
    assert_eq!(second.location, first.location);
    assert_eq!(second.metadata, json!({"site": "north-gate"}));
    assert_eq!(second.tags, vec!["perimeter"]);
    assert_eq!(second.created_at, first.created_at);
}

#[test]
fn test_device_save_overwrites_every_column() {
    let store = Store::open_in_memory().unwrap();
    store.save_devices(&[device("dev-1", "Gate camera")]).unwrap();
    let original = store.get_device("dev-1").unwrap().unwrap();

    let mut updated = device("dev-1", "Gate camera (moved)");
    updated.status = Some("OFFLINE".to_string());
    updated.location = None;
    updated.battery_level = None;
    updated.metadata = Value::Null;
    updated.tags = Vec::new();
    store.save_devices(&[updated]).unwrap();

    let stored = store.get_device("dev-1").unwrap().unwrap();
    assert_eq!(stored.name.as_deref(), Some("Gate camera (moved)"));
    assert_eq!(stored.status.as_deref(), Some("OFFLINE"));
    assert_eq!(stored.location, Location::default());
    assert_eq!(stored.battery_level, None);
    assert_eq!(stored.metadata, json!({}));
    assert!(stored.tags.is_empty());
    assert_eq!(stored.created_at, original.created_at);
    assert!(stored.updated_at >= original.updated_at);
}

#[test]
fn test_missing_device_is_none() {
    let store = Store::open_in_memory().unwrap();
    assert!(store.get_device("nope").unwrap().is_none());
    assert!(store.get_detection("nope").unwrap().is_none());
}

#[test]
fn test_track_points_are_appended() {
    let store = Store::open_in_memory().unwrap();
    let track = Track {
        id: "trk-1".to_string(),
        device_id: Some("dev-1".to_string()),
        start_time: Some(datetime!(2025-09-09 10:00:00 UTC)),
        end_time: Some(datetime!(2025-09-09 10:02:00 UTC)),
        total_distance: Some(240.0),
        average_speed: Some(2.0),
        max_speed: Some(3.1),
        points: vec![point(0, 40.70), point(1, 40.71), point(2, 40.72)],
        metadata: Value::Null,
    };

    let saved = store.save_tracks(std::slice::from_ref(&track)).unwrap();
    assert_eq!(saved.tracks, 1);
    assert_eq!(saved.points, 3);
    assert_eq!(store.count_tracks().unwrap(), 1);
    assert_eq!(store.count_track_points(Some("trk-1")).unwrap(), 3);

    // The track row is overwritten, the points are stored again.
    store.save_tracks(&[track]).unwrap();
    assert_eq!(store.count_tracks().unwrap(), 1);
    assert_eq!(store.count_track_points(Some("trk-1")).unwrap(), 6);
    assert_eq!(store.count_track_points(Some("trk-2")).unwrap(), 0);
    assert_eq!(store.count_track_points(None).unwrap(), 6);
}

#[test]
fn test_detections_first_write_wins() {
    let store = Store::open_in_memory().unwrap();
    let now = OffsetDateTime::now_utc();

    let original = detection("det-1", "dev-1", "PERSON", 0.91, now);
    assert_eq!(store.save_detections(&[original]).unwrap(), 1);

    let mut changed = detection("det-1", "dev-1", "VEHICLE", 0.42, now);
    changed.device_id = Some("dev-9".to_string());
    let batch = vec![changed, detection("det-2", "dev-1", "PERSON", 0.8, now)];
    assert_eq!(store.save_detections(&batch).unwrap(), 1);

    assert_eq!(store.count_detections().unwrap(), 2);
    let stored = store.get_detection("det-1").unwrap().unwrap();
    assert_eq!(stored.detection_type.as_deref(), Some("PERSON"));
    assert_eq!(stored.confidence, Some(0.91));
    assert_eq!(stored.device_id.as_deref(), Some("dev-1"));
}

#[test]
fn test_detection_for_unknown_device_is_accepted() {
    let store = Store::open_in_memory().unwrap();
    let det = detection("det-1", "never-fetched", "PERSON", 0.9, OffsetDateTime::now_utc());
    assert_eq!(store.save_detections(&[det]).unwrap(), 1);
}

#[test]
fn test_recent_detection_analytics_groups_by_type_date_device() {
    let store = Store::open_in_memory().unwrap();
    let now = OffsetDateTime::now_utc();
    let yesterday = now - Duration::days(1);

    store
        .save_detections(&[
            detection("a", "dev-1", "PERSON", 0.8, now),
            detection("b", "dev-1", "PERSON", 0.9, now),
            detection("c", "dev-1", "VEHICLE", 0.7, now),
            detection("d", "dev-2", "PERSON", 0.6, now),
            detection("e", "dev-1", "PERSON", 0.5, yesterday),
            detection("old", "dev-1", "PERSON", 0.99, now - Duration::days(30)),
        ])
        .unwrap();

    let rows = store.recent_detection_analytics(7).unwrap();
    let today = now.date().to_string();
    let prior = yesterday.date().to_string();

    let keys: Vec<_> = rows
        .iter()
        .map(|r| {
            (
                r.date.clone().unwrap(),
                r.detection_type.clone().unwrap(),
                r.device_id.clone().unwrap(),
                r.detection_count,
            )
        })
        .collect();
    assert_eq!(
        keys,
        vec![
            (today.clone(), "PERSON".to_string(), "dev-1".to_string(), 2),
            (today.clone(), "PERSON".to_string(), "dev-2".to_string(), 1),
            (today, "VEHICLE".to_string(), "dev-1".to_string(), 1),
            (prior, "PERSON".to_string(), "dev-1".to_string(), 1),
        ]
    );

    let avg = rows[0].avg_confidence.unwrap();
    assert!((avg - 0.85).abs() < 1e-9, "avg was {avg}");
}

#[test]
fn test_recent_detection_analytics_empty_window() {
    let store = Store::open_in_memory().unwrap();
    let old = OffsetDateTime::now_utc() - Duration::days(10);
    store
        .save_detections(&[detection("a", "dev-1", "PERSON", 0.8, old)])
        .unwrap();

    assert!(store.recent_detection_analytics(7).unwrap().is_empty());
    assert_eq!(store.recent_detection_analytics(30).unwrap().len(), 1);
}

#[test]
fn test_detection_points_newest_first_with_coordinates() {
    let store = Store::open_in_memory().unwrap();
    let now = OffsetDateTime::now_utc();

    let mut no_coords = detection("blind", "dev-1", "PERSON", 0.9, now);
    no_coords.location = None;
    let mut half_coords = detection("half", "dev-1", "PERSON", 0.9, now);
    half_coords.location = Some(Location {
        latitude: Some(40.0),
        longitude: None,
        altitude: None,
    });

    store
        .save_detections(&[
            detection("p3", "dev-1", "PERSON", 0.7, now - Duration::hours(3)),
            detection("p1", "dev-1", "PERSON", 0.8, now - Duration::hours(1)),
            detection("p2", "dev-2", "VEHICLE", 0.9, now - Duration::hours(2)),
            no_coords,
            half_coords,
        ])
        .unwrap();

    let points = store.detection_points(2).unwrap();
    let ids: Vec<_> = points.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2"]);
    assert_eq!(points[0].latitude, 40.7);
    assert_eq!(points[0].longitude, -74.0);

    assert_eq!(store.detection_points(100).unwrap().len(), 3);
}

#[test]
fn test_reopen_persists_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("data.db");

    {
        let store = Store::open(&path).unwrap();
        store.save_devices(&[device("dev-1", "Gate camera")]).unwrap();
        store
            .save_detections(&[detection("det-1", "dev-1", "PERSON", 0.9, OffsetDateTime::now_utc())])
            .unwrap();
    }

    assert!(path.exists());
    let store = Store::open(&path).unwrap();
    assert_eq!(store.count_devices().unwrap(), 1);
    assert_eq!(store.count_detections().unwrap(), 1);
    assert_eq!(
        store.get_device("dev-1").unwrap().unwrap().name.as_deref(),
        Some("Gate camera")
    );
}

#[test]
fn test_store_shared_across_threads() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let now = OffsetDateTime::now_utc();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let batch: Vec<_> = (0..10)
                    .map(|i| detection(&format!("w{worker}-{i}"), "dev-1", "PERSON", 0.5, now))
                    .collect();
                store.save_detections(&batch).unwrap()
            })
        })
        .collect();

    let inserted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(inserted, 40);
    assert_eq!(store.count_detections().unwrap(), 40);
}
