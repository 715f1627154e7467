//! Fetch command - pull devices, tracks and detections into the store.

use anyhow::{Context, Result};
use fieldlink_core::{DetectionQuery, GraphqlClient, TrackFilter};
use fieldlink_store::Store;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

const DEVICE_LIMIT: u32 = 100;
const TRACK_LIMIT: u32 = 100;
const DETECTION_LIMIT: u32 = 1000;
const DETECTION_MIN_CONFIDENCE: f64 = 0.5;

/// Rows written by one fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub devices: usize,
    pub tracks: usize,
    pub points: usize,
    /// Detections returned by the server.
    pub detections: usize,
    /// Detections not already stored.
    pub new_detections: usize,
}

/// Execute the fetch command.
///
/// GraphQL errors in a response are logged by the client; whatever valid
/// records came back are still stored.
pub async fn cmd_fetch(client: &GraphqlClient, store: &Store, hours: u32) -> Result<FetchSummary> {
    let end = OffsetDateTime::now_utc();
    let start = window_start(end, hours);
    let mut summary = FetchSummary::default();

    info!("Introspecting schema...");
    let schema = client
        .introspect()
        .await
        .context("Schema introspection failed")?;
    debug!(
        "Schema exposes {} types",
        schema.value.schema.map(|s| s.types.len()).unwrap_or_default()
    );

    info!("Loading devices...");
    let devices = client
        .devices(DEVICE_LIMIT, 0)
        .await
        .context("Failed to load devices")?;
    summary.devices = store
        .save_devices(&devices.value)
        .context("Failed to save devices")?;
    info!("Saved {} devices", summary.devices);

    info!("Loading tracks ({}h)...", hours);
    let filter = TrackFilter::new().window(start, end).limit(TRACK_LIMIT);
    let tracks = client
        .tracks(&filter)
        .await
        .context("Failed to load tracks")?;
    let saved = store
        .save_tracks(&tracks.value)
        .context("Failed to save tracks")?;
    summary.tracks = saved.tracks;
    summary.points = saved.points;
    info!("Saved {} tracks ({} points)", saved.tracks, saved.points);

    info!("Loading detections ({}h)...", hours);
    let query = DetectionQuery::new()
        .window(start, end)
        .limit(DETECTION_LIMIT)
        .min_confidence(DETECTION_MIN_CONFIDENCE);
    let detections = client
        .detections(&query)
        .await
        .context("Failed to load detections")?;
    summary.detections = detections.value.len();
    summary.new_detections = store
        .save_detections(&detections.value)
        .context("Failed to save detections")?;
    info!(
        "Saved {} detections ({} new)",
        summary.detections, summary.new_detections
    );

    Ok(summary)
}

/// Start of a window reaching `hours` back from `end`, no earlier than 1970.
fn window_start(end: OffsetDateTime, hours: u32) -> OffsetDateTime {
    end.checked_sub(Duration::hours(i64::from(hours)))
        .map_or(OffsetDateTime::UNIX_EPOCH, |t| t.max(OffsetDateTime::UNIX_EPOCH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_window_start() {
        let end = datetime!(2025-09-09 10:00:00 UTC);
        assert_eq!(window_start(end, 24), datetime!(2025-09-08 10:00:00 UTC));
        assert_eq!(window_start(end, 0), end);
        assert_eq!(window_start(end, u32::MAX), OffsetDateTime::UNIX_EPOCH);
    }
}
