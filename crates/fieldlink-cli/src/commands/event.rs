//! Event command - create a sample event.

use anyhow::{Context, Result};
use fieldlink_core::GraphqlClient;
use fieldlink_types::{CreatedEvent, EventInput, Location};
use serde_json::json;
use time::OffsetDateTime;
use tracing::info;

/// The demo event sent by `fieldlink event`.
pub fn sample_event(timestamp: OffsetDateTime) -> EventInput {
    EventInput {
        name: "Sample Detection Event".to_string(),
        event_type: "ANOMALY_DETECTED".to_string(),
        timestamp,
        device_id: "sample-device-id".to_string(),
        location: Some(Location::new(40.7128, -74.006, 10.0)),
        metadata: json!({
            "source": "demo",
            "confidence": 0.85,
            "note": "Created from CLI",
        }),
    }
}

/// Execute the event command.
pub async fn cmd_event(client: &GraphqlClient) -> Result<CreatedEvent> {
    let input = sample_event(OffsetDateTime::now_utc());
    let event = client
        .create_event(&input)
        .await
        .context("Event creation failed")?;

    info!(
        "Created event id={} type={}",
        event.id,
        event.event_type.as_deref().unwrap_or("-")
    );
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_sample_event_wire_shape() {
        let input = sample_event(datetime!(2025-09-09 10:00:00 UTC));
        let value = serde_json::to_value(&input).unwrap();

        assert_eq!(value["name"], "Sample Detection Event");
        assert_eq!(value["type"], "ANOMALY_DETECTED");
        assert_eq!(value["deviceId"], "sample-device-id");
        assert_eq!(value["timestamp"], "2025-09-09T10:00:00Z");
        assert_eq!(value["location"]["latitude"], 40.7128);
        assert_eq!(value["metadata"]["note"], "Created from CLI");
        assert_eq!(value["metadata"]["confidence"], 0.85);
    }
}
