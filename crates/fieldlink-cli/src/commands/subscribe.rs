//! Subscribe command - stream live detections.

use std::future::Future;

use anyhow::{Context, Result};
use fieldlink_core::SubscriptionClient;
use fieldlink_store::Store;
use fieldlink_types::{Detection, DetectionFilter};
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};

use crate::cli::SubscribeArgs;

/// Execute the subscribe command.
///
/// Runs until the server completes the subscription or `shutdown` resolves.
/// With a store, each detection is saved before the next message is read.
/// Returns the number of detections received.
pub async fn cmd_subscribe(
    client: &SubscriptionClient,
    store: Option<&Store>,
    args: &SubscribeArgs,
    shutdown: impl Future<Output = ()>,
) -> Result<usize> {
    let mut filter = DetectionFilter::new().min_confidence(args.min_confidence);
    if let Some(device) = &args.device {
        filter = filter.device(device.as_str());
    }
    if let Some(kind) = &args.detection_type {
        filter = filter.detection_type(kind.as_str());
    }

    info!(
        "Subscribing to detections (min confidence {:.2})...",
        args.min_confidence
    );
    let mut subscription = client
        .detections(&filter)
        .await
        .context("Failed to start subscription")?;

    tokio::pin!(shutdown);
    let mut received = 0;
    loop {
        let next = tokio::select! {
            item = subscription.next_item() => Some(item),
            () = &mut shutdown => None,
        };

        let item = match next {
            Some(item) => item,
            None => {
                info!("Interrupted, closing subscription");
                subscription.close().await;
                break;
            }
        };

        match item {
            Ok(Some(detection)) => {
                log_detection(&detection);
                if let Some(store) = store {
                    store
                        .save_detections(std::slice::from_ref(&detection))
                        .context("Failed to save detection")?;
                }
                received += 1;
            }
            Ok(None) => break,
            Err(fieldlink_core::Error::Decode(e)) => {
                warn!("Skipping undecodable detection: {}", e);
            }
            Err(e) => {
                subscription.close().await;
                return Err(e).context("Subscription failed");
            }
        }
    }

    info!("Subscription ended after {} detections", received);
    Ok(received)
}

fn log_detection(detection: &Detection) {
    info!(
        "Detection {:<16} conf={:.2} device={} time={}",
        detection.detection_type.as_deref().unwrap_or("-"),
        detection.confidence.unwrap_or_default(),
        detection.device_id.as_deref().unwrap_or("-"),
        detection
            .timestamp
            .and_then(|t| t.format(&Rfc3339).ok())
            .unwrap_or_else(|| "-".to_string()),
    );
}
