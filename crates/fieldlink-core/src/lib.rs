//! Resilient GraphQL transport for fieldlink telemetry.
//!
//! This crate talks to the remote GraphQL service over two transports:
//!
//! - **HTTP** ([`GraphqlClient`]): queries and mutations, POSTed as JSON with
//!   the `x-token-id`/`x-token-value` credential headers. Transient failures
//!   are retried with exponential backoff ([`RetryConfig`]); GraphQL error
//!   lists are handed back to the caller alongside whatever data arrived.
//! - **WebSocket** ([`SubscriptionClient`]): live results over the
//!   `graphql-transport-ws` protocol, consumed as a lazy sequence
//!   ([`Subscription`]).
//!
//! The crate only emits `tracing` events; installing a subscriber is up to
//! the application.
//!
//! # Quick Start
//!
//! ```no_run
//! use fieldlink_core::{ClientConfig, DetectionQuery, GraphqlClient};
//! use time::{Duration, OffsetDateTime};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new(
//!         "https://api.example.com/graphql",
//!         "wss://api.example.com/graphql",
//!     )
//!     .with_tokens("token-id", "token-value");
//!     let client = GraphqlClient::new(&config)?;
//!
//!     let end = OffsetDateTime::now_utc();
//!     let query = DetectionQuery::new()
//!         .window(end - Duration::hours(24), end)
//!         .limit(1000)
//!         .min_confidence(0.5);
//!     let detections = client.detections(&query).await?;
//!     println!("Fetched {} detections", detections.value.len());
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod operations;
pub mod retry;
pub mod subscription;

pub use client::GraphqlClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use operations::{
    DetectionQuery, DeviceDetail, GraphqlError, GraphqlOperation, GraphqlResponse, QueryResult,
    TrackFilter,
};
pub use retry::{RetryConfig, with_retry};
pub use subscription::{Subscription, SubscriptionClient, SubscriptionState};

// Re-export the shared types so callers need only one dependency.
pub use fieldlink_types;
