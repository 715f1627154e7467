//! Command-line client for fieldlink telemetry.
//!
//! Pulls devices, movement tracks and detections from a fieldlink GraphQL
//! service into a local SQLite database, streams live detections over a
//! WebSocket subscription and reports on what has been stored.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fetch` | Fetch devices, tracks and detections for a time window |
//! | `event` | Create a sample event |
//! | `subscribe` | Stream live detections, optionally storing them |
//! | `analytics` | Per-day detection summary or detection point list |
//!
//! # Configuration
//!
//! Settings are read from `~/.config/fieldlink/config.toml` (or platform
//! equivalent):
//!
//! ```toml
//! api_url = "https://fieldlink.example.com/graphql"
//! ws_url = "wss://fieldlink.example.com/graphql"
//! token_id = "..."
//! token_value = "..."
//! db = "/var/lib/fieldlink/data.db"
//! request_timeout_secs = 60
//! retries = 2
//! retry_backoff_ms = 600
//! ack_timeout_secs = 10
//! ```
//!
//! # Environment Variables
//!
//! - `FIELDLINK_API_URL`, `FIELDLINK_WS_URL`: endpoints
//! - `FIELDLINK_TOKEN_ID`, `FIELDLINK_TOKEN_VALUE`: API token
//! - `FIELDLINK_DB`: database path
//! - `FIELDLINK_CONFIG`: config file path
//! - `RUST_LOG`: log filter when neither `--verbose` nor `--quiet` is given
//!
//! Command-line flags override environment variables, which override the
//! config file.
//!
//! # Examples
//!
//! ```bash
//! fieldlink fetch --hours 48
//! fieldlink subscribe --min-confidence 0.8 --type PERSON --save
//! fieldlink analytics --days 7 --format csv --output detections.csv
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod format;

pub use fieldlink_core;
pub use fieldlink_store;
