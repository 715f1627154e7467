//! Command implementations for the CLI.

mod analytics;
mod event;
mod fetch;
mod subscribe;

pub use analytics::cmd_analytics;
pub use event::{cmd_event, sample_event};
pub use fetch::{FetchSummary, cmd_fetch};
pub use subscribe::cmd_subscribe;
