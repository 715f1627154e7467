//! Local persistence for fieldlink devices, tracks and detections.
//!
//! A single SQLite file holds everything fetched from the platform. Saves
//! are idempotent where the data allows it:
//!
//! - devices and tracks are overwritten with the latest fetch
//! - detections are written once; a second save of the same id is ignored
//! - track points are appended on every save
//!
//! # Example
//!
//! ```no_run
//! use fieldlink_store::Store;
//!
//! let store = Store::open_default()?;
//! for row in store.recent_detection_analytics(7)? {
//!     println!("{:?} {:?}: {}", row.date, row.detection_type, row.detection_count);
//! }
//! # Ok::<(), fieldlink_store::Error>(())
//! ```

mod error;
mod models;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::{DetectionAnalytics, DetectionPoint, SavedTracks, StoredDetection, StoredDevice};
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/fieldlink/data.db`
/// - macOS: `~/Library/Application Support/fieldlink/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\fieldlink\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("fieldlink")
        .join("data.db")
}
