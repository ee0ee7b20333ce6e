//! `SQLite` tree store.
//!
//! - [`connection`]: mutex acquisition and connection pragmas
//! - [`rows`]: row-to-record conversion for folders and notes
//! - [`metrics`]: per-operation counters and latency histograms
//! - `store`: the [`SqliteTreeStore`] itself

mod connection;
mod metrics;
mod rows;
mod store;

pub use connection::{acquire_lock, configure_connection};
pub use metrics::record_operation_metrics;
pub use rows::{folder_from_row, note_from_row};
pub use store::SqliteTreeStore;

use crate::Error;

/// Maps a `rusqlite` error into [`Error::OperationFailed`] for `operation`.
pub(crate) fn db_error(operation: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}
