//! Storage layer for the folder/note tree.
//!
//! - **`SQLite`**: durable store, one transaction per operation
//! - **In-memory**: arena keyed by id, for tests and ephemeral sessions
//!
//! Both implement [`TreeStore`], and every method is scoped by owner.

// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::InMemoryTreeStore;
pub use sqlite::SqliteTreeStore;
pub use traits::TreeStore;

use crate::config::ZnaniumConfig;
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Opens the store described by the configuration.
///
/// Uses the configured database path when set, otherwise `knowledge.db`
/// inside the data directory (created on demand).
pub fn open_store(config: &ZnaniumConfig) -> Result<Arc<dyn TreeStore>> {
    let path = database_path(config);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| crate::Error::OperationFailed {
            operation: "create_data_dir".to_string(),
            cause: format!("{}: {e}", parent.display()),
        })?;
    }
    tracing::debug!(path = %path.display(), "Opening SQLite tree store");
    Ok(Arc::new(SqliteTreeStore::new(path)?))
}

/// Resolves the database file path from configuration.
#[must_use]
pub fn database_path(config: &ZnaniumConfig) -> PathBuf {
    config
        .database_path
        .clone()
        .unwrap_or_else(|| config.data_dir.join("knowledge.db"))
}
