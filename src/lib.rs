//! # Znanium
//!
//! A personal knowledge-base chat assistant.
//!
//! Users keep notes in a per-user tree of folders and can either browse the
//! tree or ask natural-language questions. A question is resolved against the
//! stored notes first (an LLM proposes a folder path, which is fuzzy-matched
//! against the real folder paths, with a keyword search over notes as
//! fallback) and only then answered by the language model itself. Generated
//! answers can be saved back into the knowledge base.
//!
//! ## Layout
//!
//! - [`storage`]: the owner-scoped folder/note store (`SQLite` and in-memory)
//! - [`services`]: path resolution, similarity scoring, location matching and
//!   the question-answering flow
//! - [`llm`]: text-generation providers with timeout, retry and circuit breaking
//! - [`chat`]: the conversational state machine driven by a chat front end
//!
//! ## Example
//!
//! ```rust,ignore
//! use znanium::storage::{InMemoryTreeStore, TreeStore};
//! use znanium::services::LocationMatcher;
//! use znanium::OwnerId;
//!
//! let store = InMemoryTreeStore::new();
//! let owner = OwnerId::new("42");
//! let work = store.create_folder(&owner, "Work", None)?.unwrap();
//! store.create_note(&owner, Some(work.id), "Meeting at 3pm")?;
//!
//! let found = LocationMatcher::default().locate(&store, &owner, "Work", "meeting")?;
//! assert_eq!(found.notes.len(), 1);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod chat;
pub mod config;
pub mod llm;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::{LlmConfig, MatcherConfig, PromptTemplates, ZnaniumConfig};
pub use llm::LlmProvider;
pub use models::{Folder, FolderId, Note, NoteId, OwnerId};
pub use services::{Answer, Assistant, LocationMatch, LocationMatcher, MatchSource};
pub use storage::{InMemoryTreeStore, SqliteTreeStore, TreeStore};

/// Error type for znanium operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty labels or note text, malformed callback data, bad numbers |
/// | `NotFound` | A folder or note does not resolve for the calling owner |
/// | `CycleDetected` | A folder's ancestor chain loops back on itself |
/// | `OperationFailed` | `SQLite` or filesystem operations fail |
/// | `Upstream` | The text-generation service errors, times out or is unreachable |
///
/// Ownership violations are reported as `NotFound` (or as `None`/`false` by
/// the store), so callers can never tell another owner's data exists.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The referenced entity does not exist for this owner.
    #[error("not found: {0}")]
    NotFound(String),

    /// A folder appeared twice while walking up its parent chain.
    #[error("cycle detected in folder hierarchy at folder {0}")]
    CycleDetected(FolderId),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The text-generation service failed.
    ///
    /// `retryable` is set for timeouts, transport errors and 5xx responses.
    #[error("upstream '{provider}' failed: {cause}")]
    Upstream {
        /// Provider name (e.g. "openai").
        provider: String,
        /// The underlying cause.
        cause: String,
        /// Whether a retry may succeed.
        retryable: bool,
    },
}

impl Error {
    /// Returns `true` if retrying the failed call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream { retryable: true, .. })
    }
}

/// Result type alias for znanium operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// # Examples
///
/// ```rust
/// use znanium::current_timestamp;
///
/// assert!(current_timestamp() > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("empty label".to_string());
        assert_eq!(err.to_string(), "invalid input: empty label");

        let err = Error::OperationFailed {
            operation: "insert_folder".to_string(),
            cause: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'insert_folder' failed: disk full");

        let err = Error::CycleDetected(FolderId::new(7));
        assert_eq!(
            err.to_string(),
            "cycle detected in folder hierarchy at folder 7"
        );
    }

    #[test]
    fn test_retryable_only_for_flagged_upstream_errors() {
        let timeout = Error::Upstream {
            provider: "openai".to_string(),
            cause: "timed out".to_string(),
            retryable: true,
        };
        let rejected = Error::Upstream {
            provider: "openai".to_string(),
            cause: "401".to_string(),
            retryable: false,
        };
        assert!(timeout.is_retryable());
        assert!(!rejected.is_retryable());
        assert!(!Error::NotFound("folder 1".to_string()).is_retryable());
    }
}
