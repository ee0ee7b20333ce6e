//! Business logic services.
//!
//! Services work against any [`crate::storage::TreeStore`] and provide the
//! path, matching and question-answering operations.

mod assistant;
pub mod location;
pub mod paths;
pub mod similarity;

pub use assistant::{Answer, Assistant, DEFAULT_AI_ANSWERS_FOLDER};
pub use location::{FolderMatch, LocationMatch, LocationMatcher, MatchSource};
pub use paths::{display_path, full_tree, path_of, path_string};
