//! Storage backend traits.

mod tree;

pub use tree::TreeStore;
pub(crate) use tree::require_text;
