//! Data models for znanium.
//!
//! Folders and notes form a forest per owner. Every record carries its
//! owner so the store can filter on it.

mod folder;
mod note;
mod owner;

pub use folder::{Folder, FolderId};
pub use note::{Note, NoteId};
pub use owner::OwnerId;
