//! Tree store trait.

use crate::models::{Folder, FolderId, Note, NoteId, OwnerId};
use crate::Result;

/// Persistent hierarchy of folders and notes, scoped per owner.
///
/// Every method takes the calling owner. A reference to an entity the owner
/// does not own behaves exactly like a reference to a missing entity:
/// `None`, `false` or an empty list, never an error and never the entity.
///
/// Listing methods return records in ascending id order, which is creation
/// order. Callers rely on that for positional selection and for stable
/// tie-breaking in location matching.
pub trait TreeStore: Send + Sync {
    /// Creates a folder under `parent`, or at the root level when `None`.
    ///
    /// Returns `Ok(None)` if `parent` is not a folder owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for a blank label.
    fn create_folder(
        &self,
        owner: &OwnerId,
        label: &str,
        parent: Option<FolderId>,
    ) -> Result<Option<Folder>>;

    /// Deletes a folder, all descendant folders and every note in that subtree.
    ///
    /// Returns `false` if the folder is not owned by `owner`.
    fn delete_folder(&self, owner: &OwnerId, folder: FolderId) -> Result<bool>;

    /// Creates a note in `folder` (or orphaned when `None`).
    ///
    /// Returns `Ok(None)` if `folder` is not owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for blank text.
    fn create_note(
        &self,
        owner: &OwnerId,
        folder: Option<FolderId>,
        text: &str,
    ) -> Result<Option<Note>>;

    /// Deletes a note. Returns `false` if it is not owned by `owner`.
    fn delete_note(&self, owner: &OwnerId, note: NoteId) -> Result<bool>;

    /// Replaces a note's text. Returns `false` if it is not owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for blank text.
    fn update_note_text(&self, owner: &OwnerId, note: NoteId, text: &str) -> Result<bool>;

    /// Lists the direct children of `folder`, or the root folders when `None`.
    fn list_children(&self, owner: &OwnerId, folder: Option<FolderId>) -> Result<Vec<Folder>>;

    /// Lists the notes attached to `folder`.
    fn list_notes(&self, owner: &OwnerId, folder: FolderId) -> Result<Vec<Note>>;

    /// Fetches a single folder.
    fn get_folder(&self, owner: &OwnerId, folder: FolderId) -> Result<Option<Folder>>;

    /// Fetches a single note.
    fn get_note(&self, owner: &OwnerId, note: NoteId) -> Result<Option<Note>>;

    /// Lists every folder the owner has.
    fn list_folders(&self, owner: &OwnerId) -> Result<Vec<Folder>>;

    /// Lists every note the owner has, orphaned ones included.
    fn list_owner_notes(&self, owner: &OwnerId) -> Result<Vec<Note>>;

    /// Returns the parent of `folder`.
    ///
    /// `None` both for a root folder and for a folder the owner cannot see.
    fn parent_of(&self, owner: &OwnerId, folder: FolderId) -> Result<Option<FolderId>> {
        Ok(self
            .get_folder(owner, folder)?
            .and_then(|found| found.parent))
    }

    /// Finds the first root folder with exactly this label.
    fn find_root_by_label(&self, owner: &OwnerId, label: &str) -> Result<Option<Folder>> {
        Ok(self
            .list_children(owner, None)?
            .into_iter()
            .find(|folder| folder.label == label))
    }

    /// Deletes the note at `position` (zero-based) in the folder's note list.
    ///
    /// Returns `false` if the position is out of range or the folder is not
    /// owned by `owner`.
    fn delete_note_at(&self, owner: &OwnerId, folder: FolderId, position: usize) -> Result<bool> {
        match self.list_notes(owner, folder)?.get(position) {
            Some(note) => self.delete_note(owner, note.id),
            None => Ok(false),
        }
    }
}

/// Rejects blank labels and note text.
pub(crate) fn require_text(kind: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(crate::Error::InvalidInput(format!("{kind} cannot be empty")));
    }
    Ok(())
}
