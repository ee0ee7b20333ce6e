//! Row conversion for folders and notes.
//!
//! Column order must match [`FOLDER_SELECT`] and [`NOTE_SELECT`].

use crate::models::{Folder, FolderId, Note, NoteId, OwnerId};
use rusqlite::Row;

/// Projection used by every folder query.
pub(super) const FOLDER_SELECT: &str =
    "SELECT id, owner_id, label, parent_id, created_at FROM folders";

/// Projection used by every note query.
pub(super) const NOTE_SELECT: &str =
    "SELECT id, owner_id, text, folder_id, created_at FROM notes";

/// Builds a [`Folder`] from a row selected with [`FOLDER_SELECT`].
pub fn folder_from_row(row: &Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: FolderId::new(row.get(0)?),
        owner: OwnerId::new(row.get::<_, String>(1)?),
        label: row.get(2)?,
        parent: row.get::<_, Option<i64>>(3)?.map(FolderId::new),
        created_at: row.get(4)?,
    })
}

/// Builds a [`Note`] from a row selected with [`NOTE_SELECT`].
pub fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: NoteId::new(row.get(0)?),
        owner: OwnerId::new(row.get::<_, String>(1)?),
        text: row.get(2)?,
        folder: row.get::<_, Option<i64>>(3)?.map(FolderId::new),
        created_at: row.get(4)?,
    })
}
