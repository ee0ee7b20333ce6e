//! Conversation states.

use crate::models::{FolderId, NoteId};

/// What the conversation is waiting for next.
///
/// Text input is interpreted according to the current state; commands and
/// button actions are accepted in every state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatState {
    /// Nothing pending. Plain text is treated as a question.
    #[default]
    Idle,
    /// Next text is the label of a new folder under `parent`.
    AwaitingFolderLabel {
        /// Parent folder, `None` for a root folder.
        parent: Option<FolderId>,
    },
    /// Next text is a new note for `folder`.
    AwaitingNoteText {
        /// Target folder.
        folder: FolderId,
    },
    /// Next text is a question.
    AwaitingQuery,
    /// Next text is the 1-based number of the note to delete.
    AwaitingNoteDeletion {
        /// Folder whose notes are numbered.
        folder: FolderId,
    },
    /// Next text is the 1-based number of the note to edit.
    ChoosingNoteToEdit {
        /// Folder whose notes are numbered.
        folder: FolderId,
    },
    /// Next text replaces the text of `note`.
    EditingNoteText {
        /// Folder to show afterwards.
        folder: FolderId,
        /// Note being edited.
        note: NoteId,
    },
}

impl ChatState {
    /// Returns a stable name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingFolderLabel { .. } => "awaiting_folder_label",
            Self::AwaitingNoteText { .. } => "awaiting_note_text",
            Self::AwaitingQuery => "awaiting_query",
            Self::AwaitingNoteDeletion { .. } => "awaiting_note_deletion",
            Self::ChoosingNoteToEdit { .. } => "choosing_note_to_edit",
            Self::EditingNoteText { .. } => "editing_note_text",
        }
    }
}
