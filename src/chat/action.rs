//! Button actions and their callback-data encoding.
//!
//! Chat front ends attach a short string to every button and send it back
//! when the button is pressed. Optional folder ids encode as an empty suffix,
//! so `list_marker_` lists the root level.

use crate::models::FolderId;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Show a folder's children, or the root level.
    ListFolders(Option<FolderId>),
    /// Show a folder's notes.
    ListNotes(FolderId),
    /// Start creating a folder under the given parent.
    AddFolder(Option<FolderId>),
    /// Start creating a note in the given folder.
    AddNote(Option<FolderId>),
    /// Delete a folder and its subtree.
    DeleteFolder(FolderId),
    /// Start choosing a note of the folder to delete.
    DeleteNote(FolderId),
    /// Start choosing a note of the folder to edit.
    EditNote(FolderId),
    /// Save the last generated answer.
    SaveAiAnswer,
}

const LIST_FOLDERS: &str = "list_marker_";
const LIST_NOTES: &str = "list_notes_";
const ADD_FOLDER: &str = "add_marker_";
const ADD_NOTE: &str = "add_note_";
const DELETE_FOLDER: &str = "del_marker_";
const DELETE_NOTE: &str = "del_note_";
const EDIT_NOTE: &str = "edit_note_";
const SAVE_AI_ANSWER: &str = "save_ai_response";

impl Action {
    /// Encodes the action as callback data.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

fn optional(id: Option<FolderId>) -> String {
    id.map(|id| id.to_string()).unwrap_or_default()
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListFolders(id) => write!(f, "{LIST_FOLDERS}{}", optional(*id)),
            Self::ListNotes(id) => write!(f, "{LIST_NOTES}{id}"),
            Self::AddFolder(id) => write!(f, "{ADD_FOLDER}{}", optional(*id)),
            Self::AddNote(id) => write!(f, "{ADD_NOTE}{}", optional(*id)),
            Self::DeleteFolder(id) => write!(f, "{DELETE_FOLDER}{id}"),
            Self::DeleteNote(id) => write!(f, "{DELETE_NOTE}{id}"),
            Self::EditNote(id) => write!(f, "{EDIT_NOTE}{id}"),
            Self::SaveAiAnswer => f.write_str(SAVE_AI_ANSWER),
        }
    }
}

fn parse_optional(suffix: &str) -> Result<Option<FolderId>> {
    if suffix.is_empty() {
        Ok(None)
    } else {
        suffix.parse().map(Some)
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(data: &str) -> Result<Self> {
        let data = data.trim();
        if data == SAVE_AI_ANSWER {
            return Ok(Self::SaveAiAnswer);
        }

        if let Some(rest) = data.strip_prefix(LIST_FOLDERS) {
            return parse_optional(rest).map(Self::ListFolders);
        }
        if let Some(rest) = data.strip_prefix(LIST_NOTES) {
            return rest.parse().map(Self::ListNotes);
        }
        if let Some(rest) = data.strip_prefix(ADD_FOLDER) {
            return parse_optional(rest).map(Self::AddFolder);
        }
        if let Some(rest) = data.strip_prefix(ADD_NOTE) {
            return parse_optional(rest).map(Self::AddNote);
        }
        if let Some(rest) = data.strip_prefix(DELETE_FOLDER) {
            return rest.parse().map(Self::DeleteFolder);
        }
        if let Some(rest) = data.strip_prefix(DELETE_NOTE) {
            return rest.parse().map(Self::DeleteNote);
        }
        if let Some(rest) = data.strip_prefix(EDIT_NOTE) {
            return rest.parse().map(Self::EditNote);
        }

        Err(Error::InvalidInput(format!("unknown callback data '{data}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("list_marker_", Action::ListFolders(None) ; "root listing")]
    #[test_case("list_marker_12", Action::ListFolders(Some(FolderId::new(12))) ; "folder listing")]
    #[test_case("list_notes_3", Action::ListNotes(FolderId::new(3)) ; "notes")]
    #[test_case("add_marker_", Action::AddFolder(None) ; "add root folder")]
    #[test_case("add_note_5", Action::AddNote(Some(FolderId::new(5))) ; "add note")]
    #[test_case("del_marker_9", Action::DeleteFolder(FolderId::new(9)) ; "delete folder")]
    #[test_case("del_note_9", Action::DeleteNote(FolderId::new(9)) ; "delete note")]
    #[test_case("edit_note_4", Action::EditNote(FolderId::new(4)) ; "edit note")]
    #[test_case("save_ai_response", Action::SaveAiAnswer ; "save answer")]
    fn test_decode(data: &str, expected: Action) {
        assert_eq!(data.parse::<Action>().unwrap(), expected);
        assert_eq!(expected.encode(), data);
    }

    #[test_case("list_notes_" ; "missing required id")]
    #[test_case("del_marker_x" ; "non numeric id")]
    #[test_case("open_sesame" ; "unknown prefix")]
    fn test_decode_rejects(data: &str) {
        assert!(matches!(data.parse::<Action>(), Err(Error::InvalidInput(_))));
    }
}
