//! Note types and identifiers.

use super::{FolderId, OwnerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Store-assigned identifier of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(i64);

impl NoteId {
    /// Wraps a raw row id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw row id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for NoteId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for NoteId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| crate::Error::InvalidInput(format!("not a note id: '{s}'")))
    }
}

/// A leaf text record in the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier.
    pub id: NoteId,
    /// The owner of this note.
    pub owner: OwnerId,
    /// The note content.
    pub text: String,
    /// Folder holding the note. `None` means orphaned: unreachable by browsing.
    pub folder: Option<FolderId>,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: i64,
}

impl Note {
    /// Returns at most `max_chars` characters of the text, with an ellipsis
    /// appended when the text was cut.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.text.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(text: &str) -> Note {
        Note {
            id: NoteId::new(1),
            owner: OwnerId::new("u"),
            text: text.to_string(),
            folder: None,
            created_at: 0,
        }
    }

    #[test]
    fn test_preview_short_text_untouched() {
        assert_eq!(note("short").preview(30), "short");
    }

    #[test]
    fn test_preview_cuts_on_char_boundary() {
        assert_eq!(note("Привет мир").preview(6), "Привет...");
    }
}
