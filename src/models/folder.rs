//! Folder types and identifiers.

use super::OwnerId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Store-assigned identifier of a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(i64);

impl FolderId {
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

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for FolderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for FolderId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| crate::Error::InvalidInput(format!("not a folder id: '{s}'")))
    }
}

/// A named node in an owner's folder hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Unique identifier.
    pub id: FolderId,
    /// The owner of this folder.
    pub owner: OwnerId,
    /// Display label, one path segment.
    pub label: String,
    /// Parent folder, `None` for a root.
    pub parent: Option<FolderId>,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: i64,
}

impl Folder {
    /// Returns `true` if this folder sits at the top of the hierarchy.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
