//! Location matching.
//!
//! Resolves a query to the notes most likely relevant to it in two stages:
//!
//! 1. The candidate path (a hint proposed by the language model) is compared
//!    against the full path of every folder the owner has. The best folder is
//!    accepted when its similarity score is strictly above the threshold and
//!    it holds at least one note.
//! 2. Otherwise every owner note is searched for any keyword of the query,
//!    as a case-insensitive substring.
//!
//! An empty result means "nothing in the knowledge base", not an error.

use crate::config::MatcherConfig;
use crate::models::{Folder, Note, OwnerId};
use crate::services::paths::{PATH_SEPARATOR, all_paths};
use crate::services::similarity::ratio;
use crate::storage::TreeStore;
use crate::Result;
use std::collections::BTreeSet;
use tracing::instrument;

/// Where the notes of a [`LocationMatch`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    /// The best folder scored above the threshold and had notes.
    Folder,
    /// Keyword fallback found at least one note.
    Keyword,
    /// Neither stage produced notes.
    None,
}

impl MatchSource {
    /// Returns the lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Keyword => "keyword",
            Self::None => "none",
        }
    }
}

/// The best-scoring folder for a candidate path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderMatch {
    /// The folder.
    pub folder: Folder,
    /// Its full path string.
    pub path: String,
    /// Similarity between the candidate and `path`, 0–100.
    pub score: u8,
}

/// Result of [`LocationMatcher::locate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationMatch {
    /// Best-scoring folder, whether or not it was accepted.
    pub folder: Option<FolderMatch>,
    /// Matched notes in id order.
    pub notes: Vec<Note>,
    /// Which stage produced `notes`.
    pub source: MatchSource,
}

impl LocationMatch {
    /// Returns `true` if no notes matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Two-stage location matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationMatcher {
    threshold: u8,
}

impl Default for LocationMatcher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl LocationMatcher {
    /// Default acceptance threshold. A score must be strictly above it.
    pub const DEFAULT_THRESHOLD: u8 = 70;

    /// Creates a matcher with the given threshold (0–100).
    #[must_use]
    pub const fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    /// Creates a matcher from configuration.
    #[must_use]
    pub const fn from_config(config: &MatcherConfig) -> Self {
        Self::new(config.threshold)
    }

    /// Returns the acceptance threshold.
    #[must_use]
    pub const fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Finds the folder whose path is most similar to `candidate`.
    ///
    /// Folders are scanned in id order and only a strictly higher score
    /// replaces the current best, so the first folder reaching the maximum
    /// wins. Folders scoring 0 are never returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder hierarchy cannot be read.
    pub fn best_folder(
        &self,
        store: &dyn TreeStore,
        owner: &OwnerId,
        candidate: &str,
    ) -> Result<Option<FolderMatch>> {
        let candidate = normalize_candidate(candidate).to_lowercase();
        let mut best: Option<FolderMatch> = None;

        for (folder, path) in all_paths(store, owner)? {
            let score = ratio(&candidate, &path.to_lowercase());
            if score > best.as_ref().map_or(0, |current| current.score) {
                best = Some(FolderMatch { folder, path, score });
            }
        }

        Ok(best)
    }

    /// Resolves a candidate path and the original query text to notes.
    ///
    /// Keywords come from `query`; when it is blank the candidate path is
    /// used as the keyword source instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    #[instrument(skip(self, store), fields(owner = %owner, threshold = self.threshold))]
    pub fn locate(
        &self,
        store: &dyn TreeStore,
        owner: &OwnerId,
        candidate: &str,
        query: &str,
    ) -> Result<LocationMatch> {
        let best = self.best_folder(store, owner, candidate)?;

        if let Some(found) = best.as_ref().filter(|m| m.score > self.threshold) {
            let notes = store.list_notes(owner, found.folder.id)?;
            if !notes.is_empty() {
                return Ok(Self::finish(best, notes, MatchSource::Folder));
            }
            tracing::debug!(path = %found.path, "Matched folder has no notes, falling back to keywords");
        }

        let source_text = if query.trim().is_empty() {
            candidate.replace(PATH_SEPARATOR, " ")
        } else {
            query.to_string()
        };
        let notes = keyword_search(store, owner, &keywords(&source_text))?;
        let source = if notes.is_empty() {
            MatchSource::None
        } else {
            MatchSource::Keyword
        };
        Ok(Self::finish(best, notes, source))
    }

    fn finish(folder: Option<FolderMatch>, notes: Vec<Note>, source: MatchSource) -> LocationMatch {
        metrics::counter!("location_match_total", "source" => source.as_str()).increment(1);
        tracing::debug!(
            source = source.as_str(),
            score = folder.as_ref().map(|m| m.score),
            notes = notes.len(),
            "Location resolved"
        );
        LocationMatch {
            folder,
            notes,
            source,
        }
    }
}

/// Normalizes a candidate path: trims it, drops empty segments and joins the
/// rest with `/`. `" /Work//Projects/ "` becomes `"Work/Projects"`.
#[must_use]
pub fn normalize_candidate(candidate: &str) -> String {
    candidate
        .trim()
        .split(PATH_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR)
}

/// Splits lower-cased text on whitespace into a keyword set.
#[must_use]
pub fn keywords(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Returns every owner note whose lower-cased text contains any keyword.
///
/// # Errors
///
/// Returns an error if the notes cannot be read.
pub fn keyword_search(
    store: &dyn TreeStore,
    owner: &OwnerId,
    keywords: &BTreeSet<String>,
) -> Result<Vec<Note>> {
    if keywords.is_empty() {
        return Ok(Vec::new());
    }

    Ok(store
        .list_owner_notes(owner)?
        .into_iter()
        .filter(|note| {
            let text = note.text.to_lowercase();
            keywords.iter().any(|keyword| text.contains(keyword.as_str()))
        })
        .collect())
}
