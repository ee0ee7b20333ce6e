//! Question answering over the knowledge base.
//!
//! A question goes through up to three text-generation calls:
//!
//! 1. `ask_file_location`: the model sees the rendered folder tree and
//!    proposes a folder path.
//! 2. The [`LocationMatcher`] resolves that hint to notes. When notes are
//!    found, `read_file` asks the model to answer from them.
//! 3. Otherwise `generate_answer` asks the model directly. Such an answer can
//!    then be saved with [`Assistant::save_generated_answer`].
//!
//! Upstream failures never escape as errors from [`Assistant::ask`]: they
//! are logged and surface as [`Answer::Unavailable`].

use crate::config::{PromptTemplates, ZnaniumConfig};
use crate::llm::LlmProvider;
use crate::models::{Folder, FolderId, Note, OwnerId};
use crate::services::location::{LocationMatch, LocationMatcher};
use crate::services::paths::full_tree;
use crate::storage::TreeStore;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::instrument;

/// Default root folder for saved answers.
pub const DEFAULT_AI_ANSWERS_FOLDER: &str = "AI answers";

/// Outcome of [`Assistant::ask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Answered from stored notes.
    FromKnowledgeBase {
        /// The answer text.
        text: String,
        /// The notes the answer was built from.
        matched: LocationMatch,
    },
    /// Nothing relevant was stored; the model answered on its own.
    Generated {
        /// The answer text.
        text: String,
    },
    /// The text-generation service failed or returned nothing.
    Unavailable,
}

impl Answer {
    /// Returns the answer text, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::FromKnowledgeBase { text, .. } | Self::Generated { text } => Some(text),
            Self::Unavailable => None,
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::FromKnowledgeBase { .. } => "knowledge_base",
            Self::Generated { .. } => "generated",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Question-answering service.
pub struct Assistant {
    store: Arc<dyn TreeStore>,
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<PromptTemplates>,
    matcher: LocationMatcher,
    ai_answers_folder: String,
}

impl Assistant {
    /// Creates an assistant with default matcher and answers folder.
    #[must_use]
    pub fn new(
        store: Arc<dyn TreeStore>,
        llm: Arc<dyn LlmProvider>,
        prompts: Arc<PromptTemplates>,
    ) -> Self {
        Self {
            store,
            llm,
            prompts,
            matcher: LocationMatcher::default(),
            ai_answers_folder: DEFAULT_AI_ANSWERS_FOLDER.to_string(),
        }
    }

    /// Creates an assistant from loaded configuration.
    #[must_use]
    pub fn from_config(
        store: Arc<dyn TreeStore>,
        llm: Arc<dyn LlmProvider>,
        config: &ZnaniumConfig,
    ) -> Self {
        Self::new(store, llm, Arc::new(config.prompts.clone()))
            .with_matcher(LocationMatcher::from_config(&config.matcher))
            .with_ai_answers_folder(config.ai_answers_folder.clone())
    }

    /// Sets the location matcher.
    #[must_use]
    pub const fn with_matcher(mut self, matcher: LocationMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Sets the root folder label for saved answers.
    #[must_use]
    pub fn with_ai_answers_folder(mut self, label: impl Into<String>) -> Self {
        self.ai_answers_folder = label.into();
        self
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &dyn TreeStore {
        self.store.as_ref()
    }

    /// Returns the location matcher.
    #[must_use]
    pub const fn matcher(&self) -> &LocationMatcher {
        &self.matcher
    }

    /// Asks the model which folder `query` belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be read or the model call fails.
    pub fn suggest_location(&self, owner: &OwnerId, query: &str) -> Result<String> {
        let tree = full_tree(self.store.as_ref(), owner)?;
        let prompt = self.prompts.ask_file_location(query, &tree);
        let response = self.generate(&prompt)?;
        Ok(clean_candidate(&response))
    }

    /// Resolves `query` to notes. A failed location hint degrades to an
    /// empty candidate, which leaves only the keyword search.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn locate(&self, owner: &OwnerId, query: &str) -> Result<LocationMatch> {
        let candidate = match self.suggest_location(owner, query) {
            Ok(candidate) => candidate,
            Err(e @ Error::Upstream { .. }) => {
                tracing::warn!(error = %e, "Location hint unavailable, using keywords only");
                String::new()
            },
            Err(e) => return Err(e),
        };
        tracing::debug!(candidate = %candidate, "Location hint");
        self.matcher
            .locate(self.store.as_ref(), owner, &candidate, query)
    }

    /// Answers a question.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank query, or a storage error.
    /// Upstream failures are reported as [`Answer::Unavailable`].
    #[instrument(skip(self, query), fields(owner = %owner, answer = tracing::field::Empty))]
    pub fn ask(&self, owner: &OwnerId, query: &str) -> Result<Answer> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("question cannot be empty".to_string()));
        }

        let has_notes = !self.store.list_owner_notes(owner)?.is_empty();
        let matched = if has_notes {
            Some(self.locate(owner, query)?)
        } else {
            None
        };

        let answer = match matched.filter(|m| !m.is_empty()) {
            Some(matched) => self.answer_from_notes(query, matched),
            None => self.answer_generated(query),
        };

        tracing::Span::current().record("answer", answer.kind());
        metrics::counter!("assistant_answers_total", "kind" => answer.kind()).increment(1);
        Ok(answer)
    }

    fn answer_from_notes(&self, query: &str, matched: LocationMatch) -> Answer {
        let notes = join_notes(&matched.notes);
        let prompt = self.prompts.read_file(query, &notes);
        let text = match self.generate(&prompt) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => notes,
            Err(e) => {
                tracing::warn!(error = %e, "Summary unavailable, returning matched notes");
                notes
            },
        };
        Answer::FromKnowledgeBase { text, matched }
    }

    fn answer_generated(&self, query: &str) -> Answer {
        let prompt = self.prompts.generate_answer(query);
        match self.generate(&prompt) {
            Ok(text) if !text.trim().is_empty() => Answer::Generated {
                text: text.trim().to_string(),
            },
            Ok(_) => {
                tracing::warn!("Model returned an empty answer");
                Answer::Unavailable
            },
            Err(e) => {
                tracing::warn!(error = %e, "Answer generation failed");
                Answer::Unavailable
            },
        }
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        self.llm
            .complete_with_system(&self.prompts.start_prompt, prompt)
    }

    /// Saves a generated answer under the answers root folder, creating the
    /// folder on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for blank text, or a storage error.
    #[instrument(skip(self, text), fields(owner = %owner))]
    pub fn save_generated_answer(&self, owner: &OwnerId, text: &str) -> Result<(Folder, Note)> {
        let folder = match self.store.find_root_by_label(owner, &self.ai_answers_folder)? {
            Some(folder) => folder,
            None => self
                .store
                .create_folder(owner, &self.ai_answers_folder, None)?
                .ok_or_else(|| Error::OperationFailed {
                    operation: "create_answers_folder".to_string(),
                    cause: "root folder was rejected".to_string(),
                })?,
        };

        let note = self
            .store
            .create_note(owner, Some(folder.id), text)?
            .ok_or_else(|| Error::NotFound(format!("folder {}", folder.id)))?;
        Ok((folder, note))
    }

    /// Returns the text of every note in `folder`, one per line.
    ///
    /// # Errors
    ///
    /// Returns an error if the notes cannot be read.
    pub fn read_notes(&self, owner: &OwnerId, folder: FolderId) -> Result<String> {
        Ok(join_notes(&self.store.list_notes(owner, folder)?))
    }
}

fn join_notes(notes: &[Note]) -> String {
    notes
        .iter()
        .map(|note| note.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reduces a model reply to a bare path: the first non-empty line without
/// surrounding quotes or backticks.
fn clean_candidate(response: &str) -> String {
    response
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}
