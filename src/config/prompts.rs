//! Prompt templates for the text-generation calls.
//!
//! Templates use positional placeholders: `{}` takes the next argument,
//! `{0}`, `{1}` take an argument by index, and `{{` / `}}` are literal braces.
//! A `prompts.json` file with the keys `start_prompt`, `ask_file_location`,
//! `read_file` and `generate_answer` overrides the built-in defaults; missing
//! keys keep their default.

use crate::{Error, Result};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

/// Escaped braces, `{}` or `{N}`.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{|\}\}|\{(\d*)\}").unwrap_or_else(|_| unreachable!()));

const DEFAULT_START_PROMPT: &str = "You are a helpful assistant for a personal \
knowledge base. Answer briefly and in the language of the question.";

const DEFAULT_ASK_FILE_LOCATION: &str = "The user asked: \"{}\"\n\n\
Their knowledge base is organized into these folders:\n{}\n\
Reply with only the slash-separated path of the folder most likely to hold \
the answer, for example Work/Projects. Reply with an empty line if no folder fits.";

const DEFAULT_READ_FILE: &str = "Answer the question \"{}\" using only the \
notes below. If they do not contain the answer, say so.\n\nNotes:\n{}";

const DEFAULT_GENERATE_ANSWER: &str = "Answer the question: {}";

/// Prompt templates loaded once at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplates {
    /// System message for every request.
    pub start_prompt: String,
    /// Asks for a folder path; arguments: query, rendered tree.
    pub ask_file_location: String,
    /// Summarizes matched notes; arguments: query, notes.
    pub read_file: String,
    /// Answers without the knowledge base; argument: query.
    pub generate_answer: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            start_prompt: DEFAULT_START_PROMPT.to_string(),
            ask_file_location: DEFAULT_ASK_FILE_LOCATION.to_string(),
            read_file: DEFAULT_READ_FILE.to_string(),
            generate_answer: DEFAULT_GENERATE_ANSWER.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Loads templates from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load_from_json(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_prompts_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        serde_json::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_prompts_file".to_string(),
            cause: e.to_string(),
        })
    }

    /// Prompt asking which folder a query belongs to.
    #[must_use]
    pub fn ask_file_location(&self, query: &str, tree: &str) -> String {
        render_template(&self.ask_file_location, &[query, tree])
    }

    /// Prompt summarizing matched notes for a query.
    #[must_use]
    pub fn read_file(&self, query: &str, notes: &str) -> String {
        render_template(&self.read_file, &[query, notes])
    }

    /// Prompt answering a query without the knowledge base.
    #[must_use]
    pub fn generate_answer(&self, query: &str) -> String {
        render_template(&self.generate_answer, &[query])
    }
}

/// Substitutes positional placeholders in `template`.
///
/// Placeholders referring past the end of `args`, and unterminated braces,
/// are kept verbatim.
#[must_use]
pub fn render_template(template: &str, args: &[&str]) -> String {
    let mut next_auto = 0;
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let whole = &caps[0];
            let index = match whole {
                "{{" => return "{".to_string(),
                "}}" => return "}".to_string(),
                "{}" => {
                    let index = next_auto;
                    next_auto += 1;
                    Some(index)
                },
                _ => caps[1].parse::<usize>().ok(),
            };
            index
                .and_then(|i| args.get(i))
                .map_or_else(|| whole.to_string(), |arg| (*arg).to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Q: {}", &["why"], "Q: why" ; "auto")]
    #[test_case("{} and {}", &["a", "b"], "a and b" ; "two auto")]
    #[test_case("{1} before {0}", &["a", "b"], "b before a" ; "indexed")]
    #[test_case("{{literal}} {}", &["x"], "{literal} x" ; "escaped")]
    #[test_case("{} {}", &["only"], "only {}" ; "missing argument kept")]
    #[test_case("{name}", &["x"], "{name}" ; "named kept")]
    #[test_case("open { brace", &[], "open { brace" ; "unterminated")]
    #[test_case("Вопрос: {}", &["почему"], "Вопрос: почему" ; "non ascii")]
    #[test_case("{} {7} {}", &["a", "b"], "a {7} b" ; "out of range index kept")]
    #[test_case("{{}} {0}{0}", &["x"], "{} xx" ; "escaped empty and repeated index")]
    fn test_render_template(template: &str, args: &[&str], expected: &str) {
        assert_eq!(render_template(template, args), expected);
    }

    #[test]
    fn test_default_templates_use_arguments() {
        let prompts = PromptTemplates::default();
        let prompt = prompts.ask_file_location("where is my meeting", "  Work/\n    Meetings\n");
        assert!(prompt.contains("where is my meeting"));
        assert!(prompt.contains("    Meetings"));
        assert!(!prompt.contains("{}"));

        assert!(prompts.read_file("q", "note one").contains("note one"));
        assert_eq!(prompts.generate_answer("why"), "Answer the question: why");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let prompts: PromptTemplates =
            serde_json::from_str(r#"{"start_prompt": "Be terse."}"#).unwrap();
        assert_eq!(prompts.start_prompt, "Be terse.");
        assert_eq!(prompts.read_file, PromptTemplates::default().read_file);
    }
}
