//! Inputs to the conversation.

use super::Action;
use crate::Result;

/// Slash commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/start`: greet and reset the conversation.
    Start,
    /// `/search`: ask a question.
    Search,
}

/// One event delivered by the chat front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A slash command.
    Command(Command),
    /// A plain text message.
    Text(String),
    /// A button press.
    Action(Action),
}

/// Parses a line typed into the line-based front end.
///
/// `/start` and `/search` are commands, a leading `:` marks callback data
/// (`:list_marker_`), anything else is text.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidInput`] for malformed callback data.
pub fn parse_line(line: &str) -> Result<Input> {
    let trimmed = line.trim();
    match trimmed {
        "/start" => Ok(Input::Command(Command::Start)),
        "/search" => Ok(Input::Command(Command::Search)),
        _ => match trimmed.strip_prefix(':') {
            Some(data) => data.parse().map(Input::Action),
            None => Ok(Input::Text(trimmed.to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FolderId;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("/start").unwrap(), Input::Command(Command::Start));
        assert_eq!(parse_line(" /search ").unwrap(), Input::Command(Command::Search));
        assert_eq!(
            parse_line(":list_marker_4").unwrap(),
            Input::Action(Action::ListFolders(Some(FolderId::new(4))))
        );
        assert_eq!(parse_line("hello").unwrap(), Input::Text("hello".to_string()));
        assert!(parse_line(":bogus").is_err());
    }
}
