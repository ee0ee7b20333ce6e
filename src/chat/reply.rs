//! Replies sent back to the chat front end.

use super::Action;
use std::fmt;

/// An inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Visible label.
    pub label: String,
    /// Action sent back when pressed.
    pub action: Action,
}

impl Button {
    /// Creates a button.
    #[must_use]
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Text plus rows of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Message text.
    pub text: String,
    /// Button rows, top to bottom.
    pub buttons: Vec<Vec<Button>>,
}

impl Reply {
    /// A reply without buttons.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    /// Appends a row of buttons. Empty rows are skipped.
    #[must_use]
    pub fn with_row(mut self, row: Vec<Button>) -> Self {
        if !row.is_empty() {
            self.buttons.push(row);
        }
        self
    }

    /// Returns every action offered by the buttons, in order.
    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        self.buttons.iter().flatten().map(|button| button.action)
    }
}

/// Renders the reply for a terminal: text, then one line per button row as
/// `[label](:callback)`.
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)?;
        for row in &self.buttons {
            f.write_str("\n")?;
            let rendered: Vec<String> = row
                .iter()
                .map(|button| format!("[{}](:{})", button.label, button.action))
                .collect();
            f.write_str(&rendered.join("  "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_renders_buttons() {
        let reply = Reply::text("/")
            .with_row(vec![Button::new("Work/", Action::ListFolders(None))])
            .with_row(Vec::new())
            .with_row(vec![
                Button::new("Add folder", Action::AddFolder(None)),
                Button::new("Save", Action::SaveAiAnswer),
            ]);

        assert_eq!(reply.buttons.len(), 2);
        assert_eq!(
            reply.to_string(),
            "/\n[Work/](:list_marker_)\n[Add folder](:add_marker_)  [Save](:save_ai_response)"
        );
    }
}
