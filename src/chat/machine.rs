//! The conversation state machine.

use super::{Action, Button, ChatState, Command, Input, Reply, Session, SessionStore};
use crate::models::{FolderId, NoteId, OwnerId};
use crate::services::{Answer, Assistant, display_path};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::instrument;

const GREETING: &str = "Hi! I keep your notes in folders and answer questions about them.\n\
Browse your folders or ask a question.";
const ASK_QUESTION: &str = "What would you like to know?";
const ASK_FOLDER_LABEL: &str = "Enter a name for the new folder:";
const ASK_NOTE_TEXT: &str = "Enter the note text:";
const ASK_NEW_NOTE_TEXT: &str = "Enter the new text for the note:";
const ASK_NOTE_TO_DELETE: &str = "Enter the number of the note to delete:";
const ASK_NOTE_TO_EDIT: &str = "Enter the number of the note to edit:";
const NOT_A_NUMBER: &str = "Please enter a number.";
const INVALID_NUMBER: &str = "There is no note with that number.";
const FOLDER_NOT_FOUND: &str = "Folder not found.";
const NOTE_NOT_FOUND: &str = "Note not found.";
const NO_NOTES: &str = "No notes yet.";
const ROOT_NOTE_REJECTED: &str = "Notes can only be added inside a folder. Open a folder first.";
const NOTHING_TO_SAVE: &str = "There is no answer to save.";
const UNAVAILABLE: &str = "I couldn't answer that right now. Try rephrasing the question.";
const SOMETHING_WENT_WRONG: &str = "Something went wrong, please try again.";

/// Drives one conversation per owner.
///
/// Every input is handled as `(state, input) -> (reply, next state)`.
/// `/start` and button actions are accepted in any state and replace it;
/// plain text is interpreted by the current state. `/start` also drops the
/// session, including an unsaved generated answer.
pub struct ChatMachine {
    assistant: Arc<Assistant>,
    sessions: SessionStore,
}

impl ChatMachine {
    /// Creates a machine with empty sessions.
    #[must_use]
    pub fn new(assistant: Arc<Assistant>) -> Self {
        Self {
            assistant,
            sessions: SessionStore::new(),
        }
    }

    /// Returns the owner's current state.
    #[must_use]
    pub fn state(&self, owner: &OwnerId) -> ChatState {
        self.sessions.get(owner).state
    }

    /// Handles one input and returns the reply.
    ///
    /// Invalid user input is answered with a validation reply. A storage
    /// failure is logged and answered with a retry message; the session is
    /// left as it was before the input.
    #[instrument(skip(self, input), fields(owner = %owner, from = tracing::field::Empty, to = tracing::field::Empty))]
    pub fn handle(&self, owner: &OwnerId, input: Input) -> Reply {
        if matches!(input, Input::Command(Command::Start)) {
            self.sessions.reset(owner);
        }
        let mut session = self.sessions.get(owner);
        let from = session.state;

        let (reply, next) = match self.transition(owner, &mut session, input) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, state = from.name(), "chat turn failed");
                metrics::counter!("chat_failures_total", "state" => from.name()).increment(1);
                return Reply::text(SOMETHING_WENT_WRONG);
            },
        };

        let span = tracing::Span::current();
        span.record("from", from.name());
        span.record("to", next.name());
        metrics::counter!("chat_transitions_total", "from" => from.name(), "to" => next.name())
            .increment(1);

        session.state = next;
        self.sessions.put(owner, session);
        reply
    }

    fn transition(
        &self,
        owner: &OwnerId,
        session: &mut Session,
        input: Input,
    ) -> Result<(Reply, ChatState)> {
        match input {
            Input::Command(Command::Start) => Ok((Self::greeting(), ChatState::Idle)),
            Input::Command(Command::Search) => Ok((Reply::text(ASK_QUESTION), ChatState::AwaitingQuery)),
            Input::Action(action) => self.on_action(owner, session, action),
            Input::Text(text) => self.on_text(owner, session, &text),
        }
    }

    fn greeting() -> Reply {
        Reply::text(GREETING).with_row(vec![
            Button::new("Folders", Action::ListFolders(None)),
            Button::new("Add folder", Action::AddFolder(None)),
        ])
    }

    fn on_action(
        &self,
        owner: &OwnerId,
        session: &mut Session,
        action: Action,
    ) -> Result<(Reply, ChatState)> {
        let store = self.assistant.store();
        let idle = |reply: Reply| -> Result<(Reply, ChatState)> { Ok((reply, ChatState::Idle)) };

        match action {
            Action::ListFolders(folder) => idle(self.folder_view(owner, folder)?),
            Action::ListNotes(folder) => idle(self.notes_view(owner, folder, None)?),
            Action::AddFolder(parent) => {
                if let Some(parent) = parent {
                    if store.get_folder(owner, parent)?.is_none() {
                        return idle(Reply::text(FOLDER_NOT_FOUND));
                    }
                }
                Ok((Reply::text(ASK_FOLDER_LABEL), ChatState::AwaitingFolderLabel { parent }))
            },
            Action::AddNote(None) => idle(Reply::text(ROOT_NOTE_REJECTED)),
            Action::AddNote(Some(folder)) => {
                if store.get_folder(owner, folder)?.is_none() {
                    return idle(Reply::text(FOLDER_NOT_FOUND));
                }
                Ok((Reply::text(ASK_NOTE_TEXT), ChatState::AwaitingNoteText { folder }))
            },
            Action::DeleteFolder(folder) => {
                let parent = store.parent_of(owner, folder)?;
                if store.delete_folder(owner, folder)? {
                    idle(self.folder_view(owner, parent)?)
                } else {
                    idle(Reply::text(FOLDER_NOT_FOUND))
                }
            },
            Action::DeleteNote(folder) => self.choose_note(owner, folder, ASK_NOTE_TO_DELETE, |folder| {
                ChatState::AwaitingNoteDeletion { folder }
            }),
            Action::EditNote(folder) => self.choose_note(owner, folder, ASK_NOTE_TO_EDIT, |folder| {
                ChatState::ChoosingNoteToEdit { folder }
            }),
            Action::SaveAiAnswer => match session.last_answer.take() {
                Some(text) => {
                    let (folder, _) = self.assistant.save_generated_answer(owner, &text)?;
                    idle(self.notes_view(owner, folder.id, Some("Answer saved."))?)
                },
                None => idle(Reply::text(NOTHING_TO_SAVE)),
            },
        }
    }

    fn on_text(
        &self,
        owner: &OwnerId,
        session: &mut Session,
        text: &str,
    ) -> Result<(Reply, ChatState)> {
        let store = self.assistant.store();
        let state = session.state;

        match state {
            ChatState::Idle | ChatState::AwaitingQuery => {
                Ok((self.answer(owner, session, text)?, ChatState::Idle))
            },
            ChatState::AwaitingFolderLabel { parent } => {
                match store.create_folder(owner, text, parent) {
                    Ok(Some(_)) => Ok((self.folder_view(owner, parent)?, ChatState::Idle)),
                    Ok(None) => Ok((Reply::text(FOLDER_NOT_FOUND), ChatState::Idle)),
                    Err(Error::InvalidInput(msg)) => Ok((Reply::text(capitalize(&msg)), state)),
                    Err(e) => Err(e),
                }
            },
            ChatState::AwaitingNoteText { folder } => {
                match store.create_note(owner, Some(folder), text) {
                    Ok(Some(_)) => Ok((self.notes_view(owner, folder, None)?, ChatState::Idle)),
                    Ok(None) => Ok((Reply::text(FOLDER_NOT_FOUND), ChatState::Idle)),
                    Err(Error::InvalidInput(msg)) => Ok((Reply::text(capitalize(&msg)), state)),
                    Err(e) => Err(e),
                }
            },
            ChatState::AwaitingNoteDeletion { folder } => {
                let note = match self.pick_note(owner, folder, text)? {
                    Ok(note) => note,
                    Err(reply) => return Ok((reply, state)),
                };
                if store.delete_note(owner, note)? {
                    Ok((self.notes_view(owner, folder, Some("Note deleted."))?, ChatState::Idle))
                } else {
                    Ok((Reply::text(NOTE_NOT_FOUND), ChatState::Idle))
                }
            },
            ChatState::ChoosingNoteToEdit { folder } => {
                match self.pick_note(owner, folder, text)? {
                    Ok(note) => Ok((
                        Reply::text(ASK_NEW_NOTE_TEXT),
                        ChatState::EditingNoteText { folder, note },
                    )),
                    Err(reply) => Ok((reply, state)),
                }
            },
            ChatState::EditingNoteText { folder, note } => {
                match store.update_note_text(owner, note, text) {
                    Ok(true) => Ok((self.notes_view(owner, folder, Some("Note updated."))?, ChatState::Idle)),
                    Ok(false) => Ok((Reply::text(NOTE_NOT_FOUND), ChatState::Idle)),
                    Err(Error::InvalidInput(msg)) => Ok((Reply::text(capitalize(&msg)), state)),
                    Err(e) => Err(e),
                }
            },
        }
    }

    fn answer(&self, owner: &OwnerId, session: &mut Session, query: &str) -> Result<Reply> {
        match self.assistant.ask(owner, query) {
            Ok(Answer::FromKnowledgeBase { text, .. }) => Ok(Reply::text(text)),
            Ok(Answer::Generated { text }) => {
                session.last_answer = Some(text.clone());
                Ok(Reply::text(format!("Nothing in your notes, here is what I think:\n\n{text}"))
                    .with_row(vec![Button::new("Save answer", Action::SaveAiAnswer)]))
            },
            Ok(Answer::Unavailable) => Ok(Reply::text(UNAVAILABLE)),
            Err(Error::InvalidInput(_)) => Ok(Reply::text(ASK_QUESTION)),
            Err(e) => Err(e),
        }
    }

    /// Lists the numbered notes of `folder` and asks for a number.
    fn choose_note(
        &self,
        owner: &OwnerId,
        folder: FolderId,
        prompt: &str,
        next: impl FnOnce(FolderId) -> ChatState,
    ) -> Result<(Reply, ChatState)> {
        let store = self.assistant.store();
        if store.get_folder(owner, folder)?.is_none() {
            return Ok((Reply::text(FOLDER_NOT_FOUND), ChatState::Idle));
        }
        let notes = store.list_notes(owner, folder)?;
        if notes.is_empty() {
            return Ok((Reply::text(NO_NOTES), ChatState::Idle));
        }
        Ok((Reply::text(format!("{}\n\n{prompt}", numbered(&notes))), next(folder)))
    }

    /// Resolves a 1-based note number typed by the user.
    ///
    /// The inner `Err` is the validation reply to send back.
    fn pick_note(
        &self,
        owner: &OwnerId,
        folder: FolderId,
        text: &str,
    ) -> Result<std::result::Result<NoteId, Reply>> {
        let Ok(number) = text.trim().parse::<usize>() else {
            return Ok(Err(Reply::text(NOT_A_NUMBER)));
        };
        let notes = self.assistant.store().list_notes(owner, folder)?;
        Ok(number
            .checked_sub(1)
            .and_then(|index| notes.get(index))
            .map(|note| note.id)
            .ok_or_else(|| Reply::text(INVALID_NUMBER)))
    }

    /// Shows a folder's children with navigation buttons, or the root level.
    fn folder_view(&self, owner: &OwnerId, folder: Option<FolderId>) -> Result<Reply> {
        let store = self.assistant.store();
        let parent = match folder {
            Some(id) => match store.get_folder(owner, id)? {
                Some(found) => found.parent,
                None => return Ok(Reply::text(FOLDER_NOT_FOUND)),
            },
            None => None,
        };

        let header = display_path(store, owner, folder)?;
        let children = store.list_children(owner, folder)?;
        let text = if children.is_empty() {
            format!("{header}\n\nNo folders here yet.")
        } else {
            header
        };

        let mut reply = Reply::text(text);
        for child in children {
            let has_children = !store.list_children(owner, Some(child.id))?.is_empty();
            let label = if has_children {
                format!("{}/", child.label)
            } else {
                child.label
            };
            reply = reply.with_row(vec![Button::new(label, Action::ListFolders(Some(child.id)))]);
        }

        Ok(match folder {
            Some(id) => reply
                .with_row(vec![
                    Button::new("Notes", Action::ListNotes(id)),
                    Button::new("Add note", Action::AddNote(Some(id))),
                ])
                .with_row(vec![
                    Button::new("Add folder", Action::AddFolder(Some(id))),
                    Button::new("Delete folder", Action::DeleteFolder(id)),
                ])
                .with_row(vec![Button::new("Back", Action::ListFolders(parent))]),
            None => reply.with_row(vec![Button::new("Add folder", Action::AddFolder(None))]),
        })
    }

    /// Shows a folder's numbered notes, optionally preceded by a status line.
    fn notes_view(&self, owner: &OwnerId, folder: FolderId, status: Option<&str>) -> Result<Reply> {
        let store = self.assistant.store();
        if store.get_folder(owner, folder)?.is_none() {
            return Ok(Reply::text(FOLDER_NOT_FOUND));
        }

        let header = display_path(store, owner, Some(folder))?;
        let notes = store.list_notes(owner, folder)?;
        let body = if notes.is_empty() {
            NO_NOTES.to_string()
        } else {
            numbered(&notes)
        };
        let text = match status {
            Some(status) => format!("{status}\n\n{header}\n\n{body}"),
            None => format!("{header}\n\n{body}"),
        };

        let mut edit_row = vec![Button::new("Add note", Action::AddNote(Some(folder)))];
        if !notes.is_empty() {
            edit_row.push(Button::new("Edit note", Action::EditNote(folder)));
            edit_row.push(Button::new("Delete note", Action::DeleteNote(folder)));
        }

        Ok(Reply::text(text)
            .with_row(edit_row)
            .with_row(vec![Button::new("Back", Action::ListFolders(Some(folder)))]))
    }
}

fn numbered(notes: &[crate::models::Note]) -> String {
    notes
        .iter()
        .enumerate()
        .map(|(index, note)| format!("{}. {}", index + 1, note.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        format!("{}{}.", first.to_uppercase(), chars.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("folder label cannot be empty"), "Folder label cannot be empty.");
        assert_eq!(capitalize(""), "");
    }
}
