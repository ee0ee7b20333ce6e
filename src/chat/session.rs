//! Per-owner conversation sessions.

use super::ChatState;
use crate::models::OwnerId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Conversation state of one owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Current state.
    pub state: ChatState,
    /// Last generated answer, kept until saved or replaced.
    pub last_answer: Option<String>,
}

/// In-process session storage keyed by owner.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<OwnerId, Session>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OwnerId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the owner's session, or a fresh one.
    #[must_use]
    pub fn get(&self, owner: &OwnerId) -> Session {
        self.lock()
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }

    /// Stores the owner's session.
    pub fn put(&self, owner: &OwnerId, session: Session) {
        self.lock().insert(owner.clone(), session);
    }

    /// Drops the owner's session.
    pub fn reset(&self, owner: &OwnerId) {
        self.lock().remove(owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FolderId;

    #[test]
    fn test_sessions_are_per_owner() {
        let store = SessionStore::new();
        let alice = OwnerId::from("alice");
        let bob = OwnerId::from("bob");

        store.put(
            &alice,
            Session {
                state: ChatState::AwaitingNoteText {
                    folder: FolderId::new(1),
                },
                last_answer: None,
            },
        );

        assert_eq!(store.get(&bob), Session::default());
        assert_ne!(store.get(&alice).state, ChatState::Idle);

        store.reset(&alice);
        assert_eq!(store.get(&alice).state, ChatState::Idle);
    }
}
