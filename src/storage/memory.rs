//! In-memory [`TreeStore`].
//!
//! Records live in id-keyed maps behind a single `RwLock`, so listings come
//! out in id order without sorting. Used by tests and by `--ephemeral` runs.

use crate::models::{Folder, FolderId, Note, NoteId, OwnerId};
use crate::storage::traits::{TreeStore, require_text};
use crate::{Result, current_timestamp};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Arena {
    folders: BTreeMap<FolderId, Folder>,
    notes: BTreeMap<NoteId, Note>,
    last_folder_id: i64,
    last_note_id: i64,
}

impl Arena {
    fn owned_folder(&self, owner: &OwnerId, folder: FolderId) -> Option<&Folder> {
        self.folders.get(&folder).filter(|found| &found.owner == owner)
    }

    fn owned_note(&self, owner: &OwnerId, note: NoteId) -> Option<&Note> {
        self.notes.get(&note).filter(|found| &found.owner == owner)
    }

    /// Collects `root` and all of its descendants.
    fn subtree(&self, owner: &OwnerId, root: FolderId) -> Vec<FolderId> {
        let mut collected = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if collected.contains(&current) {
                continue;
            }
            collected.push(current);
            stack.extend(
                self.folders
                    .values()
                    .filter(|folder| &folder.owner == owner && folder.parent == Some(current))
                    .map(|folder| folder.id),
            );
        }
        collected
    }
}

/// Thread-safe in-memory tree store.
#[derive(Default)]
pub struct InMemoryTreeStore {
    arena: RwLock<Arena>,
}

impl InMemoryTreeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Arena> {
        self.arena.read().unwrap_or_else(|poisoned| {
            tracing::warn!("In-memory store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arena> {
        self.arena.write().unwrap_or_else(|poisoned| {
            tracing::warn!("In-memory store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl TreeStore for InMemoryTreeStore {
    fn create_folder(
        &self,
        owner: &OwnerId,
        label: &str,
        parent: Option<FolderId>,
    ) -> Result<Option<Folder>> {
        require_text("folder label", label)?;

        let mut arena = self.write();
        if let Some(parent) = parent {
            if arena.owned_folder(owner, parent).is_none() {
                return Ok(None);
            }
        }

        arena.last_folder_id += 1;
        let folder = Folder {
            id: FolderId::new(arena.last_folder_id),
            owner: owner.clone(),
            label: label.trim().to_string(),
            parent,
            created_at: current_timestamp(),
        };
        arena.folders.insert(folder.id, folder.clone());
        Ok(Some(folder))
    }

    fn delete_folder(&self, owner: &OwnerId, folder: FolderId) -> Result<bool> {
        let mut arena = self.write();
        if arena.owned_folder(owner, folder).is_none() {
            return Ok(false);
        }

        let subtree = arena.subtree(owner, folder);
        arena.notes.retain(|_, note| {
            !(note.owner == *owner && note.folder.is_some_and(|id| subtree.contains(&id)))
        });
        for id in &subtree {
            arena.folders.remove(id);
        }
        Ok(true)
    }

    fn create_note(
        &self,
        owner: &OwnerId,
        folder: Option<FolderId>,
        text: &str,
    ) -> Result<Option<Note>> {
        require_text("note text", text)?;

        let mut arena = self.write();
        if let Some(folder) = folder {
            if arena.owned_folder(owner, folder).is_none() {
                return Ok(None);
            }
        }

        arena.last_note_id += 1;
        let note = Note {
            id: NoteId::new(arena.last_note_id),
            owner: owner.clone(),
            text: text.to_string(),
            folder,
            created_at: current_timestamp(),
        };
        arena.notes.insert(note.id, note.clone());
        Ok(Some(note))
    }

    fn delete_note(&self, owner: &OwnerId, note: NoteId) -> Result<bool> {
        let mut arena = self.write();
        if arena.owned_note(owner, note).is_none() {
            return Ok(false);
        }
        Ok(arena.notes.remove(&note).is_some())
    }

    fn update_note_text(&self, owner: &OwnerId, note: NoteId, text: &str) -> Result<bool> {
        require_text("note text", text)?;

        let mut arena = self.write();
        match arena.notes.get_mut(&note) {
            Some(found) if &found.owner == owner => {
                found.text = text.to_string();
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    fn list_children(&self, owner: &OwnerId, folder: Option<FolderId>) -> Result<Vec<Folder>> {
        Ok(self
            .read()
            .folders
            .values()
            .filter(|child| &child.owner == owner && child.parent == folder)
            .cloned()
            .collect())
    }

    fn list_notes(&self, owner: &OwnerId, folder: FolderId) -> Result<Vec<Note>> {
        Ok(self
            .read()
            .notes
            .values()
            .filter(|note| &note.owner == owner && note.folder == Some(folder))
            .cloned()
            .collect())
    }

    fn get_folder(&self, owner: &OwnerId, folder: FolderId) -> Result<Option<Folder>> {
        Ok(self.read().owned_folder(owner, folder).cloned())
    }

    fn get_note(&self, owner: &OwnerId, note: NoteId) -> Result<Option<Note>> {
        Ok(self.read().owned_note(owner, note).cloned())
    }

    fn list_folders(&self, owner: &OwnerId) -> Result<Vec<Folder>> {
        Ok(self
            .read()
            .folders
            .values()
            .filter(|folder| &folder.owner == owner)
            .cloned()
            .collect())
    }

    fn list_owner_notes(&self, owner: &OwnerId) -> Result<Vec<Note>> {
        Ok(self
            .read()
            .notes
            .values()
            .filter(|note| &note.owner == owner)
            .cloned()
            .collect())
    }
}
