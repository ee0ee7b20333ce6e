//! `SQLite`-backed [`TreeStore`].

use super::rows::{FOLDER_SELECT, NOTE_SELECT};
use super::{
    acquire_lock, configure_connection, db_error, folder_from_row, note_from_row,
    record_operation_metrics,
};
use crate::models::{Folder, FolderId, Note, NoteId, OwnerId};
use crate::storage::traits::{TreeStore, require_text};
use crate::{Result, current_timestamp};
use rusqlite::{Connection, OptionalExtension, Params, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS folders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id TEXT NOT NULL,
    label TEXT NOT NULL,
    parent_id INTEGER REFERENCES folders(id),
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_folders_owner_parent ON folders(owner_id, parent_id);

CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id TEXT NOT NULL,
    text TEXT NOT NULL,
    folder_id INTEGER REFERENCES folders(id),
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notes_owner_folder ON notes(owner_id, folder_id);
";

/// Collects a folder and all of its descendants, parents before children.
const SUBTREE_SQL: &str = "
WITH RECURSIVE subtree(id, depth) AS (
    SELECT id, 0 FROM folders WHERE id = ?1 AND owner_id = ?2
    UNION
    SELECT f.id, s.depth + 1 FROM folders f
    JOIN subtree s ON f.parent_id = s.id
    WHERE f.owner_id = ?2
)
SELECT id FROM subtree ORDER BY depth, id
";

/// `SQLite` tree store.
///
/// One connection guarded by a mutex. Every mutating operation runs inside its
/// own transaction, so a failure part-way through a cascade delete leaves the
/// hierarchy untouched.
pub struct SqliteTreeStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteTreeStore {
    /// Opens (or creates) a database file and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path).map_err(db_error("open_database"))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_error("open_database"))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path, `None` for in-memory stores.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;
        conn.execute_batch(SCHEMA)
            .map_err(db_error("create_schema"))?;
        Ok(())
    }

    /// Runs `f` with the connection locked and records its metrics.
    fn run<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let result = {
            let mut conn = acquire_lock(&self.conn);
            f(&mut conn)
        };
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", operation, start, status);
        result
    }
}

fn owns_folder(conn: &Connection, owner: &OwnerId, folder: FolderId) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM folders WHERE id = ?1 AND owner_id = ?2",
        params![folder.get(), owner.as_str()],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(db_error("check_folder_owner"))
}

fn query_folders(
    conn: &Connection,
    operation: &'static str,
    sql: &str,
    params: impl Params,
) -> Result<Vec<Folder>> {
    let mut stmt = conn.prepare(sql).map_err(db_error(operation))?;
    let rows = stmt
        .query_map(params, folder_from_row)
        .map_err(db_error(operation))?;
    let folders = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_error(operation))?;
    Ok(folders)
}

fn query_notes(
    conn: &Connection,
    operation: &'static str,
    sql: &str,
    params: impl Params,
) -> Result<Vec<Note>> {
    let mut stmt = conn.prepare(sql).map_err(db_error(operation))?;
    let rows = stmt
        .query_map(params, note_from_row)
        .map_err(db_error(operation))?;
    let notes = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_error(operation))?;
    Ok(notes)
}

impl TreeStore for SqliteTreeStore {
    #[instrument(skip(self), fields(backend = "sqlite", owner = %owner))]
    fn create_folder(
        &self,
        owner: &OwnerId,
        label: &str,
        parent: Option<FolderId>,
    ) -> Result<Option<Folder>> {
        require_text("folder label", label)?;
        let label = label.trim();

        self.run("create_folder", |conn| {
            let tx = conn.transaction().map_err(db_error("begin_transaction"))?;
            if let Some(parent) = parent {
                if !owns_folder(&tx, owner, parent)? {
                    return Ok(None);
                }
            }

            let created_at = current_timestamp();
            tx.execute(
                "INSERT INTO folders (owner_id, label, parent_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![owner.as_str(), label, parent.map(FolderId::get), created_at],
            )
            .map_err(db_error("insert_folder"))?;
            let id = FolderId::new(tx.last_insert_rowid());
            tx.commit().map_err(db_error("commit_transaction"))?;

            Ok(Some(Folder {
                id,
                owner: owner.clone(),
                label: label.to_string(),
                parent,
                created_at,
            }))
        })
    }

    #[instrument(skip(self), fields(backend = "sqlite", owner = %owner))]
    fn delete_folder(&self, owner: &OwnerId, folder: FolderId) -> Result<bool> {
        self.run("delete_folder", |conn| {
            let tx = conn.transaction().map_err(db_error("begin_transaction"))?;

            let subtree: Vec<i64> = {
                let mut stmt = tx.prepare(SUBTREE_SQL).map_err(db_error("collect_subtree"))?;
                let rows = stmt
                    .query_map(params![folder.get(), owner.as_str()], |row| row.get(0))
                    .map_err(db_error("collect_subtree"))?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(db_error("collect_subtree"))?
            };
            if subtree.is_empty() {
                return Ok(false);
            }

            let mut removed_notes = 0;
            for id in &subtree {
                removed_notes += tx
                    .execute(
                        "DELETE FROM notes WHERE folder_id = ?1 AND owner_id = ?2",
                        params![id, owner.as_str()],
                    )
                    .map_err(db_error("delete_subtree_notes"))?;
            }
            // Deepest folders first keeps every parent_id reference valid.
            for id in subtree.iter().rev() {
                tx.execute(
                    "DELETE FROM folders WHERE id = ?1 AND owner_id = ?2",
                    params![id, owner.as_str()],
                )
                .map_err(db_error("delete_subtree_folders"))?;
            }
            tx.commit().map_err(db_error("commit_transaction"))?;

            tracing::debug!(
                folders = subtree.len(),
                notes = removed_notes,
                "Deleted folder subtree"
            );
            Ok(true)
        })
    }

    #[instrument(skip(self, text), fields(backend = "sqlite", owner = %owner))]
    fn create_note(
        &self,
        owner: &OwnerId,
        folder: Option<FolderId>,
        text: &str,
    ) -> Result<Option<Note>> {
        require_text("note text", text)?;

        self.run("create_note", |conn| {
            let tx = conn.transaction().map_err(db_error("begin_transaction"))?;
            if let Some(folder) = folder {
                if !owns_folder(&tx, owner, folder)? {
                    return Ok(None);
                }
            }

            let created_at = current_timestamp();
            tx.execute(
                "INSERT INTO notes (owner_id, text, folder_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![owner.as_str(), text, folder.map(FolderId::get), created_at],
            )
            .map_err(db_error("insert_note"))?;
            let id = NoteId::new(tx.last_insert_rowid());
            tx.commit().map_err(db_error("commit_transaction"))?;

            Ok(Some(Note {
                id,
                owner: owner.clone(),
                text: text.to_string(),
                folder,
                created_at,
            }))
        })
    }

    #[instrument(skip(self), fields(backend = "sqlite", owner = %owner))]
    fn delete_note(&self, owner: &OwnerId, note: NoteId) -> Result<bool> {
        self.run("delete_note", |conn| {
            let affected = conn
                .execute(
                    "DELETE FROM notes WHERE id = ?1 AND owner_id = ?2",
                    params![note.get(), owner.as_str()],
                )
                .map_err(db_error("delete_note"))?;
            Ok(affected > 0)
        })
    }

    #[instrument(skip(self, text), fields(backend = "sqlite", owner = %owner))]
    fn update_note_text(&self, owner: &OwnerId, note: NoteId, text: &str) -> Result<bool> {
        require_text("note text", text)?;

        self.run("update_note_text", |conn| {
            let affected = conn
                .execute(
                    "UPDATE notes SET text = ?3 WHERE id = ?1 AND owner_id = ?2",
                    params![note.get(), owner.as_str(), text],
                )
                .map_err(db_error("update_note_text"))?;
            Ok(affected > 0)
        })
    }

    #[instrument(skip(self), fields(backend = "sqlite", owner = %owner))]
    fn list_children(&self, owner: &OwnerId, folder: Option<FolderId>) -> Result<Vec<Folder>> {
        self.run("list_children", |conn| match folder {
            None => query_folders(
                conn,
                "list_children",
                &format!("{FOLDER_SELECT} WHERE owner_id = ?1 AND parent_id IS NULL ORDER BY id"),
                params![owner.as_str()],
            ),
            Some(parent) => query_folders(
                conn,
                "list_children",
                &format!("{FOLDER_SELECT} WHERE owner_id = ?1 AND parent_id = ?2 ORDER BY id"),
                params![owner.as_str(), parent.get()],
            ),
        })
    }

    #[instrument(skip(self), fields(backend = "sqlite", owner = %owner))]
    fn list_notes(&self, owner: &OwnerId, folder: FolderId) -> Result<Vec<Note>> {
        self.run("list_notes", |conn| {
            query_notes(
                conn,
                "list_notes",
                &format!("{NOTE_SELECT} WHERE owner_id = ?1 AND folder_id = ?2 ORDER BY id"),
                params![owner.as_str(), folder.get()],
            )
        })
    }

    fn get_folder(&self, owner: &OwnerId, folder: FolderId) -> Result<Option<Folder>> {
        self.run("get_folder", |conn| {
            conn.query_row(
                &format!("{FOLDER_SELECT} WHERE id = ?1 AND owner_id = ?2"),
                params![folder.get(), owner.as_str()],
                folder_from_row,
            )
            .optional()
            .map_err(db_error("get_folder"))
        })
    }

    fn get_note(&self, owner: &OwnerId, note: NoteId) -> Result<Option<Note>> {
        self.run("get_note", |conn| {
            conn.query_row(
                &format!("{NOTE_SELECT} WHERE id = ?1 AND owner_id = ?2"),
                params![note.get(), owner.as_str()],
                note_from_row,
            )
            .optional()
            .map_err(db_error("get_note"))
        })
    }

    #[instrument(skip(self), fields(backend = "sqlite", owner = %owner))]
    fn list_folders(&self, owner: &OwnerId) -> Result<Vec<Folder>> {
        self.run("list_folders", |conn| {
            query_folders(
                conn,
                "list_folders",
                &format!("{FOLDER_SELECT} WHERE owner_id = ?1 ORDER BY id"),
                params![owner.as_str()],
            )
        })
    }

    #[instrument(skip(self), fields(backend = "sqlite", owner = %owner))]
    fn list_owner_notes(&self, owner: &OwnerId) -> Result<Vec<Note>> {
        self.run("list_owner_notes", |conn| {
            query_notes(
                conn,
                "list_owner_notes",
                &format!("{NOTE_SELECT} WHERE owner_id = ?1 ORDER BY id"),
                params![owner.as_str()],
            )
        })
    }
}
