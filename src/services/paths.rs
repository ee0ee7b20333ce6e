//! Folder paths and tree rendering.
//!
//! A folder's path is the sequence of labels from its root down to itself,
//! rendered as a string by joining with `/`.

use crate::models::{Folder, FolderId, OwnerId};
use crate::storage::TreeStore;
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};

/// Separator between labels in a path string.
pub const PATH_SEPARATOR: &str = "/";

/// Returns the labels from the root down to `folder`.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if `folder` or one of its ancestors is not
/// owned by `owner`, and [`Error::CycleDetected`] if the parent chain loops.
pub fn path_of(store: &dyn TreeStore, owner: &OwnerId, folder: FolderId) -> Result<Vec<String>> {
    let mut labels = Vec::new();
    let mut visited = HashSet::new();
    let mut current = Some(folder);

    while let Some(id) = current {
        if !visited.insert(id) {
            return Err(Error::CycleDetected(id));
        }
        let found = store
            .get_folder(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("folder {id}")))?;
        labels.push(found.label);
        current = found.parent;
    }

    labels.reverse();
    Ok(labels)
}

/// Returns the path of `folder` joined with `/`, e.g. `Work/Projects`.
///
/// # Errors
///
/// Same as [`path_of`].
pub fn path_string(store: &dyn TreeStore, owner: &OwnerId, folder: FolderId) -> Result<String> {
    Ok(path_of(store, owner, folder)?.join(PATH_SEPARATOR))
}

/// Returns the browsing header for a folder: `/Work/Projects`, or `/` for the
/// root level.
///
/// # Errors
///
/// Same as [`path_of`].
pub fn display_path(
    store: &dyn TreeStore,
    owner: &OwnerId,
    folder: Option<FolderId>,
) -> Result<String> {
    match folder {
        Some(folder) => Ok(format!(
            "{PATH_SEPARATOR}{}",
            path_string(store, owner, folder)?
        )),
        None => Ok(PATH_SEPARATOR.to_string()),
    }
}

/// Computes the path string of every folder the owner has, in id order.
///
/// Reads the folder list once and resolves parents in memory.
///
/// # Errors
///
/// Returns [`Error::CycleDetected`] if a parent chain loops, or
/// [`Error::NotFound`] if a parent is missing.
pub fn all_paths(store: &dyn TreeStore, owner: &OwnerId) -> Result<Vec<(Folder, String)>> {
    let folders = store.list_folders(owner)?;
    let by_id: HashMap<FolderId, &Folder> = folders.iter().map(|f| (f.id, f)).collect();

    let mut paths = Vec::with_capacity(folders.len());
    for folder in &folders {
        let mut labels = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(folder);
        while let Some(node) = current {
            if !visited.insert(node.id) {
                return Err(Error::CycleDetected(node.id));
            }
            labels.push(node.label.as_str());
            current = match node.parent {
                Some(parent) => Some(
                    by_id
                        .get(&parent)
                        .copied()
                        .ok_or_else(|| Error::NotFound(format!("folder {parent}")))?,
                ),
                None => None,
            };
        }
        labels.reverse();
        paths.push((folder.clone(), labels.join(PATH_SEPARATOR)));
    }

    Ok(paths)
}

/// Renders the owner's whole hierarchy as an indented listing.
///
/// Depth-first in id order. Roots are indented by two spaces and each level
/// adds two more; a label is suffixed with `/` when the folder has children.
///
/// ```text
///   Work/
///     Projects
///   Cooking
/// ```
///
/// # Errors
///
/// Returns an error if the folder list cannot be read.
pub fn full_tree(store: &dyn TreeStore, owner: &OwnerId) -> Result<String> {
    let folders = store.list_folders(owner)?;
    let mut children: HashMap<Option<FolderId>, Vec<&Folder>> = HashMap::new();
    for folder in &folders {
        children.entry(folder.parent).or_default().push(folder);
    }

    let mut rendered = String::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<(&Folder, usize)> = children
        .get(&None)
        .map(|roots| roots.iter().rev().map(|root| (*root, 0)).collect())
        .unwrap_or_default();

    while let Some((folder, depth)) = stack.pop() {
        if !visited.insert(folder.id) {
            continue;
        }
        let kids = children.get(&Some(folder.id));
        let suffix = if kids.is_some() { PATH_SEPARATOR } else { "" };
        let indent = 2 * (depth + 1);
        rendered.push_str(&format!("{:indent$}{}{suffix}\n", "", folder.label));

        if let Some(kids) = kids {
            stack.extend(kids.iter().rev().map(|kid| (*kid, depth + 1)));
        }
    }

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryTreeStore;

    fn owner() -> OwnerId {
        OwnerId::from("owner")
    }

    fn folder(store: &InMemoryTreeStore, label: &str, parent: Option<&Folder>) -> Folder {
        store
            .create_folder(&owner(), label, parent.map(|p| p.id))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_path_of_nested() {
        let store = InMemoryTreeStore::new();
        let work = folder(&store, "Work", None);
        let projects = folder(&store, "Projects", Some(&work));
        let rust = folder(&store, "Rust", Some(&projects));

        assert_eq!(path_of(&store, &owner(), rust.id).unwrap(), ["Work", "Projects", "Rust"]);
        assert_eq!(path_string(&store, &owner(), rust.id).unwrap(), "Work/Projects/Rust");
        assert_eq!(
            display_path(&store, &owner(), Some(projects.id)).unwrap(),
            "/Work/Projects"
        );
        assert_eq!(display_path(&store, &owner(), None).unwrap(), "/");
    }

    #[test]
    fn test_path_of_foreign_folder_is_not_found() {
        let store = InMemoryTreeStore::new();
        let work = folder(&store, "Work", None);

        let result = path_of(&store, &OwnerId::from("intruder"), work.id);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_all_paths_matches_path_string() {
        let store = InMemoryTreeStore::new();
        let work = folder(&store, "Work", None);
        folder(&store, "Projects", Some(&work));
        folder(&store, "Home", None);

        let paths = all_paths(&store, &owner()).unwrap();
        let strings: Vec<&str> = paths.iter().map(|(_, path)| path.as_str()).collect();
        assert_eq!(strings, ["Work", "Work/Projects", "Home"]);
        for (folder, path) in &paths {
            assert_eq!(&path_string(&store, &owner(), folder.id).unwrap(), path);
        }
    }

    #[test]
    fn test_full_tree_rendering() {
        let store = InMemoryTreeStore::new();
        let work = folder(&store, "Work", None);
        let projects = folder(&store, "Projects", Some(&work));
        folder(&store, "Rust", Some(&projects));
        folder(&store, "Meetings", Some(&work));
        folder(&store, "Cooking", None);

        let expected = "  Work/\n    Projects/\n      Rust\n    Meetings\n  Cooking\n";
        assert_eq!(full_tree(&store, &owner()).unwrap(), expected);
    }

    #[test]
    fn test_full_tree_empty() {
        let store = InMemoryTreeStore::new();
        assert_eq!(full_tree(&store, &owner()).unwrap(), "");
    }
}
