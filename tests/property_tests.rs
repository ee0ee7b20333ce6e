//! Property-based tests for the folder tree and location matching.
//!
//! Uses proptest to verify invariants across random inputs:
//! - A child's path extends its parent's path by exactly its label
//! - Stores never leak one owner's data to another
//! - Similarity is symmetric, bounded and 100 for equal strings
//! - Keyword fallback returns exactly the notes containing a keyword

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use znanium::services::location::{keyword_search, keywords};
use znanium::services::path_of;
use znanium::services::similarity::ratio;
use znanium::{FolderId, InMemoryTreeStore, OwnerId, TreeStore};

fn label() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{0,11}".prop_map(|s| s.trim().to_string())
}

proptest! {
    /// Property: `path_of(child) == path_of(parent) + [label]`.
    #[test]
    fn prop_child_path_extends_parent(
        labels in prop::collection::vec(label(), 1..12),
        parents in prop::collection::vec(any::<prop::sample::Index>(), 12),
    ) {
        let store = InMemoryTreeStore::new();
        let owner = OwnerId::from("owner");
        let mut created: Vec<FolderId> = Vec::new();

        for (i, label) in labels.iter().enumerate() {
            let parent = (i > 0).then(|| created[parents[i].index(i)]);
            let folder = store.create_folder(&owner, label, parent).unwrap().unwrap();

            let path = path_of(&store, &owner, folder.id).unwrap();
            let expected = match parent {
                Some(parent) => {
                    let mut expected = path_of(&store, &owner, parent).unwrap();
                    expected.push(label.clone());
                    expected
                },
                None => vec![label.clone()],
            };
            prop_assert_eq!(path, expected);
            created.push(folder.id);
        }
    }

    /// Property: another owner sees nothing of a populated tree.
    #[test]
    fn prop_owner_isolation(labels in prop::collection::vec(label(), 1..8)) {
        let store = InMemoryTreeStore::new();
        let owner = OwnerId::from("owner");
        let stranger = OwnerId::from("stranger");

        let mut parent = None;
        for label in &labels {
            let folder = store.create_folder(&owner, label, parent).unwrap().unwrap();
            store.create_note(&owner, Some(folder.id), label).unwrap().unwrap();

            prop_assert!(store.get_folder(&stranger, folder.id).unwrap().is_none());
            prop_assert!(store.list_notes(&stranger, folder.id).unwrap().is_empty());
            prop_assert!(!store.delete_folder(&stranger, folder.id).unwrap());
            parent = Some(folder.id);
        }

        prop_assert!(store.list_folders(&stranger).unwrap().is_empty());
        prop_assert!(store.list_owner_notes(&stranger).unwrap().is_empty());
        prop_assert_eq!(store.list_folders(&owner).unwrap().len(), labels.len());
    }

    /// Property: ratio is symmetric and within 0..=100.
    #[test]
    fn prop_ratio_symmetric_and_bounded(a in "\\PC{0,24}", b in "\\PC{0,24}") {
        let forward = ratio(&a, &b);
        prop_assert_eq!(forward, ratio(&b, &a));
        prop_assert!(forward <= 100);
    }

    /// Property: identical strings score 100.
    #[test]
    fn prop_ratio_identity(a in "\\PC{0,24}") {
        prop_assert_eq!(ratio(&a, &a), 100);
    }

    /// Property: strings without a common character score 0.
    #[test]
    fn prop_ratio_disjoint(a in "[a-m]{1,16}", b in "[n-z]{1,16}") {
        prop_assert_eq!(ratio(&a, &b), 0);
    }

    /// Property: keyword fallback returns exactly the notes that contain a
    /// keyword, case-insensitively, in id order.
    #[test]
    fn prop_keyword_search_is_exact(
        texts in prop::collection::vec("[A-Za-z ]{1,30}", 1..10),
        query in "[A-Za-z ]{0,20}",
    ) {
        let store = InMemoryTreeStore::new();
        let owner = OwnerId::from("owner");
        let folder = store.create_folder(&owner, "Notes", None).unwrap().unwrap();
        for text in texts.iter().filter(|t| !t.trim().is_empty()) {
            store.create_note(&owner, Some(folder.id), text).unwrap().unwrap();
        }

        let words = keywords(&query);
        let found = keyword_search(&store, &owner, &words).unwrap();

        let expected: Vec<_> = store
            .list_owner_notes(&owner)
            .unwrap()
            .into_iter()
            .filter(|note| {
                let lower = note.text.to_lowercase();
                words.iter().any(|w| lower.contains(w.as_str()))
            })
            .collect();
        prop_assert_eq!(found, expected);
    }
}
