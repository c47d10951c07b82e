//! Integration tests for the selection tree and its saved state.
//!
//! Trees are built over real directories in a `TempDir`; the property tests
//! generate random layouts and toggle sequences.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use codelens::selection::{
    ExclusionPolicy, NodeState, SelectionNode, SelectionStore, SelectionTree,
};
use proptest::prelude::*;
use tempfile::TempDir;

/// Create `files` (relative paths) under a fresh temp dir.
fn make_tree(files: &[String]) -> TempDir {
    let dir = TempDir::new().expect("should create temp dir");
    for rel in files {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("contents of {}\n", rel)).unwrap();
    }
    dir
}

/// Every directory implied by the file paths, shallowest first.
fn directories(files: &[String]) -> Vec<String> {
    let mut dirs = BTreeSet::new();
    for rel in files {
        let mut parent = Path::new(rel).parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                dirs.insert(p.to_string_lossy().to_string());
            }
            parent = p.parent();
        }
    }
    let mut dirs: Vec<String> = dirs.into_iter().collect();
    dirs.sort_by_key(|d| d.matches('/').count());
    dirs
}

fn descendant_states(tree: &SelectionTree, path: &Path) -> Vec<NodeState> {
    let mut out = Vec::new();
    for child in tree.children(path) {
        out.push(child.state());
        if child.is_dir() {
            out.extend(descendant_states(tree, child.path()));
        }
    }
    out
}

fn check_directory_states(tree: &SelectionTree, node: &SelectionNode) -> Result<(), TestCaseError> {
    let children = tree.children(node.path());
    if children.is_empty() {
        return Ok(());
    }
    for child in &children {
        if child.is_dir() {
            check_directory_states(tree, child)?;
        }
    }
    let expected = if children.iter().all(|c| c.state() == NodeState::Included) {
        NodeState::Included
    } else if children.iter().all(|c| c.state() == NodeState::Excluded) {
        NodeState::Excluded
    } else {
        NodeState::Partial
    };
    prop_assert_eq!(node.state(), expected, "directory {:?}", node.path());
    Ok(())
}

fn file_paths() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(
        (prop::collection::vec(0..3u8, 0..3), 0..4u8).prop_map(|(dirs, file)| {
            let mut parts: Vec<String> = dirs.iter().map(|d| format!("d{}", d)).collect();
            parts.push(format!("f{}.txt", file));
            parts.join("/")
        }),
        1..12,
    )
    .prop_map(|set| {
        // A path cannot be both a file and a directory; file names never start with 'd'.
        set.into_iter().collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_full_toggle_forces_every_descendant(
        files in file_paths(),
        toggles in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
        target in any::<prop::sample::Index>(),
    ) {
        let dir = make_tree(&files);
        let mut tree = SelectionTree::build(dir.path(), ExclusionPolicy::new()).unwrap();

        let mut candidates: Vec<String> = directories(&files);
        candidates.extend(files.iter().cloned());
        for idx in toggles {
            tree.toggle(idx.get(&candidates)).unwrap();
        }

        let mut dirs = directories(&files);
        dirs.push(String::new());
        let chosen = PathBuf::from(target.get(&dirs));
        let new_state = tree.toggle(&chosen).unwrap();

        prop_assert!(new_state != NodeState::Partial);
        for state in descendant_states(&tree, &chosen) {
            prop_assert_eq!(state, new_state);
        }
    }

    #[test]
    fn test_directory_state_follows_children(
        files in file_paths(),
        toggles in prop::collection::vec((any::<prop::sample::Index>(), any::<bool>()), 1..10),
    ) {
        let dir = make_tree(&files);
        let mut tree = SelectionTree::build(dir.path(), ExclusionPolicy::new()).unwrap();

        let mut candidates: Vec<String> = directories(&files);
        candidates.extend(files.iter().cloned());
        for (idx, recursive) in toggles {
            let path = idx.get(&candidates);
            if recursive {
                tree.toggle_recursive(path).unwrap();
            } else {
                tree.toggle(path).unwrap();
            }
        }

        check_directory_states(&tree, tree.root_node())?;

        let included: BTreeSet<String> = tree
            .included_paths()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect();
        for file in &files {
            let state = tree.state(file).unwrap();
            prop_assert_eq!(included.contains(file), state == NodeState::Included);
        }
    }
}

#[test]
fn test_restore_after_filesystem_change() {
    let dir = make_tree(&[
        "src/main.py".to_string(),
        "src/util.py".to_string(),
        "docs/guide.md".to_string(),
    ]);
    let state_file = dir.path().join("state").join("selection.json");
    let store = SelectionStore::new(&state_file);

    let mut tree = SelectionTree::build(dir.path(), ExclusionPolicy::new()).unwrap();
    tree.toggle("src/util.py").unwrap();
    tree.toggle("docs").unwrap();
    store.persist(&tree).unwrap();

    // One path removed, one added.
    fs::remove_file(dir.path().join("src/util.py")).unwrap();
    fs::write(dir.path().join("src/new.py"), "x = 1\n").unwrap();

    let mut rebuilt = SelectionTree::build(dir.path(), ExclusionPolicy::new()).unwrap();
    let report = store.restore(&mut rebuilt);

    assert_eq!(report.dropped, vec!["src/util.py".to_string()]);
    assert_eq!(rebuilt.state("docs"), Some(NodeState::Excluded));
    assert_eq!(rebuilt.state("docs/guide.md"), Some(NodeState::Excluded));
    assert_eq!(rebuilt.state("src/new.py"), Some(NodeState::Included));
    assert_eq!(rebuilt.state("src"), Some(NodeState::Included));
}

#[test]
fn test_corrupt_state_falls_back_to_defaults() {
    let dir = make_tree(&["a.py".to_string(), "b.py".to_string()]);
    let state_file = dir.path().join("selection.json");
    fs::write(&state_file, "{ not json").unwrap();

    let mut tree = SelectionTree::build(dir.path(), ExclusionPolicy::new()).unwrap();
    let report = SelectionStore::new(&state_file).restore(&mut tree);

    assert_eq!(report.applied, 0);
    assert_eq!(tree.state("a.py"), Some(NodeState::Included));
    assert_eq!(tree.state("b.py"), Some(NodeState::Included));
}

#[test]
fn test_saved_record_ignores_unknown_fields() {
    let dir = make_tree(&["a.py".to_string(), "b.py".to_string()]);
    let state_file = dir.path().join("selection.json");
    fs::write(
        &state_file,
        r#"{"version": 7, "root": "/elsewhere", "decisions": {"a.py": "excluded", "b.py": "maybe"}, "extra": [1, 2]}"#,
    )
    .unwrap();

    let mut tree = SelectionTree::build(dir.path(), ExclusionPolicy::new()).unwrap();
    SelectionStore::new(&state_file).restore(&mut tree);

    assert_eq!(tree.state("a.py"), Some(NodeState::Excluded));
    assert_eq!(tree.state("b.py"), Some(NodeState::Included));
}

#[test]
fn test_default_excluded_directories() {
    let dir = make_tree(&[
        "app.js".to_string(),
        "node_modules/lib/index.js".to_string(),
        ".git/config".to_string(),
    ]);
    let tree = SelectionTree::build(dir.path(), ExclusionPolicy::new()).unwrap();

    let included: Vec<PathBuf> = tree.included_paths().map(Path::to_path_buf).collect();
    assert_eq!(included, vec![PathBuf::from("app.js")]);
    assert_eq!(tree.state("node_modules"), Some(NodeState::Excluded));
}
