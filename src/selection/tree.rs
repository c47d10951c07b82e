//! Tri-state selection tree over a directory.
//!
//! Nodes live in an arena addressed by [`NodeId`]. Children are always pushed
//! after their parent, so a reverse walk over the arena is a valid bottom-up
//! order. Directories excluded by the default policy are not walked when the
//! tree is built; their contents are loaded when the user includes them or
//! when a decision refers to a path below them. An unloaded directory is
//! always `Excluded`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::policy::ExclusionPolicy;
use super::SelectionError;

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

/// Displayed inclusion state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Included,
    Excluded,
    /// Some but not all descendants are included. Directories only.
    Partial,
}

impl NodeState {
    pub fn marker(&self) -> &'static str {
        match self {
            NodeState::Included => "[+]",
            NodeState::Excluded => "[-]",
            NodeState::Partial => "[~]",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Included => "included",
            NodeState::Excluded => "excluded",
            NodeState::Partial => "partial",
        };
        write!(f, "{}", s)
    }
}

/// A decision the user made on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Inclusion {
    Included,
    Excluded,
}

impl Inclusion {
    pub fn as_state(self) -> NodeState {
        match self {
            Inclusion::Included => NodeState::Included,
            Inclusion::Excluded => NodeState::Excluded,
        }
    }

    fn from_state(state: NodeState) -> Option<Self> {
        match state {
            NodeState::Included => Some(Inclusion::Included),
            NodeState::Excluded => Some(Inclusion::Excluded),
            NodeState::Partial => None,
        }
    }
}

/// One file or directory in the tree.
#[derive(Debug, Clone)]
pub struct SelectionNode {
    path: PathBuf,
    kind: NodeKind,
    state: NodeState,
    explicit: Option<Inclusion>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    loaded: bool,
}

impl SelectionNode {
    /// Path relative to the tree root. The root itself has an empty path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    /// The decision recorded on this node, if the user toggled it directly.
    pub fn explicit(&self) -> Option<Inclusion> {
        self.explicit
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit.is_some()
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Whether a directory's entries have been read from disk.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Display name (last path component, or "." for the root).
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string())
    }
}

/// Included and excluded file totals over the loaded tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionCounts {
    pub included_files: usize,
    pub excluded_files: usize,
    pub partial_dirs: usize,
}

/// Outcome of applying stored decisions to a fresh tree.
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub applied: usize,
    pub dropped: Vec<String>,
}

pub struct SelectionTree {
    root: PathBuf,
    nodes: Vec<SelectionNode>,
    index: HashMap<PathBuf, NodeId>,
    policy: ExclusionPolicy,
}

const ROOT: NodeId = NodeId(0);

impl SelectionTree {
    /// Walk `root` and build a tree with every node at its default state.
    pub fn build<P: AsRef<Path>>(root: P, policy: ExclusionPolicy) -> Result<Self, SelectionError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(SelectionError::NotADirectory(root));
        }

        let mut tree = Self {
            root,
            nodes: Vec::new(),
            index: HashMap::new(),
            policy,
        };
        tree.push_node(PathBuf::new(), NodeKind::Directory, NodeState::Included, None);

        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            tree.load_children(id, None);
            for &child in &tree.nodes[id.0].children {
                let node = &tree.nodes[child.0];
                if node.is_dir() && node.state == NodeState::Included {
                    stack.push(child);
                }
            }
        }

        tree.recompute_all();
        debug!(root = %tree.root.display(), nodes = tree.nodes.len(), "built selection tree");
        Ok(tree)
    }

    /// Absolute path of the tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn root_node(&self) -> &SelectionNode {
        &self.nodes[ROOT.0]
    }

    /// Number of loaded nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Flip the node at `path`.
    ///
    /// A file flips between included and excluded. A directory is fully
    /// toggled: included becomes excluded, anything else becomes included,
    /// and every descendant is forced to the new state. Only the toggled node
    /// is marked explicit; every descendant loses its mark.
    pub fn toggle<P: AsRef<Path>>(&mut self, path: P) -> Result<NodeState, SelectionError> {
        let id = self.resolve(path.as_ref())?;
        let new_state = match self.nodes[id.0].state {
            NodeState::Included => NodeState::Excluded,
            NodeState::Excluded | NodeState::Partial => NodeState::Included,
        };
        self.set_decision(id, new_state);
        Ok(new_state)
    }

    /// Select or deselect a whole subtree regardless of earlier toggles
    /// below it. Same as [`toggle`](Self::toggle), which already clears
    /// every descendant mark.
    pub fn toggle_recursive<P: AsRef<Path>>(&mut self, path: P) -> Result<NodeState, SelectionError> {
        self.toggle(path)
    }

    fn set_decision(&mut self, id: NodeId, state: NodeState) {
        if self.nodes[id.0].is_dir() {
            self.force_subtree(id, state);
        }
        let node = &mut self.nodes[id.0];
        node.state = state;
        node.explicit = Inclusion::from_state(state);
        self.recompute_ancestors(id);
    }

    /// Force every descendant of `id` to `state` and clear its mark.
    fn force_subtree(&mut self, id: NodeId, state: NodeState) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.nodes[current.0].is_dir()
                && !self.nodes[current.0].loaded
                && state == NodeState::Included
            {
                self.load_children(current, Some(state));
            }

            if current != id {
                let node = &mut self.nodes[current.0];
                node.state = state;
                node.explicit = None;
            }
            stack.extend(self.nodes[current.0].children.iter().copied());
        }
    }

    /// Recompute every ancestor of `id` from its children, stopping early once
    /// an ancestor's state is unchanged.
    fn recompute_ancestors(&mut self, id: NodeId) {
        let mut current = self.nodes[id.0].parent;
        while let Some(parent) = current {
            let derived = self.derive(parent);
            if derived == self.nodes[parent.0].state {
                break;
            }
            self.nodes[parent.0].state = derived;
            current = self.nodes[parent.0].parent;
        }
    }

    fn recompute_all(&mut self) {
        for i in (0..self.nodes.len()).rev() {
            let id = NodeId(i);
            if self.nodes[i].is_dir() {
                self.nodes[i].state = self.derive(id);
            }
        }
    }

    /// State of a directory derived from its children, ignoring vacant
    /// subdirectories. A directory with nothing else keeps its own state.
    fn derive(&self, id: NodeId) -> NodeState {
        let node = &self.nodes[id.0];
        let mut states = node
            .children
            .iter()
            .filter(|c| !self.is_vacant(**c))
            .map(|c| self.nodes[c.0].state);
        let first = match states.next() {
            Some(s) => s,
            None => return node.state,
        };
        if first == NodeState::Partial {
            return NodeState::Partial;
        }
        if states.all(|s| s == first) {
            first
        } else {
            NodeState::Partial
        }
    }

    /// A loaded directory with no files anywhere below it. Unloaded
    /// directories are never vacant.
    fn is_vacant(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.0];
        node.is_dir() && node.loaded && node.children.iter().all(|c| self.is_vacant(*c))
    }

    fn push_node(
        &mut self,
        path: PathBuf,
        kind: NodeKind,
        state: NodeState,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.index.insert(path.clone(), id);
        self.nodes.push(SelectionNode {
            path,
            kind,
            state,
            explicit: None,
            parent,
            children: Vec::new(),
            loaded: kind == NodeKind::File,
        });
        id
    }

    /// Read one level of `id`'s entries. With `inherit`, children take that
    /// state; otherwise the exclusion policy decides.
    fn load_children(&mut self, id: NodeId, inherit: Option<NodeState>) {
        if self.nodes[id.0].loaded {
            return;
        }
        let dir_rel = self.nodes[id.0].path.clone();
        let dir_abs = self.root.join(&dir_rel);

        let mut children = Vec::new();
        let walker = WalkDir::new(&dir_abs)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(dir = %dir_abs.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let file_type = entry.file_type();
            let kind = if file_type.is_dir() {
                NodeKind::Directory
            } else if file_type.is_file() {
                NodeKind::File
            } else {
                continue;
            };

            let rel = dir_rel.join(entry.file_name());
            let state = match inherit {
                Some(s) => s,
                None if self.policy.is_excluded(&rel, kind == NodeKind::Directory) => {
                    NodeState::Excluded
                }
                None => NodeState::Included,
            };
            children.push(self.push_node(rel, kind, state, Some(id)));
        }

        let node = &mut self.nodes[id.0];
        node.children = children;
        node.loaded = true;
    }

    /// Turn a user-supplied path into a key of the index. Absolute paths must
    /// lie under the root; `.` and the empty path name the root.
    fn normalize(&self, path: &Path) -> Option<PathBuf> {
        let rel = if path.is_absolute() {
            path.strip_prefix(&self.root).ok()?
        } else {
            path
        };

        let mut out = PathBuf::new();
        for component in rel.components() {
            match component {
                Component::Normal(c) => out.push(c),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(out)
    }

    /// Find the node for `path`, loading excluded directories on the way when
    /// the path lies below them.
    fn resolve(&mut self, path: &Path) -> Result<NodeId, SelectionError> {
        let unknown = || SelectionError::UnknownPath(path.to_path_buf());
        let rel = self.normalize(path).ok_or_else(unknown)?;
        if let Some(&id) = self.index.get(&rel) {
            return Ok(id);
        }

        let mut prefix = PathBuf::new();
        for component in rel.components() {
            let id = *self.index.get(&prefix).ok_or_else(unknown)?;
            if self.nodes[id.0].is_dir() && !self.nodes[id.0].loaded {
                let inherit = self.nodes[id.0].state;
                self.load_children(id, Some(inherit));
            }
            prefix.push(component);
        }
        self.index.get(&rel).copied().ok_or_else(unknown)
    }

    /// Load the entries of an unloaded directory so they can be listed.
    pub fn expand<P: AsRef<Path>>(&mut self, path: P) -> Result<(), SelectionError> {
        let id = self.resolve(path.as_ref())?;
        if self.nodes[id.0].is_dir() {
            let inherit = self.nodes[id.0].state;
            self.load_children(id, Some(inherit));
        }
        Ok(())
    }

    pub fn node<P: AsRef<Path>>(&self, path: P) -> Option<&SelectionNode> {
        let rel = self.normalize(path.as_ref())?;
        self.index.get(&rel).map(|id| &self.nodes[id.0])
    }

    /// Current state of `path`. Paths below an unloaded directory report that
    /// directory's state if they exist on disk.
    pub fn state<P: AsRef<Path>>(&self, path: P) -> Option<NodeState> {
        let rel = self.normalize(path.as_ref())?;
        if let Some(id) = self.index.get(&rel) {
            return Some(self.nodes[id.0].state);
        }

        let mut ancestor = rel.parent();
        while let Some(a) = ancestor {
            if let Some(id) = self.index.get(a) {
                let node = &self.nodes[id.0];
                if node.is_dir() && !node.loaded && self.root.join(&rel).exists() {
                    return Some(node.state);
                }
                return None;
            }
            ancestor = a.parent();
        }
        None
    }

    /// Loaded children of the directory at `path`.
    pub fn children<P: AsRef<Path>>(&self, path: P) -> Vec<&SelectionNode> {
        match self.node(path) {
            Some(node) => node.children.iter().map(|c| &self.nodes[c.0]).collect(),
            None => Vec::new(),
        }
    }

    /// Lazily yield every file whose state is `Included`, relative to the root,
    /// in depth-first name order.
    pub fn included_paths(&self) -> IncludedPaths<'_> {
        IncludedPaths {
            tree: self,
            stack: vec![ROOT],
        }
    }

    /// Every explicit decision keyed by `/`-separated relative path. The root
    /// is keyed as ".".
    pub fn explicit_decisions(&self) -> BTreeMap<String, Inclusion> {
        self.nodes
            .iter()
            .filter_map(|n| n.explicit.map(|e| (path_key(&n.path), e)))
            .collect()
    }

    /// Apply stored decisions, shallowest first so deeper ones win. Paths that
    /// no longer exist are dropped with a warning.
    pub fn apply_decisions(&mut self, decisions: &BTreeMap<String, Inclusion>) -> RestoreReport {
        let mut ordered: Vec<(&String, &Inclusion)> = decisions.iter().collect();
        ordered.sort_by_key(|(key, _)| (key_depth(key), (*key).clone()));

        let mut report = RestoreReport::default();
        for (key, decision) in ordered {
            match self.resolve(Path::new(key)) {
                Ok(id) => {
                    self.set_decision(id, decision.as_state());
                    report.applied += 1;
                }
                Err(_) => {
                    warn!(path = %key, "dropping saved selection for missing path");
                    report.dropped.push(key.clone());
                }
            }
        }
        report
    }

    pub fn counts(&self) -> SelectionCounts {
        let mut counts = SelectionCounts::default();
        for node in &self.nodes {
            match (node.kind, node.state) {
                (NodeKind::File, NodeState::Included) => counts.included_files += 1,
                (NodeKind::File, _) => counts.excluded_files += 1,
                (NodeKind::Directory, NodeState::Partial) => counts.partial_dirs += 1,
                _ => {}
            }
        }
        counts
    }
}

/// Iterator returned by [`SelectionTree::included_paths`].
pub struct IncludedPaths<'a> {
    tree: &'a SelectionTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for IncludedPaths<'a> {
    type Item = &'a Path;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let node = &self.tree.nodes[id.0];
            match node.kind {
                NodeKind::File if node.state == NodeState::Included => {
                    return Some(node.path.as_path());
                }
                NodeKind::File => {}
                NodeKind::Directory if node.state == NodeState::Excluded => {}
                NodeKind::Directory => self.stack.extend(node.children.iter().rev().copied()),
            }
        }
        None
    }
}

fn path_key(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        return ".".to_string();
    }
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn key_depth(key: &str) -> usize {
    if key == "." {
        0
    } else {
        key.split('/').filter(|s| !s.is_empty() && *s != ".").count()
    }
}
