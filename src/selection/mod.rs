//! Interactive file selection.
//!
//! A [`SelectionTree`] mirrors the analyzed directory with a tri-state
//! inclusion flag per node. Directory states are derived from their
//! children; toggles record explicit decisions which [`SelectionStore`]
//! saves between runs.

mod menu;
mod policy;
mod store;
mod tree;

use std::path::PathBuf;

pub use menu::{run as run_menu, MenuOutcome};
pub use policy::{ExclusionPolicy, DEFAULT_EXCLUDED_DIRS};
pub use store::{SelectionRecord, SelectionStore, STATE_VERSION};
pub use tree::{
    IncludedPaths, Inclusion, NodeId, NodeKind, NodeState, RestoreReport, SelectionCounts,
    SelectionNode, SelectionTree,
};

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("no such path in selection: {}", .0.display())]
    UnknownPath(PathBuf),
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}
