//! Saved selection decisions.
//!
//! Only explicit decisions are stored; everything else is rebuilt from the
//! filesystem and the exclusion policy. Files live under the user data
//! directory (`selections/<root>.json`) unless a path is given.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::warn;

use super::tree::{Inclusion, RestoreReport, SelectionTree};

pub const STATE_VERSION: u32 = 1;

/// On-disk form of the saved decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionRecord {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub root: String,
    #[serde(default)]
    pub decisions: BTreeMap<String, Value>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl SelectionRecord {
    pub fn from_tree(tree: &SelectionTree) -> Self {
        let decisions = tree
            .explicit_decisions()
            .into_iter()
            .map(|(path, decision)| (path, serde_json::to_value(decision).unwrap_or(Value::Null)))
            .collect();
        Self {
            version: STATE_VERSION,
            root: tree.root().to_string_lossy().to_string(),
            decisions,
        }
    }

    /// Decisions this version understands. Other values are skipped.
    pub fn decisions(&self) -> BTreeMap<String, Inclusion> {
        let mut out = BTreeMap::new();
        for (path, value) in &self.decisions {
            match serde_json::from_value::<Inclusion>(value.clone()) {
                Ok(decision) => {
                    out.insert(path.clone(), decision);
                }
                Err(_) => warn!(path = %path, value = %value, "skipping unrecognized saved decision"),
            }
        }
        out
    }
}

/// Reads and writes selection records for one tree root.
pub struct SelectionStore {
    path: PathBuf,
}

impl SelectionStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Store under the user data directory, keyed by the root path.
    pub fn for_root(root: &Path) -> Option<Self> {
        let dirs = ProjectDirs::from("", "", "codelens")?;
        let canonical = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let key = canonical
            .to_string_lossy()
            .trim_start_matches('/')
            .replace([':', '/', '\\'], "_");
        Some(Self::new(
            dirs.data_dir().join("selections").join(format!("{}.json", key)),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved record. A missing file yields `None`; an unreadable or
    /// corrupt file is logged and also yields `None`.
    pub fn load(&self) -> Option<SelectionRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read saved selection");
                return None;
            }
        };

        match serde_json::from_str::<SelectionRecord>(&content) {
            Ok(record) => {
                if record.version > STATE_VERSION {
                    warn!(
                        version = record.version,
                        "saved selection is from a newer version, reading best-effort"
                    );
                }
                Some(record)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring corrupt saved selection");
                None
            }
        }
    }

    /// Apply the saved decisions to `tree`.
    pub fn restore(&self, tree: &mut SelectionTree) -> RestoreReport {
        match self.load() {
            Some(record) => tree.apply_decisions(&record.decisions()),
            None => RestoreReport::default(),
        }
    }

    /// Write the tree's explicit decisions. The file is replaced atomically.
    pub fn persist(&self, tree: &SelectionTree) -> anyhow::Result<()> {
        let record = SelectionRecord::from_tree(tree);
        let bytes = serde_json::to_vec_pretty(&record).context("serialize selection")?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .with_context(|| format!("create selection dir {}", parent.display()))?;

        let mut tmp = NamedTempFile::new_in(&parent)
            .with_context(|| format!("create temp file in {}", parent.display()))?;
        tmp.write_all(&bytes).context("write selection")?;
        tmp.as_file().sync_all().context("sync selection")?;
        tmp.persist(&self.path)
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }
}
