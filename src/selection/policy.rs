//! Default exclusion policy for new selection nodes.

use std::path::Path;

use globset::GlobSet;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use phf::phf_set;

use crate::config::{read_ignore_file, Config};

/// Directory names excluded by default wherever they appear.
pub static DEFAULT_EXCLUDED_DIRS: phf::Set<&'static str> = phf_set! {
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
    ".tox",
    "venv",
    ".venv",
    "env",
    "dist",
    "build",
    ".eggs",
    ".idea",
    ".vscode",
    ".next",
    ".gradle",
    "coverage",
    ".codelens",
};

/// Decides which paths start out excluded when a tree is built.
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    globs: GlobSet,
    gitignore: Option<Gitignore>,
    include_hidden: bool,
}

impl ExclusionPolicy {
    /// A policy using only the built-in directory list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the policy for `root` from the configuration, `.llmclignore`,
    /// extra command-line patterns and (if enabled) `.gitignore`.
    pub fn from_config(root: &Path, config: &Config, extra: &[String]) -> anyhow::Result<Self> {
        let mut patterns = read_ignore_file(root);
        patterns.extend(extra.iter().cloned());
        let globs = config.exclusion_globs(&patterns)?;

        let gitignore = if config.respect_gitignore {
            load_gitignore(root)
        } else {
            None
        };

        Ok(Self {
            globs,
            gitignore,
            include_hidden: config.include_hidden,
        })
    }

    pub fn with_globs(mut self, globs: GlobSet) -> Self {
        self.globs = globs;
        self
    }

    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Whether the entry at `rel` (relative to the tree root) is excluded by default.
    pub fn is_excluded(&self, rel: &Path, is_dir: bool) -> bool {
        let name = match rel.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => return false,
        };

        if is_dir && DEFAULT_EXCLUDED_DIRS.contains(name) {
            return true;
        }
        if !self.include_hidden && name.starts_with('.') {
            return true;
        }
        if self.globs.is_match(rel) {
            return true;
        }
        if let Some(gi) = &self.gitignore {
            if gi.matched_path_or_any_parents(rel, is_dir).is_ignore() {
                return true;
            }
        }
        false
    }
}

fn load_gitignore(root: &Path) -> Option<Gitignore> {
    let path = root.join(".gitignore");
    if !path.is_file() {
        return None;
    }
    let mut builder = GitignoreBuilder::new(root);
    if let Some(err) = builder.add(&path) {
        tracing::warn!(path = %path.display(), error = %err, "could not read .gitignore");
    }
    match builder.build() {
        Ok(gi) => Some(gi),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed .gitignore");
            None
        }
    }
}
