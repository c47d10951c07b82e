//! Configuration for codelens runs.
//!
//! A config file tunes where reports land, how large exported chunks may be,
//! which paths are excluded by default and the thresholds used by the
//! insight generator. Every field is optional; missing fields take the
//! built-in defaults and unknown keys are ignored.

use directories::ProjectDirs;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Config file names searched for in the analyzed root.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["codelens.yaml", ".codelens.yaml"];

/// Extra ignore file read from the analyzed root.
pub const IGNORE_FILE_NAME: &str = ".llmclignore";

/// Default token budget for one exported chunk.
pub const DEFAULT_MAX_TOKENS: usize = 100_000;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    /// Output directory, relative to the working directory.
    pub output: PathBuf,
    /// "txt" (default) or "json"
    pub format: String,
    /// Token budget for each exported chunk.
    pub max_tokens: usize,
    /// Glob patterns for paths excluded from the selection by default (e.g., "**/*.min.js").
    pub excluded_paths: Vec<String>,
    /// Whether hidden files and directories are offered for selection.
    pub include_hidden: bool,
    /// Whether `.gitignore` rules exclude paths by default.
    pub respect_gitignore: bool,
    /// Analyze files on the rayon pool.
    pub parallel: bool,
    pub insights: InsightThresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            output: PathBuf::from(".codelens"),
            format: "txt".to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            excluded_paths: Vec::new(),
            include_hidden: false,
            respect_gitignore: true,
            parallel: true,
            insights: InsightThresholds::default(),
        }
    }
}

/// Thresholds consumed by [`crate::insights::generate`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InsightThresholds {
    /// Documentation ratio (percent) below which a category is reported as poorly documented.
    pub low_doc_coverage: f64,
    /// Documentation ratio (percent) above which coverage is reported as good.
    pub good_doc_coverage: f64,
    /// TODOs per 1000 lines above which TODO density is reported.
    pub todo_density_per_kloc: f64,
    /// Comment lines / code lines below which comments are reported as sparse.
    /// Unset by default.
    pub min_comment_ratio: Option<f64>,
    /// Function length (lines) above which a function counts as long.
    pub complex_function_lines: usize,
    /// Parameter count above which a function is reported.
    pub many_params: usize,
    /// Minimum files in one directory for it to count as a major code group.
    pub major_group_files: usize,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            low_doc_coverage: 50.0,
            good_doc_coverage: 80.0,
            todo_density_per_kloc: 10.0,
            min_comment_ratio: None,
            complex_function_lines: 50,
            many_params: 5,
            major_group_files: 3,
        }
    }
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse_str(&content)
    }

    /// Parse a config from YAML text. An empty document yields the defaults.
    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Load the config for `root`: an explicit path wins, then a file in the
    /// root, then the user config directory, then the defaults.
    pub fn load(explicit: Option<&Path>, root: &Path) -> anyhow::Result<(Self, Option<PathBuf>)> {
        let found = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => discover(root),
        };

        match found {
            Some(path) => {
                let config = Self::parse_file(&path)
                    .map_err(|e| anyhow::anyhow!("error parsing config {}: {}", path.display(), e))?;
                validate(&config)?;
                Ok((config, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }

    /// Compile `excluded_paths` plus `extra` patterns into one matcher.
    ///
    /// Bare names without glob syntax match that name anywhere in the tree.
    pub fn exclusion_globs(&self, extra: &[String]) -> anyhow::Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in self.excluded_paths.iter().chain(extra) {
            for expanded in expand_pattern(pattern) {
                builder.add(Glob::new(&expanded)?);
            }
        }
        Ok(builder.build()?)
    }
}

/// Find a config file for `root`.
pub fn discover(root: &Path) -> Option<PathBuf> {
    for name in DEFAULT_CONFIG_NAMES {
        let path = root.join(name);
        if path.is_file() {
            return Some(path);
        }
    }

    let user = ProjectDirs::from("", "", "codelens")?
        .config_dir()
        .join("config.yaml");
    user.is_file().then_some(user)
}

/// Read extra exclusion patterns from `.llmclignore` in `root`.
///
/// Blank lines and `#` comments are skipped. A missing file yields no patterns.
pub fn read_ignore_file(root: &Path) -> Vec<String> {
    let path = root.join(IGNORE_FILE_NAME);
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read ignore file");
            return Vec::new();
        }
    };

    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn expand_pattern(pattern: &str) -> Vec<String> {
    let trimmed = pattern.trim_end_matches('/');
    let has_glob = trimmed.contains(['*', '?', '[', '{']);
    if has_glob || trimmed.contains('/') {
        vec![trimmed.to_string(), format!("{}/**", trimmed)]
    } else {
        vec![
            format!("**/{}", trimmed),
            format!("**/{}/**", trimmed),
        ]
    }
}

/// Validate a config for correctness.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.format != "txt" && config.format != "json" {
        anyhow::bail!("invalid format {:?}, must be 'txt' or 'json'", config.format);
    }

    if config.max_tokens == 0 {
        anyhow::bail!("max_tokens must be positive");
    }

    for pattern in &config.excluded_paths {
        Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid excluded_paths pattern {:?}: {}", pattern, e))?;
    }

    let t = &config.insights;
    if t.low_doc_coverage > t.good_doc_coverage {
        anyhow::bail!(
            "insights.low_doc_coverage ({}) exceeds insights.good_doc_coverage ({})",
            t.low_doc_coverage,
            t.good_doc_coverage
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
output: out
format: json
max_tokens: 5000
excluded_paths:
  - "**/*.min.js"
insights:
  low_doc_coverage: 40
  min_comment_ratio: 0.1
some_future_key: true
"#;
        let config = Config::parse_str(yaml).unwrap();
        assert_eq!(config.output, PathBuf::from("out"));
        assert_eq!(config.format, "json");
        assert_eq!(config.max_tokens, 5000);
        assert_eq!(config.insights.low_doc_coverage, 40.0);
        assert_eq!(config.insights.good_doc_coverage, 80.0);
        assert_eq!(config.insights.min_comment_ratio, Some(0.1));
        assert!(config.respect_gitignore);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::parse_str("   \n").unwrap();
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.format, "txt");
    }

    #[test]
    fn test_validate_rejects_bad_format() {
        let config = Config {
            format: "xml".to_string(),
            ..Default::default()
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_exclusion_globs_bare_names() {
        let config = Config {
            excluded_paths: vec!["**/*.min.js".to_string()],
            ..Default::default()
        };
        let globs = config.exclusion_globs(&["fixtures".to_string()]).unwrap();
        assert!(globs.is_match("web/app.min.js"));
        assert!(globs.is_match("tests/fixtures"));
        assert!(globs.is_match("tests/fixtures/data.json"));
        assert!(!globs.is_match("src/main.py"));
    }

    #[test]
    fn test_read_ignore_file() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(IGNORE_FILE_NAME),
            "# generated\nfixtures\n\n*.log\n",
        )
        .unwrap();
        let patterns = read_ignore_file(temp.path());
        assert_eq!(patterns, vec!["fixtures".to_string(), "*.log".to_string()]);
    }

    #[test]
    fn test_discover_in_root() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("codelens.yaml"), "max_tokens: 10\n").unwrap();
        let (config, path) = Config::load(None, temp.path()).unwrap();
        assert_eq!(config.max_tokens, 10);
        assert_eq!(path, Some(temp.path().join("codelens.yaml")));
    }
}
