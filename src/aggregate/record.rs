//! Per-source analysis records.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Count of items in one category, with the documented and complex subsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryMetrics {
    pub count: usize,
    pub documented: usize,
    pub complex: usize,
}

impl CategoryMetrics {
    pub fn add(&mut self, other: &CategoryMetrics) {
        self.count += other.count;
        self.documented += other.documented;
        self.complex += other.complex;
    }

    /// Documented share in percent, or `None` when the category is empty.
    pub fn doc_ratio(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.documented as f64 / self.count as f64 * 100.0)
        }
    }

    pub fn undocumented(&self) -> usize {
        self.count.saturating_sub(self.documented)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoPriority {
    #[default]
    Low,
    Medium,
    High,
}

impl TodoPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoPriority::Low => "low",
            TodoPriority::Medium => "medium",
            TodoPriority::High => "high",
        }
    }
}

impl fmt::Display for TodoPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A TODO/FIXME style marker found in a comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Todo {
    pub line: usize,
    pub text: String,
    pub priority: TodoPriority,
}

/// A comment worth surfacing in the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Comment {
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionInfo {
    pub name: String,
    pub line: usize,
    pub params: usize,
    pub lines: usize,
    pub complexity: u32,
    pub documented: bool,
    /// Enclosing type for methods.
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassInfo {
    pub name: String,
    /// "class", "struct", "enum", "trait", "interface"
    pub kind: String,
    pub line: usize,
    pub methods: usize,
    pub documented: bool,
}

/// Analysis of one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAnalysis {
    /// Path relative to the analyzed root, `/`-separated.
    pub path: String,
    pub language: String,
    pub lines: usize,
    pub comment_lines: usize,
    pub functions: CategoryMetrics,
    pub classes: CategoryMetrics,
    pub imports: BTreeSet<String>,
    pub function_details: Vec<FunctionInfo>,
    pub class_details: Vec<ClassInfo>,
    pub todos: Vec<Todo>,
    pub comments: Vec<Comment>,
    pub is_entry_point: bool,
    pub is_core: bool,
    pub errors: Vec<String>,
}

impl FileAnalysis {
    pub fn new(path: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language: language.into(),
            ..Default::default()
        }
    }

    /// Zero record standing in for a file whose analysis failed.
    pub fn failed(path: impl Into<String>, language: impl Into<String>, error: impl fmt::Display) -> Self {
        let mut record = Self::new(path, language);
        record.errors.push(error.to_string());
        record
    }

    /// Extension used for per-type counts; "(none)" when absent.
    pub fn file_type(&self) -> String {
        Path::new(&self.path)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "(none)".to_string())
    }

    /// Directory containing the file, "." for files at the root.
    pub fn directory(&self) -> String {
        match self.path.rsplit_once('/') {
            Some((dir, _)) if !dir.is_empty() => dir.to_string(),
            _ => ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlObjectKind {
    #[default]
    StoredProcedure,
    View,
    Function,
}

impl SqlObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlObjectKind::StoredProcedure => "stored procedure",
            SqlObjectKind::View => "view",
            SqlObjectKind::Function => "function",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlParameter {
    pub name: String,
    pub data_type: String,
    pub default: Option<String>,
    pub description: Option<String>,
}

/// Analysis of one database object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlObjectAnalysis {
    pub schema: String,
    pub name: String,
    pub kind: SqlObjectKind,
    pub definition: String,
    pub lines: usize,
    pub complexity: u32,
    pub parameters: Vec<SqlParameter>,
    pub dependencies: BTreeSet<String>,
    pub todos: Vec<Todo>,
    pub comments: Vec<Comment>,
    pub errors: Vec<String>,
}

impl SqlObjectAnalysis {
    /// `schema.name`, or just the name when no schema is known.
    pub fn qualified_name(&self) -> String {
        if self.schema.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }
}

/// One analyzed source unit, tagged by where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AnalysisRecord {
    File(FileAnalysis),
    Sql(SqlObjectAnalysis),
}

impl AnalysisRecord {
    /// Unique key of the record: the file path, or `sql:` plus the
    /// qualified object name.
    pub fn identifier(&self) -> String {
        match self {
            AnalysisRecord::File(f) => f.path.clone(),
            AnalysisRecord::Sql(s) => format!("sql:{}", s.qualified_name()),
        }
    }

    pub fn lines(&self) -> usize {
        match self {
            AnalysisRecord::File(f) => f.lines,
            AnalysisRecord::Sql(s) => s.lines,
        }
    }

    pub fn todos(&self) -> &[Todo] {
        match self {
            AnalysisRecord::File(f) => &f.todos,
            AnalysisRecord::Sql(s) => &s.todos,
        }
    }

    pub fn errors(&self) -> &[String] {
        match self {
            AnalysisRecord::File(f) => &f.errors,
            AnalysisRecord::Sql(s) => &s.errors,
        }
    }
}

impl From<FileAnalysis> for AnalysisRecord {
    fn from(f: FileAnalysis) -> Self {
        AnalysisRecord::File(f)
    }
}

impl From<SqlObjectAnalysis> for AnalysisRecord {
    fn from(s: SqlObjectAnalysis) -> Self {
        AnalysisRecord::Sql(s)
    }
}
