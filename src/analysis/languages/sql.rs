//! Regex-based analyzer for T-SQL style scripts and introspected objects.
//!
//! SQL has no bundled grammar here; stored procedures, functions and views
//! are located with `CREATE` patterns and scored with a weighted keyword
//! count.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use phf::phf_set;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::aggregate::{FileAnalysis, SqlObjectAnalysis, SqlObjectKind, SqlParameter};
use crate::analysis::{todos, CommentFact};

/// Schema assumed when an object name is unqualified.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Words that follow FROM/JOIN/INTO but never name a table.
static NOT_TABLES: phf::Set<&'static str> = phf_set! {
    "null", "select", "where", "group", "order", "having", "exists", "between",
    "like", "in", "is", "not", "and", "or", "operation", "existing",
};

lazy_static! {
    static ref OBJECT_PATTERN: Regex = Regex::new(
        r#"(?i)\b(?:CREATE(?:\s+OR\s+(?:ALTER|REPLACE))?|ALTER)\s+(PROCEDURE|PROC|FUNCTION|VIEW)\s+((?:\[[^\]]+\]|[\w$#"]+)(?:\.(?:\[[^\]]+\]|[\w$#"]+))*)"#
    ).unwrap();

    /// Batch separator on its own line.
    static ref GO_PATTERN: Regex = Regex::new(r"(?im)^\s*GO\s*;?\s*$").unwrap();

    static ref DEPENDENCY_PATTERN: Regex = Regex::new(
        r"(?i)\b(?:FROM|JOIN|INTO|UPDATE|REFERENCES)\s+((?:\[[^\]]+\]|[A-Za-z_][\w$]*)(?:\.(?:\[[^\]]+\]|[A-Za-z_][\w$]*))*)(\s*[=@])?"
    ).unwrap();

    static ref COMMENT_PATTERN: Regex = Regex::new(r"--[^\r\n]*|/\*(?s:.*?)\*/").unwrap();

    /// Parameter list of a procedure or function header.
    static ref HEADER_PATTERN: Regex = Regex::new(
        r"(?is)\b(?:PROCEDURE|PROC|FUNCTION)\s+\S+?(\s*\(?.*?)\b(?:AS|RETURNS)\b"
    ).unwrap();

    static ref PARAM_PATTERN: Regex = Regex::new(
        r"(?i)@(\w+)\s+([A-Za-z_][\w.]*(?:\s*\([^)]*\))?)(?:\s*=\s*('[^']*'|[^,\s\r\n)]+))?"
    ).unwrap();

    static ref INLINE_COMMENT: Regex = Regex::new(r"^[^\r\n]*?--\s*([^\r\n]*)").unwrap();

    /// Keyword weights for the complexity estimate.
    static ref COMPLEXITY_WEIGHTS: Vec<(Regex, u32)> = vec![
        // control flow
        (Regex::new(r"(?i)\bif\b").unwrap(), 2),
        (Regex::new(r"(?i)\belse\b").unwrap(), 2),
        (Regex::new(r"(?i)\bcase\b").unwrap(), 2),
        (Regex::new(r"(?i)\bwhile\b").unwrap(), 3),
        (Regex::new(r"(?i)\bcursor\b").unwrap(), 4),
        // query shape
        (Regex::new(r"(?i)\bjoin\b").unwrap(), 2),
        (Regex::new(r"(?i)\bwhere\b").unwrap(), 2),
        (Regex::new(r"(?i)\bgroup\s+by\b").unwrap(), 2),
        (Regex::new(r"(?i)\bhaving\b").unwrap(), 3),
        (Regex::new(r"(?i)\bunion\b").unwrap(), 3),
        // transactions and error handling
        (Regex::new(r"(?i)\btransaction\b").unwrap(), 2),
        (Regex::new(r"(?i)\btry\b").unwrap(), 2),
        (Regex::new(r"(?i)\bcatch\b").unwrap(), 2),
    ];
}

/// Result of analyzing one `.sql` file.
#[derive(Debug, Clone)]
pub struct SqlFileReport {
    /// The file itself; owns the comments and TODOs.
    pub file: FileAnalysis,
    /// Objects created by the script.
    pub objects: Vec<SqlObjectAnalysis>,
}

/// SQL analyzer. Stateless; all patterns are compiled once.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlAnalyzer;

impl SqlAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn language_id(&self) -> &'static str {
        "sql"
    }

    pub fn file_extensions(&self) -> &'static [&'static str] {
        &["sql"]
    }

    pub fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }

    /// Analyze a script. Objects found in the file carry no comments of
    /// their own so that each comment is counted once, on the file.
    pub fn analyze_file(&self, rel_path: &str, source: &str) -> SqlFileReport {
        let comments = extract_comments(source);
        let (plain, todos) = todos::partition_comments(&comments);

        let mut file = FileAnalysis::new(rel_path, self.language_id());
        file.lines = source.lines().count();
        file.comment_lines = comments.iter().map(|c| c.lines).sum();
        file.comments = plain;
        file.todos = todos;

        let objects = extract_objects(source)
            .into_iter()
            .map(|(kind, qualified, definition)| {
                let (schema, name) = split_name(&qualified);
                let mut object = describe(schema, name, kind, definition);
                object.comments.clear();
                object.todos.clear();
                object
            })
            .collect();

        SqlFileReport { file, objects }
    }

    /// Fill in everything derivable from an object's definition.
    ///
    /// Parameters supplied by the caller (e.g. from catalog views) are kept;
    /// otherwise they are parsed from the header.
    pub fn enrich(&self, object: &mut SqlObjectAnalysis) {
        let derived = describe(
            object.schema.clone(),
            object.name.clone(),
            object.kind,
            object.definition.clone(),
        );
        object.lines = derived.lines;
        object.complexity = derived.complexity;
        object.dependencies.extend(derived.dependencies);
        object.comments = derived.comments;
        object.todos = derived.todos;
        if object.parameters.is_empty() {
            object.parameters = derived.parameters;
        }
    }
}

fn describe(schema: String, name: String, kind: SqlObjectKind, definition: String) -> SqlObjectAnalysis {
    let comments = extract_comments(&definition);
    let (plain, todos) = todos::partition_comments(&comments);
    let parameters = match kind {
        SqlObjectKind::View => Vec::new(),
        _ => extract_parameters(&definition),
    };

    SqlObjectAnalysis {
        lines: definition.lines().count(),
        complexity: estimate_complexity(&definition),
        dependencies: extract_dependencies(&definition),
        parameters,
        comments: plain,
        todos,
        schema,
        name,
        kind,
        definition,
        errors: Vec::new(),
    }
}

/// Weighted keyword count.
pub fn estimate_complexity(text: &str) -> u32 {
    COMPLEXITY_WEIGHTS
        .iter()
        .map(|(pattern, weight)| pattern.find_iter(text).count() as u32 * weight)
        .sum()
}

/// Tables and views referenced by FROM, JOIN, INTO, UPDATE and REFERENCES.
pub fn extract_dependencies(text: &str) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    for caps in DEPENDENCY_PATTERN.captures_iter(text) {
        // `UPDATE @t` or `SET x = ...` style false positives
        if caps.get(2).is_some() {
            continue;
        }
        let Some(raw) = caps.get(1) else { continue };
        let name = strip_quoting(raw.as_str());
        if NOT_TABLES.contains(name.to_lowercase().as_str()) {
            continue;
        }
        deps.insert(name);
    }
    deps
}

/// Parameters declared in a procedure or function header.
pub fn extract_parameters(definition: &str) -> Vec<SqlParameter> {
    let Some(header) = HEADER_PATTERN.captures(definition).and_then(|c| c.get(1)) else {
        return Vec::new();
    };
    let section = header.as_str();

    PARAM_PATTERN
        .captures_iter(section)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let description = INLINE_COMMENT
                .captures(&section[whole.end()..])
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|d| !d.is_empty());
            Some(SqlParameter {
                name: caps.get(1)?.as_str().to_string(),
                data_type: caps.get(2)?.as_str().split_whitespace().collect(),
                default: caps.get(3).map(|m| m.as_str().trim().to_string()),
                description,
            })
        })
        .collect()
}

fn extract_comments(text: &str) -> Vec<CommentFact> {
    let mut comments = Vec::new();
    for m in COMMENT_PATTERN.find_iter(text) {
        let raw = m.as_str();
        let body = if let Some(block) = raw.strip_prefix("/*") {
            block.strip_suffix("*/").unwrap_or(block)
        } else {
            raw.trim_start_matches('-')
        };
        let body = body.trim();
        // parameter annotations are not comments worth surfacing
        if body.is_empty() || body.starts_with('@') {
            continue;
        }
        comments.push(CommentFact {
            line: text[..m.start()].matches('\n').count() + 1,
            lines: raw.lines().count().max(1),
            text: body.to_string(),
        });
    }
    comments
}

/// (kind, qualified name, definition) for every object a script creates.
fn extract_objects(source: &str) -> Vec<(SqlObjectKind, String, String)> {
    let starts: Vec<_> = OBJECT_PATTERN.captures_iter(source).collect();
    let mut objects = Vec::new();

    for (i, caps) in starts.iter().enumerate() {
        let (Some(whole), Some(kind), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let start = whole.start();
        let next_object = starts
            .get(i + 1)
            .and_then(|c| c.get(0))
            .map_or(source.len(), |m| m.start());
        let end = GO_PATTERN
            .find(&source[start..next_object])
            .map_or(next_object, |m| start + m.start());

        let kind = match kind.as_str().to_ascii_uppercase().as_str() {
            "VIEW" => SqlObjectKind::View,
            "FUNCTION" => SqlObjectKind::Function,
            _ => SqlObjectKind::StoredProcedure,
        };
        objects.push((kind, name.as_str().to_string(), source[start..end].trim().to_string()));
    }

    objects
}

fn strip_quoting(name: &str) -> String {
    name.split('.')
        .map(|part| part.trim_matches(|c| c == '[' || c == ']' || c == '"'))
        .collect::<Vec<_>>()
        .join(".")
}

/// Split `[schema].[name]` into its parts, defaulting the schema.
fn split_name(qualified: &str) -> (String, String) {
    let plain = strip_quoting(qualified);
    match plain.rsplit_once('.') {
        Some((prefix, name)) => {
            let schema = prefix.rsplit('.').next().unwrap_or(DEFAULT_SCHEMA);
            (schema.to_string(), name.to_string())
        }
        None => (DEFAULT_SCHEMA.to_string(), plain),
    }
}

/// One object as found in an introspection dump.
#[derive(Debug, Deserialize)]
struct DumpedObject {
    #[serde(default = "default_schema")]
    schema: String,
    name: String,
    #[serde(default)]
    definition: String,
    #[serde(default)]
    parameters: Vec<SqlParameter>,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SqlDump {
    stored_procedures: Vec<serde_json::Value>,
    views: Vec<serde_json::Value>,
    functions: Vec<serde_json::Value>,
}

/// Load and enrich the objects in a JSON introspection dump.
///
/// The file must be a JSON object; entries inside it that do not describe
/// an object are skipped with a warning.
pub fn load_sql_dump(path: &Path) -> anyhow::Result<Vec<SqlObjectAnalysis>> {
    let content = fs::read_to_string(path)?;
    let dump: SqlDump = serde_json::from_str(&content)?;
    let analyzer = SqlAnalyzer::new();

    let groups = [
        (SqlObjectKind::StoredProcedure, dump.stored_procedures),
        (SqlObjectKind::View, dump.views),
        (SqlObjectKind::Function, dump.functions),
    ];

    let mut objects = Vec::new();
    for (kind, entries) in groups {
        for (index, entry) in entries.into_iter().enumerate() {
            let dumped: DumpedObject = match serde_json::from_value(entry) {
                Ok(d) => d,
                Err(e) => {
                    warn!(kind = kind.as_str(), index, error = %e, "skipping malformed SQL object");
                    continue;
                }
            };
            let mut object = SqlObjectAnalysis {
                schema: dumped.schema,
                name: dumped.name,
                kind,
                definition: dumped.definition,
                parameters: dumped.parameters,
                ..Default::default()
            };
            analyzer.enrich(&mut object);
            objects.push(object);
        }
    }

    Ok(objects)
}
