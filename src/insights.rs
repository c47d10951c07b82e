//! Human-readable observations derived from a [`ProjectSummary`].
//!
//! Insights come out in a fixed category order so the same summary always
//! yields the same list. Categories with nothing to say are skipped, and an
//! empty summary yields no insights at all.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::aggregate::{FileAnalysis, ProjectSummary, COMPLEX_SQL_THRESHOLD};
use crate::config::InsightThresholds;

/// Fixed limits not exposed in the config file.
pub mod limits {
    /// Functions above this cyclomatic complexity are reported as complex.
    pub const COMPLEX_FUNCTION: u32 = 5;
    /// Files importing more modules than this are listed.
    pub const MANY_IMPORTS: usize = 5;
    /// Longest list of names spelled out in one insight.
    pub const MAX_LISTED: usize = 10;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    Overview,
    Documentation,
    Maintenance,
    Complexity,
    Structure,
    Database,
    Conventions,
    Comments,
    Errors,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Insight {
    pub category: InsightCategory,
    pub message: String,
}

impl Insight {
    fn new(category: InsightCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Derive insights from `summary`.
pub fn generate(summary: &ProjectSummary, thresholds: &InsightThresholds) -> Vec<Insight> {
    let mut out = Vec::new();
    if summary.is_empty() {
        return out;
    }

    overview(summary, &mut out);
    documentation(summary, thresholds, &mut out);
    maintenance(summary, thresholds, &mut out);
    complexity(summary, thresholds, &mut out);
    structure(summary, thresholds, &mut out);
    database(summary, &mut out);
    conventions(summary, &mut out);
    comments(summary, thresholds, &mut out);
    errors(summary, &mut out);
    out
}

fn overview(summary: &ProjectSummary, out: &mut Vec<Insight>) {
    let stats = &summary.project_stats;
    let mut msg = String::new();
    if stats.total_files > 0 {
        msg = format!(
            "Analyzed {} {} ({} lines of code)",
            stats.total_files,
            plural(stats.total_files, "file", "files"),
            stats.lines_of_code
        );
    }
    if stats.total_sql_objects > 0 {
        let sql = format!(
            "{} SQL {}",
            stats.total_sql_objects,
            plural(stats.total_sql_objects, "object", "objects")
        );
        msg = if msg.is_empty() {
            format!("Analyzed {}", sql)
        } else {
            format!("{} and {}", msg, sql)
        };
    }
    if !msg.is_empty() {
        out.push(Insight::new(InsightCategory::Overview, msg));
    }
}

fn documentation(summary: &ProjectSummary, t: &InsightThresholds, out: &mut Vec<Insight>) {
    let categories = [
        ("functions", &summary.code_metrics.functions),
        ("classes", &summary.code_metrics.classes),
    ];
    for (name, metrics) in categories {
        let ratio = match metrics.doc_ratio() {
            Some(r) => r,
            None => continue,
        };
        if ratio < t.low_doc_coverage {
            out.push(Insight::new(
                InsightCategory::Documentation,
                format!(
                    "Low documentation coverage for {}: {:.1}% ({} {} lack documentation)",
                    name,
                    ratio,
                    metrics.undocumented(),
                    name
                ),
            ));
        } else if ratio >= t.good_doc_coverage {
            out.push(Insight::new(
                InsightCategory::Documentation,
                format!("Good documentation coverage for {}: {:.1}%", name, ratio),
            ));
        }
    }
}

fn maintenance(summary: &ProjectSummary, t: &InsightThresholds, out: &mut Vec<Insight>) {
    let todos = summary.maintenance.todos.len();
    if todos == 0 {
        return;
    }

    let mut sources: Vec<&str> = summary
        .maintenance
        .todos
        .iter()
        .map(|n| n.source.as_str())
        .collect();
    sources.sort_unstable();
    sources.dedup();
    out.push(Insight::new(
        InsightCategory::Maintenance,
        format!(
            "Found {} {} across {} {}",
            todos,
            plural(todos, "TODO", "TODOs"),
            sources.len(),
            plural(sources.len(), "source", "sources")
        ),
    ));

    let high = summary.high_priority_todos();
    if high > 0 {
        out.push(Insight::new(
            InsightCategory::Maintenance,
            format!("{} high-priority {}", high, plural(high, "TODO", "TODOs")),
        ));
    }

    if let Some(density) = summary.todo_density() {
        if density > t.todo_density_per_kloc {
            out.push(Insight::new(
                InsightCategory::Maintenance,
                format!("High TODO density: {:.1} per 1000 lines", density),
            ));
        }
    }
}

fn complexity(summary: &ProjectSummary, t: &InsightThresholds, out: &mut Vec<Insight>) {
    let mut complex = Vec::new();
    let mut many_params = Vec::new();
    for file in summary.files() {
        for func in &file.function_details {
            let label = format!("{} in {}", func.name, file.path);
            if func.complexity > limits::COMPLEX_FUNCTION || func.lines > t.complex_function_lines {
                complex.push(label.clone());
            }
            if func.params > t.many_params {
                many_params.push(label);
            }
        }
    }

    if !complex.is_empty() {
        out.push(Insight::new(
            InsightCategory::Complexity,
            format!(
                "Complex functions (complexity > {} or > {} lines): {}",
                limits::COMPLEX_FUNCTION,
                t.complex_function_lines,
                listing(&complex)
            ),
        ));
    }
    if !many_params.is_empty() {
        out.push(Insight::new(
            InsightCategory::Complexity,
            format!(
                "Functions with many parameters (> {}): {}",
                t.many_params,
                listing(&many_params)
            ),
        ));
    }
}

fn structure(summary: &ProjectSummary, t: &InsightThresholds, out: &mut Vec<Insight>) {
    let s = &summary.structure;
    if !s.entry_points.is_empty() {
        out.push(Insight::new(
            InsightCategory::Structure,
            format!("Potential entry points: {}", listing(&s.entry_points)),
        ));
    }
    if !s.core_files.is_empty() {
        out.push(Insight::new(
            InsightCategory::Structure,
            format!("Core files: {}", listing(&s.core_files)),
        ));
    }

    let mut groups: BTreeMap<String, usize> = BTreeMap::new();
    for file in summary.files() {
        *groups.entry(file.directory()).or_insert(0) += 1;
    }
    let major: Vec<String> = groups
        .iter()
        .filter(|(_, n)| **n >= t.major_group_files)
        .map(|(dir, n)| format!("{} ({} files)", dir, n))
        .collect();
    if !major.is_empty() {
        out.push(Insight::new(
            InsightCategory::Structure,
            format!("Major code groups: {}", listing(&major)),
        ));
    }

    let heavy: Vec<String> = summary
        .files()
        .filter(|f| f.imports.len() > limits::MANY_IMPORTS)
        .map(|f| f.path.clone())
        .collect();
    if !heavy.is_empty() {
        out.push(Insight::new(
            InsightCategory::Structure,
            format!(
                "Files with many imports (> {}): {}",
                limits::MANY_IMPORTS,
                listing(&heavy)
            ),
        ));
    }

    let external = external_dependencies(summary);
    if !external.is_empty() {
        out.push(Insight::new(
            InsightCategory::Structure,
            format!("Main external dependencies: {}", listing(&external)),
        ));
    }

    let cycles = import_cycles(summary);
    if !cycles.is_empty() {
        out.push(Insight::new(
            InsightCategory::Structure,
            format!("Potential circular dependencies: {}", listing(&cycles)),
        ));
    }
}

// =============================================================================
// Import resolution
// =============================================================================

/// Extensions tried when resolving `./` and `../` imports.
const SCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Top-level package names imported from outside the project, sorted.
fn external_dependencies(summary: &ProjectSummary) -> Vec<String> {
    let mut local = BTreeSet::new();
    for file in summary.files() {
        if let Some((top, _)) = file.path.split_once('/') {
            local.insert(top);
        }
        let name = file.path.rsplit('/').next().unwrap_or(&file.path);
        local.insert(name.split_once('.').map_or(name, |(stem, _)| stem));
    }

    summary
        .code_metrics
        .imports
        .unique
        .iter()
        .filter_map(|import| package_name(import))
        .filter(|name| !local.contains(name))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Package an import names: `os` for `os.path`, `std` for `std::env`,
/// `@scope/pkg` for `@scope/pkg/sub`. `None` for relative and crate-local
/// paths.
fn package_name(import: &str) -> Option<&str> {
    let import = import.trim();
    if !import.starts_with(|c: char| c.is_alphanumeric() || c == '_' || c == '@') {
        return None;
    }
    if let Some((head, _)) = import.split_once("::") {
        return match head {
            "crate" | "self" | "super" => None,
            _ => Some(head),
        };
    }
    if import.contains('/') {
        let mut parts = import.split('/');
        let first = parts.next()?;
        if first.starts_with('@') {
            let second = parts.next()?;
            return Some(&import[..first.len() + 1 + second.len()]);
        }
        return Some(first);
    }
    import.split(|c: char| c == '.' || c.is_whitespace()).next()
}

/// Pairs of files whose relative imports resolve to each other.
fn import_cycles(summary: &ProjectSummary) -> Vec<String> {
    let known: BTreeSet<&str> = summary.files().map(|f| f.path.as_str()).collect();
    let mut edges: BTreeSet<(&str, String)> = BTreeSet::new();
    for file in summary.files() {
        for import in &file.imports {
            if let Some(target) = resolve_relative(&file.path, import, &known) {
                if target != file.path {
                    edges.insert((file.path.as_str(), target));
                }
            }
        }
    }

    edges
        .iter()
        .filter(|(from, to)| {
            *from < to.as_str() && edges.iter().any(|(f, t)| *f == to.as_str() && t == from)
        })
        .map(|(from, to)| format!("{} <-> {}", from, to))
        .collect()
}

/// The analyzed file a relative import in `from` points at, if any.
///
/// Handles `./x` and `../x` script imports and Python's leading-dot
/// module imports.
fn resolve_relative(from: &str, import: &str, known: &BTreeSet<&str>) -> Option<String> {
    let dir = from.rsplit_once('/').map_or("", |(dir, _)| dir);

    let candidates: Vec<String> = if import.starts_with("./") || import.starts_with("../") {
        let base = join_segments(dir, import.split('/'))?;
        std::iter::once(base.clone())
            .chain(SCRIPT_EXTENSIONS.iter().map(|ext| format!("{}.{}", base, ext)))
            .chain(
                SCRIPT_EXTENSIONS
                    .iter()
                    .map(|ext| child(&base, &format!("index.{}", ext))),
            )
            .collect()
    } else if import.starts_with('.') {
        let dots = import.chars().take_while(|&c| c == '.').count();
        let ups = std::iter::repeat("..").take(dots - 1);
        let module = ups.chain(import[dots..].split('.'));
        let base = join_segments(dir, module)?;
        let mut candidates = vec![child(&base, "__init__.py")];
        if !base.is_empty() {
            candidates.insert(0, format!("{}.py", base));
        }
        candidates
    } else {
        return None;
    };

    candidates.into_iter().find(|c| known.contains(c.as_str()))
}

/// Apply `segments` to `dir`; `None` when `..` climbs above the root.
fn join_segments<'a>(dir: &'a str, segments: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut parts: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    Some(parts.join("/"))
}

fn child(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

fn database(summary: &ProjectSummary, out: &mut Vec<Insight>) {
    let sql = &summary.code_metrics.sql_objects;
    if sql.total() == 0 {
        return;
    }

    let mut parts = Vec::new();
    if sql.stored_procedures > 0 {
        parts.push(format!(
            "{} stored {}",
            sql.stored_procedures,
            plural(sql.stored_procedures, "procedure", "procedures")
        ));
    }
    if sql.views > 0 {
        parts.push(format!("{} {}", sql.views, plural(sql.views, "view", "views")));
    }
    if sql.functions > 0 {
        parts.push(format!(
            "{} {}",
            sql.functions,
            plural(sql.functions, "function", "functions")
        ));
    }
    out.push(Insight::new(
        InsightCategory::Database,
        format!("Database objects: {}", parts.join(", ")),
    ));

    let complex: Vec<String> = summary
        .sql_objects()
        .filter(|o| o.complexity > COMPLEX_SQL_THRESHOLD)
        .map(|o| o.qualified_name())
        .collect();
    if !complex.is_empty() {
        out.push(Insight::new(
            InsightCategory::Database,
            format!(
                "Complex SQL objects (complexity > {}): {}",
                COMPLEX_SQL_THRESHOLD,
                listing(&complex)
            ),
        ));
    }
}

fn conventions(summary: &ProjectSummary, out: &mut Vec<Insight>) {
    let functions: Vec<&str> = summary
        .files()
        .flat_map(|f| f.function_details.iter().map(|d| d.name.as_str()))
        .collect();
    let types: Vec<&str> = summary
        .files()
        .flat_map(|f: &FileAnalysis| f.class_details.iter().map(|c| c.name.as_str()))
        .collect();

    if !functions.is_empty() {
        let snake = functions.iter().filter(|n| n.contains('_')).count();
        let camel = functions
            .iter()
            .filter(|n| !n.contains('_') && n.chars().any(|c| c.is_ascii_uppercase()))
            .count();
        if snake > camel * 2 && snake > 0 {
            out.push(Insight::new(
                InsightCategory::Conventions,
                "Consistent use of snake_case for function names",
            ));
        } else if camel > snake * 2 && camel > 0 {
            out.push(Insight::new(
                InsightCategory::Conventions,
                "Consistent use of camelCase for function names",
            ));
        }
    }

    if !types.is_empty() {
        let pascal = types
            .iter()
            .filter(|n| n.starts_with(|c: char| c.is_ascii_uppercase()) && !n.contains('_'))
            .count();
        if pascal as f64 > types.len() as f64 * 0.8 {
            out.push(Insight::new(
                InsightCategory::Conventions,
                "Consistent use of PascalCase for type names",
            ));
        }
    }
}

fn comments(summary: &ProjectSummary, t: &InsightThresholds, out: &mut Vec<Insight>) {
    let (min, ratio) = match (t.min_comment_ratio, summary.comment_ratio()) {
        (Some(min), Some(ratio)) => (min, ratio),
        _ => return,
    };
    if ratio < min {
        out.push(Insight::new(
            InsightCategory::Comments,
            format!(
                "Low comment ratio: {:.1}% of lines are comments (minimum {:.1}%)",
                ratio * 100.0,
                min * 100.0
            ),
        ));
    }
}

fn errors(summary: &ProjectSummary, out: &mut Vec<Insight>) {
    let mut failed: Vec<String> = summary
        .maintenance
        .errors
        .iter()
        .map(|e| e.source.clone())
        .collect();
    failed.sort();
    failed.dedup();
    if failed.is_empty() {
        return;
    }
    out.push(Insight::new(
        InsightCategory::Errors,
        format!(
            "Analysis failed for {} {}: {}",
            failed.len(),
            plural(failed.len(), "source", "sources"),
            listing(&failed)
        ),
    ));
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

fn listing(items: &[String]) -> String {
    if items.len() <= limits::MAX_LISTED {
        items.join(", ")
    } else {
        format!(
            "{} and {} more",
            items[..limits::MAX_LISTED].join(", "),
            items.len() - limits::MAX_LISTED
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{
        combine, AnalysisRecord, ClassInfo, FunctionInfo, SqlObjectAnalysis, SqlObjectKind, Todo,
        TodoPriority,
    };

    fn func(name: &str, complexity: u32, params: usize, documented: bool) -> FunctionInfo {
        FunctionInfo {
            name: name.to_string(),
            line: 1,
            params,
            lines: 10,
            complexity,
            documented,
            owner: None,
        }
    }

    fn file(path: &str, funcs: Vec<FunctionInfo>) -> AnalysisRecord {
        let mut f = FileAnalysis::new(path, "python");
        f.lines = 100;
        f.comment_lines = 2;
        f.functions.count = funcs.len();
        f.functions.documented = funcs.iter().filter(|x| x.documented).count();
        f.function_details = funcs;
        f.into()
    }

    fn messages(insights: &[Insight]) -> Vec<String> {
        insights.iter().map(|i| i.message.clone()).collect()
    }

    #[test]
    fn test_empty_summary_no_insights() {
        let insights = generate(&ProjectSummary::default(), &InsightThresholds::default());
        assert!(insights.is_empty());
    }

    #[test]
    fn test_low_documentation() {
        let summary = combine(vec![file(
            "app.py",
            vec![
                func("load_data", 1, 1, false),
                func("save_data", 1, 1, false),
                func("run_all", 1, 1, true),
            ],
        )]);
        let msgs = messages(&generate(&summary, &InsightThresholds::default()));
        assert_eq!(msgs[0], "Analyzed 1 file (100 lines of code)");
        assert!(msgs
            .iter()
            .any(|m| m.contains("Low documentation coverage for functions") && m.contains("2 functions lack documentation")));
        assert!(msgs.contains(&"Consistent use of snake_case for function names".to_string()));
    }

    #[test]
    fn test_complexity_and_params() {
        let summary = combine(vec![file(
            "core.py",
            vec![func("tangled", 9, 2, true), func("wide", 1, 7, true)],
        )]);
        let msgs = messages(&generate(&summary, &InsightThresholds::default()));
        assert!(msgs.iter().any(|m| m.starts_with("Complex functions") && m.contains("tangled in core.py")));
        assert!(msgs.iter().any(|m| m.starts_with("Functions with many parameters") && m.contains("wide in core.py")));
        assert!(msgs.iter().any(|m| m.starts_with("Good documentation coverage for functions")));
    }

    #[test]
    fn test_todo_density_and_priority() {
        let mut f = FileAnalysis::new("a.py", "python");
        f.lines = 100;
        for i in 0..3 {
            f.todos.push(Todo {
                line: i,
                text: "FIXME: broken".to_string(),
                priority: TodoPriority::High,
            });
        }
        let summary = combine(vec![f.into()]);
        let msgs = messages(&generate(&summary, &InsightThresholds::default()));
        assert!(msgs.contains(&"Found 3 TODOs across 1 source".to_string()));
        assert!(msgs.contains(&"3 high-priority TODOs".to_string()));
        assert!(msgs.contains(&"High TODO density: 30.0 per 1000 lines".to_string()));
    }

    #[test]
    fn test_comment_ratio_only_when_configured() {
        let summary = combine(vec![file("a.py", vec![])]);
        let defaults = InsightThresholds::default();
        assert!(generate(&summary, &defaults)
            .iter()
            .all(|i| i.category != InsightCategory::Comments));

        let strict = InsightThresholds {
            min_comment_ratio: Some(0.1),
            ..Default::default()
        };
        let insights = generate(&summary, &strict);
        let comment = insights
            .iter()
            .find(|i| i.category == InsightCategory::Comments)
            .unwrap();
        assert_eq!(
            comment.message,
            "Low comment ratio: 2.0% of lines are comments (minimum 10.0%)"
        );
    }

    #[test]
    fn test_sql_and_pascal_case() {
        let mut f = FileAnalysis::new("models.py", "python");
        f.class_details.push(ClassInfo {
            name: "UserModel".to_string(),
            kind: "class".to_string(),
            line: 1,
            methods: 0,
            documented: true,
        });
        f.classes.count = 1;
        f.classes.documented = 1;
        let proc_ = SqlObjectAnalysis {
            schema: "dbo".to_string(),
            name: "Reconcile".to_string(),
            kind: SqlObjectKind::StoredProcedure,
            complexity: 12,
            ..Default::default()
        };
        let view = SqlObjectAnalysis {
            schema: "dbo".to_string(),
            name: "ActiveUsers".to_string(),
            kind: SqlObjectKind::View,
            ..Default::default()
        };
        let summary = combine(vec![f.into(), proc_.into(), view.into()]);
        let msgs = messages(&generate(&summary, &InsightThresholds::default()));
        assert_eq!(msgs[0], "Analyzed 1 file (0 lines of code) and 2 SQL objects");
        assert!(msgs.contains(&"Database objects: 1 stored procedure, 1 view".to_string()));
        assert!(msgs.contains(&"Complex SQL objects (complexity > 5): dbo.Reconcile".to_string()));
        assert!(msgs.contains(&"Consistent use of PascalCase for type names".to_string()));
    }

    #[test]
    fn test_failed_files_reported() {
        let failed = FileAnalysis::failed("bad.py", "python", "parse error");
        let summary = combine(vec![failed.into()]);
        let insights = generate(&summary, &InsightThresholds::default());
        let last = insights.last().unwrap();
        assert_eq!(last.category, InsightCategory::Errors);
        assert_eq!(last.message, "Analysis failed for 1 source: bad.py");
    }

    #[test]
    fn test_deterministic() {
        let records = vec![
            file("a/x.py", vec![func("f", 1, 1, false)]),
            file("a/y.py", vec![func("g", 1, 1, false)]),
            file("a/z.py", vec![]),
        ];
        let t = InsightThresholds::default();
        let first = generate(&combine(records.clone()), &t);
        let mut reversed = records;
        reversed.reverse();
        let second = generate(&combine(reversed), &t);
        assert_eq!(
            first.iter().filter(|i| i.category == InsightCategory::Structure).count(),
            1
        );
        assert_eq!(messages(&first)[..2], messages(&second)[..2]);
    }

    fn with_imports(path: &str, imports: &[&str]) -> AnalysisRecord {
        let mut f = FileAnalysis::new(path, "python");
        f.lines = 10;
        f.imports = imports.iter().map(|i| i.to_string()).collect();
        f.into()
    }

    #[test]
    fn test_package_names() {
        assert_eq!(package_name("os.path"), Some("os"));
        assert_eq!(package_name("std::collections::HashMap"), Some("std"));
        assert_eq!(package_name("serde as json"), Some("serde"));
        assert_eq!(package_name("fs/promises"), Some("fs"));
        assert_eq!(package_name("@tanstack/query/core"), Some("@tanstack/query"));
        assert_eq!(package_name("./utils"), None);
        assert_eq!(package_name("..models"), None);
        assert_eq!(package_name("crate::config::Config"), None);
        assert_eq!(package_name("super::helpers"), None);
    }

    #[test]
    fn test_external_dependencies_skip_local_modules() {
        let summary = combine(vec![
            with_imports("pkg/api.py", &["requests", "os.path", ".models", "pkg.models"]),
            with_imports("pkg/models.py", &["sqlalchemy.orm", "os"]),
            with_imports("web/app.ts", &["react", "./api", "@tanstack/query/core"]),
        ]);
        let msgs = messages(&generate(&summary, &InsightThresholds::default()));
        assert!(msgs.contains(
            &"Main external dependencies: @tanstack/query, os, react, requests, sqlalchemy".to_string()
        ));
    }

    #[test]
    fn test_relative_import_resolution() {
        let known: BTreeSet<&str> = [
            "pkg/api.py",
            "pkg/models.py",
            "pkg/__init__.py",
            "lib/util.py",
            "web/app.ts",
            "web/store/index.js",
            "src/utils.js",
        ]
        .into_iter()
        .collect();

        assert_eq!(resolve_relative("pkg/api.py", ".models", &known).as_deref(), Some("pkg/models.py"));
        assert_eq!(resolve_relative("pkg/api.py", ".", &known).as_deref(), Some("pkg/__init__.py"));
        assert_eq!(resolve_relative("pkg/api.py", "..lib.util", &known).as_deref(), Some("lib/util.py"));
        assert_eq!(resolve_relative("web/app.ts", "./store", &known).as_deref(), Some("web/store/index.js"));
        assert_eq!(resolve_relative("web/app.ts", "../src/utils", &known).as_deref(), Some("src/utils.js"));
        assert_eq!(resolve_relative("web/app.ts", "../../outside", &known), None);
        assert_eq!(resolve_relative("pkg/api.py", "requests", &known), None);
    }

    #[test]
    fn test_mutual_relative_imports_flagged() {
        let summary = combine(vec![
            with_imports("pkg/a.py", &[".b", "json"]),
            with_imports("pkg/b.py", &[".a"]),
            with_imports("pkg/c.py", &[".a"]),
        ]);
        let msgs = messages(&generate(&summary, &InsightThresholds::default()));
        assert!(msgs.contains(&"Potential circular dependencies: pkg/a.py <-> pkg/b.py".to_string()));
        assert!(msgs.contains(&"Main external dependencies: json".to_string()));
    }

    #[test]
    fn test_one_way_imports_not_flagged() {
        let summary = combine(vec![
            with_imports("web/app.ts", &["../src/utils"]),
            with_imports("src/utils.js", &["path"]),
        ]);
        let insights = generate(&summary, &InsightThresholds::default());
        assert!(insights
            .iter()
            .all(|i| !i.message.starts_with("Potential circular dependencies")));
    }
}
