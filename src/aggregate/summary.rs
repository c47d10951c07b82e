//! The merged project summary.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::record::{AnalysisRecord, CategoryMetrics, Comment, SqlObjectKind, Todo, TodoPriority};
use super::AggregateError;

/// SQL objects above this estimated complexity count as complex.
pub const COMPLEX_SQL_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub total_files: usize,
    pub total_sql_objects: usize,
    pub lines_of_code: usize,
    pub comment_lines: usize,
    /// Analyzed files per extension.
    pub by_type: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMetrics {
    pub count: usize,
    pub unique: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlMetrics {
    pub stored_procedures: usize,
    pub views: usize,
    pub functions: usize,
    pub complex: usize,
}

impl SqlMetrics {
    pub fn total(&self) -> usize {
        self.stored_procedures + self.views + self.functions
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMetrics {
    pub functions: CategoryMetrics,
    pub classes: CategoryMetrics,
    pub imports: ImportMetrics,
    pub sql_objects: SqlMetrics,
}

/// A note attributed to the source it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceNote<T> {
    pub source: String,
    pub note: T,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintenance {
    pub todos: Vec<SourceNote<Todo>>,
    pub comments: Vec<SourceNote<Comment>>,
    pub errors: Vec<SourceNote<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub directories: BTreeSet<String>,
    pub entry_points: Vec<String>,
    pub core_files: Vec<String>,
    pub sql_dependencies: BTreeSet<String>,
}

/// Everything known about the analyzed project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project_stats: ProjectStats,
    pub code_metrics: CodeMetrics,
    pub maintenance: Maintenance,
    pub structure: Structure,
    /// Source records keyed by identifier.
    pub sources: BTreeMap<String, AnalysisRecord>,
}

/// Values computed from a summary on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub avg_file_size: f64,
    pub function_doc_ratio: Option<f64>,
    pub class_doc_ratio: Option<f64>,
    pub doc_coverage: Option<f64>,
    pub comment_ratio: Option<f64>,
    pub todo_density_per_kloc: Option<f64>,
}

impl ProjectSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summary of a single record.
    pub fn from_record(record: AnalysisRecord) -> Self {
        let mut summary = Self::default();
        let id = record.identifier();

        match &record {
            AnalysisRecord::File(f) => {
                let stats = &mut summary.project_stats;
                stats.total_files = 1;
                stats.lines_of_code = f.lines;
                stats.comment_lines = f.comment_lines;
                stats.by_type.insert(f.file_type(), 1);

                let metrics = &mut summary.code_metrics;
                metrics.functions = f.functions;
                metrics.classes = f.classes;
                metrics.imports.count = f.imports.len();
                metrics.imports.unique = f.imports.clone();

                summary.structure.directories.insert(f.directory());
                if f.is_entry_point {
                    summary.structure.entry_points.push(id.clone());
                }
                if f.is_core {
                    summary.structure.core_files.push(id.clone());
                }
            }
            AnalysisRecord::Sql(s) => {
                summary.project_stats.total_sql_objects = 1;
                let sql = &mut summary.code_metrics.sql_objects;
                match s.kind {
                    SqlObjectKind::StoredProcedure => sql.stored_procedures = 1,
                    SqlObjectKind::View => sql.views = 1,
                    SqlObjectKind::Function => sql.functions = 1,
                }
                if s.complexity > COMPLEX_SQL_THRESHOLD {
                    sql.complex = 1;
                }
                summary.structure.sql_dependencies = s.dependencies.clone();
            }
        }

        let maintenance = &mut summary.maintenance;
        maintenance.todos = record
            .todos()
            .iter()
            .map(|t| SourceNote {
                source: id.clone(),
                note: t.clone(),
            })
            .collect();
        let comments = match &record {
            AnalysisRecord::File(f) => &f.comments,
            AnalysisRecord::Sql(s) => &s.comments,
        };
        maintenance.comments = comments
            .iter()
            .map(|c| SourceNote {
                source: id.clone(),
                note: c.clone(),
            })
            .collect();
        maintenance.errors = record
            .errors()
            .iter()
            .map(|e| SourceNote {
                source: id.clone(),
                note: e.clone(),
            })
            .collect();

        summary.sources.insert(id, record);
        summary
    }

    /// Fold `other` into `self`.
    ///
    /// Counts are summed, sets unioned and lists appended after the existing
    /// entries. Fails without modifying `self` when both summaries contain a
    /// record with the same identifier.
    pub fn merge(&mut self, other: ProjectSummary) -> Result<(), AggregateError> {
        if let Some(dup) = other.sources.keys().find(|k| self.sources.contains_key(*k)) {
            return Err(AggregateError::DuplicateSource(dup.clone()));
        }

        let stats = &mut self.project_stats;
        stats.total_files += other.project_stats.total_files;
        stats.total_sql_objects += other.project_stats.total_sql_objects;
        stats.lines_of_code += other.project_stats.lines_of_code;
        stats.comment_lines += other.project_stats.comment_lines;
        for (ext, count) in other.project_stats.by_type {
            *stats.by_type.entry(ext).or_insert(0) += count;
        }

        let metrics = &mut self.code_metrics;
        metrics.functions.add(&other.code_metrics.functions);
        metrics.classes.add(&other.code_metrics.classes);
        metrics.imports.count += other.code_metrics.imports.count;
        metrics.imports.unique.extend(other.code_metrics.imports.unique);
        let sql = &mut metrics.sql_objects;
        sql.stored_procedures += other.code_metrics.sql_objects.stored_procedures;
        sql.views += other.code_metrics.sql_objects.views;
        sql.functions += other.code_metrics.sql_objects.functions;
        sql.complex += other.code_metrics.sql_objects.complex;

        self.maintenance.todos.extend(other.maintenance.todos);
        self.maintenance.comments.extend(other.maintenance.comments);
        self.maintenance.errors.extend(other.maintenance.errors);

        let structure = &mut self.structure;
        structure.directories.extend(other.structure.directories);
        structure.entry_points.extend(other.structure.entry_points);
        structure.core_files.extend(other.structure.core_files);
        structure.sql_dependencies.extend(other.structure.sql_dependencies);

        self.sources.extend(other.sources);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Analyzed source files in identifier order.
    pub fn files(&self) -> impl Iterator<Item = &super::FileAnalysis> {
        self.sources.values().filter_map(|r| match r {
            AnalysisRecord::File(f) => Some(f),
            AnalysisRecord::Sql(_) => None,
        })
    }

    pub fn sql_objects(&self) -> impl Iterator<Item = &super::SqlObjectAnalysis> {
        self.sources.values().filter_map(|r| match r {
            AnalysisRecord::Sql(s) => Some(s),
            AnalysisRecord::File(_) => None,
        })
    }

    pub fn high_priority_todos(&self) -> usize {
        self.maintenance
            .todos
            .iter()
            .filter(|t| t.note.priority == TodoPriority::High)
            .count()
    }

    pub fn avg_file_size(&self) -> f64 {
        let files = self.project_stats.total_files;
        if files == 0 {
            0.0
        } else {
            self.project_stats.lines_of_code as f64 / files as f64
        }
    }

    /// Documented functions and classes over all functions and classes, in percent.
    pub fn doc_coverage(&self) -> Option<f64> {
        let f = &self.code_metrics.functions;
        let c = &self.code_metrics.classes;
        let total = f.count + c.count;
        if total == 0 {
            None
        } else {
            Some((f.documented + c.documented) as f64 / total as f64 * 100.0)
        }
    }

    /// Comment lines per line of code.
    pub fn comment_ratio(&self) -> Option<f64> {
        let loc = self.project_stats.lines_of_code;
        if loc == 0 {
            None
        } else {
            Some(self.project_stats.comment_lines as f64 / loc as f64)
        }
    }

    /// TODOs per thousand lines of code.
    pub fn todo_density(&self) -> Option<f64> {
        let loc = self.project_stats.lines_of_code;
        if loc == 0 {
            None
        } else {
            Some(self.maintenance.todos.len() as f64 * 1000.0 / loc as f64)
        }
    }

    pub fn derived(&self) -> DerivedMetrics {
        DerivedMetrics {
            avg_file_size: self.avg_file_size(),
            function_doc_ratio: self.code_metrics.functions.doc_ratio(),
            class_doc_ratio: self.code_metrics.classes.doc_ratio(),
            doc_coverage: self.doc_coverage(),
            comment_ratio: self.comment_ratio(),
            todo_density_per_kloc: self.todo_density(),
        }
    }
}
