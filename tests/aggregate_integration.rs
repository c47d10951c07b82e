//! Integration tests for result aggregation.
//!
//! The merge laws (identity, commutativity, associativity) are checked over
//! randomly generated file and SQL object records.

use std::collections::BTreeSet;

use codelens::aggregate::{
    combine, AnalysisRecord, CategoryMetrics, FileAnalysis, ProjectSummary, SqlObjectAnalysis,
    SqlObjectKind, Todo, TodoPriority,
};
use proptest::prelude::*;

fn file_record() -> impl Strategy<Value = FileAnalysis> {
    (
        prop::sample::select(vec!["src", "src/api", "lib", ""]),
        prop::sample::select(vec!["py", "rs", "ts", "js"]),
        0..500usize,
        0..20usize,
        (0..10usize, 0..10usize, 0..4usize),
        prop::collection::btree_set(prop::sample::select(vec!["os", "re", "serde", "react", "json"]), 0..4),
        prop::collection::vec(0..200usize, 0..3),
        any::<bool>(),
    )
        .prop_map(|(dir, ext, lines, comment_lines, (funcs, docs, classes), imports, todo_lines, entry)| {
            let mut f = FileAnalysis::new(format!("{}/x.{}", dir, ext).trim_start_matches('/'), ext);
            f.lines = lines;
            f.comment_lines = comment_lines.min(lines);
            f.functions = CategoryMetrics {
                count: funcs,
                documented: docs.min(funcs),
                complex: 0,
            };
            f.classes = CategoryMetrics {
                count: classes,
                documented: 0,
                complex: 0,
            };
            f.imports = imports.into_iter().map(str::to_string).collect();
            f.todos = todo_lines
                .into_iter()
                .map(|line| Todo {
                    line,
                    text: "TODO: tidy".to_string(),
                    priority: TodoPriority::Low,
                })
                .collect();
            f.is_entry_point = entry;
            f
        })
}

fn sql_record() -> impl Strategy<Value = SqlObjectAnalysis> {
    (
        prop::sample::select(vec![
            SqlObjectKind::StoredProcedure,
            SqlObjectKind::View,
            SqlObjectKind::Function,
        ]),
        0..12u32,
        prop::collection::btree_set(prop::sample::select(vec!["Users", "Orders", "Items"]), 0..3),
    )
        .prop_map(|(kind, complexity, deps)| SqlObjectAnalysis {
            schema: "dbo".to_string(),
            name: "obj".to_string(),
            kind,
            lines: 10,
            complexity,
            dependencies: deps.into_iter().map(str::to_string).collect(),
            ..Default::default()
        })
}

/// Records with distinct identifiers.
fn records() -> impl Strategy<Value = Vec<AnalysisRecord>> {
    prop::collection::vec(
        prop_oneof![
            3 => file_record().prop_map(AnalysisRecord::File),
            1 => sql_record().prop_map(AnalysisRecord::Sql),
        ],
        0..8,
    )
    .prop_map(|records| {
        records
            .into_iter()
            .enumerate()
            .map(|(i, record)| match record {
                AnalysisRecord::File(mut f) => {
                    f.path = f.path.replace("x.", &format!("f{}.", i));
                    AnalysisRecord::File(f)
                }
                AnalysisRecord::Sql(mut s) => {
                    s.name = format!("obj{}", i);
                    AnalysisRecord::Sql(s)
                }
            })
            .collect()
    })
}

/// The summary with order-dependent lists sorted.
fn normalized(mut summary: ProjectSummary) -> ProjectSummary {
    summary.structure.entry_points.sort();
    summary.structure.core_files.sort();
    summary
        .maintenance
        .todos
        .sort_by(|a, b| (&a.source, a.note.line).cmp(&(&b.source, b.note.line)));
    summary.maintenance.comments.sort_by(|a, b| a.source.cmp(&b.source));
    summary.maintenance.errors.sort_by(|a, b| a.source.cmp(&b.source));
    summary
}

proptest! {
    #[test]
    fn test_combine_is_order_independent(
        records in records(),
        seed in any::<prop::sample::Index>(),
    ) {
        let forward = combine(records.clone());
        let mut rotated = records.clone();
        if !rotated.is_empty() {
            let k = seed.index(rotated.len());
            rotated.rotate_left(k);
        }
        let mut reversed = records.clone();
        reversed.reverse();

        prop_assert_eq!(normalized(forward.clone()), normalized(combine(rotated)));
        prop_assert_eq!(normalized(forward), normalized(combine(reversed)));
    }

    #[test]
    fn test_combine_is_associative(
        a in records(),
        split in any::<prop::sample::Index>(),
    ) {
        let at = if a.is_empty() { 0 } else { split.index(a.len() + 1) };
        let (left, right) = a.split_at(at);

        let mut staged = combine(left.to_vec());
        staged.merge(combine(right.to_vec())).unwrap();

        prop_assert_eq!(staged, combine(a.clone()));
    }

    #[test]
    fn test_single_file_identity(file in file_record()) {
        let summary = combine(vec![AnalysisRecord::File(file.clone())]);

        prop_assert_eq!(summary.project_stats.total_files, 1);
        prop_assert_eq!(summary.project_stats.lines_of_code, file.lines);
        prop_assert_eq!(summary.project_stats.comment_lines, file.comment_lines);
        prop_assert_eq!(summary.code_metrics.functions, file.functions);
        prop_assert_eq!(summary.code_metrics.classes, file.classes);
        prop_assert_eq!(summary.code_metrics.imports.count, file.imports.len());
        prop_assert_eq!(&summary.code_metrics.imports.unique, &file.imports);
        prop_assert_eq!(summary.maintenance.todos.len(), file.todos.len());
        prop_assert_eq!(summary.structure.entry_points.len(), usize::from(file.is_entry_point));
    }

    #[test]
    fn test_totals_are_sums(records in records()) {
        let summary = combine(records.clone());
        let files: Vec<&FileAnalysis> = records
            .iter()
            .filter_map(|r| match r {
                AnalysisRecord::File(f) => Some(f),
                AnalysisRecord::Sql(_) => None,
            })
            .collect();

        prop_assert_eq!(summary.project_stats.total_files, files.len());
        prop_assert_eq!(
            summary.project_stats.lines_of_code,
            files.iter().map(|f| f.lines).sum::<usize>()
        );
        prop_assert_eq!(
            summary.project_stats.total_sql_objects,
            records.len() - files.len()
        );
        prop_assert_eq!(summary.code_metrics.sql_objects.total(), records.len() - files.len());

        let unique: BTreeSet<String> = files.iter().flat_map(|f| f.imports.iter().cloned()).collect();
        prop_assert_eq!(&summary.code_metrics.imports.unique, &unique);
        prop_assert_eq!(
            summary.code_metrics.imports.count,
            files.iter().map(|f| f.imports.len()).sum::<usize>()
        );
    }
}

#[test]
fn test_combine_empty_is_zero() {
    let summary = combine(Vec::new());
    assert_eq!(summary, ProjectSummary::default());
    assert_eq!(summary.project_stats.total_files, 0);
    assert!(summary.code_metrics.imports.unique.is_empty());
    assert!(summary.structure.directories.is_empty());
}

#[test]
fn test_sql_objects_leave_file_totals_alone() {
    let files: Vec<AnalysisRecord> = (0..10)
        .map(|i| {
            let mut f = FileAnalysis::new(format!("src/m{}.py", i), "python");
            f.lines = 10;
            AnalysisRecord::File(f)
        })
        .collect();
    let mut summary = combine(files);
    assert_eq!(summary.project_stats.total_files, 10);

    summary.merge(combine(Vec::new())).unwrap();
    assert_eq!(summary.project_stats.total_files, 10);

    let procs = vec![AnalysisRecord::Sql(SqlObjectAnalysis {
        schema: "dbo".to_string(),
        name: "GetUsers".to_string(),
        kind: SqlObjectKind::StoredProcedure,
        ..Default::default()
    })];
    summary.merge(combine(procs)).unwrap();

    assert_eq!(summary.project_stats.total_files, 10);
    assert_eq!(summary.project_stats.lines_of_code, 100);
    assert_eq!(summary.code_metrics.sql_objects.stored_procedures, 1);
}

#[test]
fn test_repeated_source_counted_once() {
    let mut f = FileAnalysis::new("a.py", "python");
    f.lines = 7;
    let summary = combine(vec![AnalysisRecord::File(f.clone()), AnalysisRecord::File(f)]);
    assert_eq!(summary.project_stats.total_files, 1);
    assert_eq!(summary.project_stats.lines_of_code, 7);
}

#[test]
fn test_summary_json_round_trip_keeps_sources() {
    let mut f = FileAnalysis::new("src/app.py", "python");
    f.lines = 3;
    let summary = combine(vec![AnalysisRecord::File(f)]);

    let json = serde_json::to_string(&summary).unwrap();
    let back: ProjectSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(back, summary);
}
