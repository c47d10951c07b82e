//! Turning selected paths into analysis records.
//!
//! Each file is read, checked for binary content and handed to the analyzer
//! for its extension. Files are independent, so the work runs on the rayon
//! pool when enabled; the records are sorted by path afterwards so the
//! output does not depend on scheduling.

use std::fs::{self, File};
use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use phf::phf_set;
use rayon::prelude::*;
use tracing::{debug, warn};

use super::languages::{get_analyzer, SqlAnalyzer};
use super::{todos, FileFacts, LanguageAnalyzer};
use crate::aggregate::{AnalysisRecord, CategoryMetrics, ClassInfo, FileAnalysis, FunctionInfo};
use crate::chunk::panic_message;
use crate::insights::limits::COMPLEX_FUNCTION;

/// Bytes inspected when deciding whether a file is binary.
pub const BINARY_SNIFF_BYTES: usize = 8 * 1024;

/// File names that mark an entry point regardless of content.
static ENTRY_POINT_FILES: phf::Set<&'static str> = phf_set! {
    "main.py", "app.py", "cli.py", "server.py", "index.js", "server.js", "main.rs",
};

/// Function names that mark an entry point.
const ENTRY_POINT_FUNCTIONS: &[&str] = &["main", "run", "start"];

/// Core-file thresholds; a file exceeding any of them is core.
pub mod core_limits {
    pub const FUNCTIONS: usize = 5;
    pub const CLASSES: usize = 2;
    pub const COMPLEXITY: u32 = 20;
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Analyze on the rayon pool.
    pub parallel: bool,
    /// Draw a progress bar on stderr.
    pub progress: bool,
    /// Function length (lines) above which a function counts as complex.
    pub complex_function_lines: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            progress: false,
            complex_function_lines: 50,
        }
    }
}

/// What became of one path.
#[derive(Debug)]
pub enum FileOutcome {
    Analyzed(Vec<AnalysisRecord>),
    Unsupported,
    Binary,
}

/// Records for a batch of paths plus the paths that produced none.
#[derive(Debug, Default)]
pub struct PipelineOutput {
    pub records: Vec<AnalysisRecord>,
    pub unsupported: Vec<String>,
    pub binary: Vec<String>,
}

pub struct Pipeline {
    root: PathBuf,
    options: PipelineOptions,
    sql: SqlAnalyzer,
    /// Consulted before the registered analyzers.
    extra: Vec<Box<dyn LanguageAnalyzer>>,
}

impl Pipeline {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            options: PipelineOptions::default(),
            sql: SqlAnalyzer::new(),
            extra: Vec::new(),
        }
    }

    /// Add an analyzer that takes precedence for its extensions.
    pub fn with_analyzer<A: LanguageAnalyzer + 'static>(mut self, analyzer: A) -> Self {
        self.extra.push(Box::new(analyzer));
        self
    }

    fn analyzer_for(&self, ext: &str) -> Option<&dyn LanguageAnalyzer> {
        self.extra
            .iter()
            .map(|a| a.as_ref())
            .find(|a| a.handles_extension(ext))
            .or_else(|| get_analyzer(ext))
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Analyze every path (relative to the root).
    ///
    /// Never fails as a whole: a file that cannot be read or parsed, or
    /// whose analyzer panics, yields a zero record carrying the error.
    pub fn run<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> PipelineOutput {
        let bar = self.progress_bar(paths.len() as u64);

        let analyze = |rel: &P| {
            let rel = rel.as_ref();
            let outcome = self.analyze_path(rel);
            bar.inc(1);
            (display_path(rel), outcome)
        };

        let outcomes: Vec<(String, FileOutcome)> = if self.options.parallel {
            paths.par_iter().map(analyze).collect()
        } else {
            paths.iter().map(analyze).collect()
        };
        bar.finish_and_clear();

        let mut output = PipelineOutput::default();
        for (path, outcome) in outcomes {
            match outcome {
                FileOutcome::Analyzed(records) => output.records.extend(records),
                FileOutcome::Unsupported => output.unsupported.push(path),
                FileOutcome::Binary => output.binary.push(path),
            }
        }

        // Sort by identifier for deterministic ordering
        output.records.sort_by_key(|r| r.identifier());
        output.unsupported.sort();
        output.binary.sort();
        debug!(
            records = output.records.len(),
            unsupported = output.unsupported.len(),
            binary = output.binary.len(),
            "analysis finished"
        );
        output
    }

    /// Analyze one path relative to the root.
    pub fn analyze_path(&self, rel: &Path) -> FileOutcome {
        let rel_str = display_path(rel);
        let ext = rel
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let analyzer = self.analyzer_for(&ext);
        let is_sql = self.sql.handles_extension(&ext);
        if analyzer.is_none() && !is_sql {
            return FileOutcome::Unsupported;
        }
        let language = analyzer.map_or(self.sql.language_id(), |a| a.language_id());

        let abs = self.root.join(rel);
        let source = match read_text(&abs) {
            Ok(Some(source)) => source,
            Ok(None) => {
                debug!(path = %rel_str, "skipping binary file");
                return FileOutcome::Binary;
            }
            Err(e) => {
                warn!(path = %rel_str, error = %e, "failed to read file");
                let record = FileAnalysis::failed(rel_str, language, format!("read failed: {e}"));
                return FileOutcome::Analyzed(vec![record.into()]);
            }
        };

        let Some(analyzer) = analyzer else {
            return match catch_unwind(AssertUnwindSafe(|| self.sql.analyze_file(&rel_str, &source))) {
                Ok(report) => {
                    let mut records = vec![AnalysisRecord::from(report.file)];
                    records.extend(report.objects.into_iter().map(AnalysisRecord::from));
                    FileOutcome::Analyzed(records)
                }
                Err(payload) => {
                    let msg = panic_message(payload.as_ref());
                    warn!(path = %rel_str, error = %msg, "analyzer panicked");
                    let record = FileAnalysis::failed(rel_str, language, format!("analysis panicked: {msg}"));
                    FileOutcome::Analyzed(vec![record.into()])
                }
            };
        };

        let record = match catch_unwind(AssertUnwindSafe(|| analyzer.analyze(&abs, &source))) {
            Ok(Ok(mut facts)) => {
                if facts.has_parse_errors {
                    debug!(path = %rel_str, "syntax errors, results may be partial");
                }
                facts.path = rel_str;
                file_record(&facts, self.options.complex_function_lines)
            }
            Ok(Err(e)) => {
                warn!(path = %rel_str, error = %e, "analyzer failed");
                FileAnalysis::failed(rel_str, language, format!("analysis failed: {e}"))
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                warn!(path = %rel_str, error = %msg, "analyzer panicked");
                FileAnalysis::failed(rel_str, language, format!("analysis panicked: {msg}"))
            }
        };
        FileOutcome::Analyzed(vec![record.into()])
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.options.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            bar.set_style(style);
        }
        bar.set_message("analyzing");
        bar
    }
}

/// Relative path with `/` separators.
pub fn display_path(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

/// Whether the first [`BINARY_SNIFF_BYTES`] contain a NUL byte.
pub fn is_binary(path: &Path) -> std::io::Result<bool> {
    let mut head = Vec::with_capacity(BINARY_SNIFF_BYTES);
    File::open(path)?
        .take(BINARY_SNIFF_BYTES as u64)
        .read_to_end(&mut head)?;
    Ok(head.contains(&0))
}

/// Read a text file; `None` for binary content. Invalid UTF-8 is replaced.
pub fn read_text(path: &Path) -> std::io::Result<Option<String>> {
    let bytes = fs::read(path)?;
    let head = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
    if head.contains(&0) {
        return Ok(None);
    }
    Ok(Some(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }))
}

/// Convert extracted facts into the per-file record.
pub fn file_record(facts: &FileFacts, complex_function_lines: usize) -> FileAnalysis {
    let mut record = FileAnalysis::new(facts.path.clone(), facts.language.clone());
    record.lines = facts.lines;
    record.comment_lines = facts.comment_lines();
    record.imports = facts.imports.iter().map(|i| i.path.clone()).collect();

    let mut functions = CategoryMetrics::default();
    for decl in facts.callables() {
        let info = FunctionInfo {
            name: decl.name.clone(),
            line: decl.span.start_line,
            params: decl.params,
            lines: decl.span.line_count(),
            complexity: decl.complexity(),
            documented: decl.is_documented(),
            owner: decl.owner.clone(),
        };
        functions.count += 1;
        functions.documented += usize::from(info.documented);
        functions.complex +=
            usize::from(info.complexity > COMPLEX_FUNCTION || info.lines > complex_function_lines);
        record.function_details.push(info);
    }

    let mut classes = CategoryMetrics::default();
    for decl in facts.types() {
        let methods = facts
            .callables()
            .filter(|f| f.owner.as_deref() == Some(decl.name.as_str()))
            .count();
        let info = ClassInfo {
            name: decl.name.clone(),
            kind: decl.kind.as_str().to_string(),
            line: decl.span.start_line,
            methods,
            documented: decl.is_documented(),
        };
        classes.count += 1;
        classes.documented += usize::from(info.documented);
        record.class_details.push(info);
    }
    record.functions = functions;
    record.classes = classes;

    let (comments, todos) = todos::partition_comments(&facts.comments);
    record.comments = comments;
    record.todos = todos;

    record.is_entry_point = is_entry_point(&record);
    record.is_core = is_core(&record, facts.total_complexity());
    record
}

/// Well-known entry file name, or a top-level `main`/`run`/`start`.
pub fn is_entry_point(record: &FileAnalysis) -> bool {
    let file_name = Path::new(&record.path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    if ENTRY_POINT_FILES.contains(file_name) {
        return true;
    }
    record
        .function_details
        .iter()
        .any(|f| f.owner.is_none() && ENTRY_POINT_FUNCTIONS.contains(&f.name.as_str()))
}

pub fn is_core(record: &FileAnalysis, total_complexity: u32) -> bool {
    record.functions.count > core_limits::FUNCTIONS
        || record.classes.count > core_limits::CLASSES
        || total_complexity > core_limits::COMPLEXITY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{CommentFact, Declaration, DeclarationKind, Span};
    use tempfile::TempDir;

    fn decl(name: &str, kind: DeclarationKind, owner: Option<&str>, lines: usize) -> Declaration {
        Declaration {
            name: name.to_string(),
            kind,
            span: Span {
                start_byte: 0,
                end_byte: 0,
                start_line: 10,
                end_line: 10 + lines - 1,
            },
            owner: owner.map(str::to_string),
            params: 1,
            doc: None,
            control_flow: None,
        }
    }

    #[test]
    fn test_file_record_counts() {
        let mut facts = FileFacts::empty("pkg/store.py", "python");
        facts.lines = 120;
        facts.declarations = vec![
            decl("Store", DeclarationKind::Class, None, 40),
            decl("get", DeclarationKind::Method, Some("Store"), 5),
            decl("put", DeclarationKind::Method, Some("Store"), 80),
            decl("helper", DeclarationKind::Function, None, 3),
        ];
        facts.declarations[1].doc = Some("Fetch.".into());
        facts.comments = vec![
            CommentFact {
                line: 1,
                lines: 2,
                text: "Storage layer".into(),
            },
            CommentFact {
                line: 30,
                lines: 1,
                text: "TODO: should batch writes".into(),
            },
        ];

        let record = file_record(&facts, 50);
        assert_eq!(record.functions.count, 3);
        assert_eq!(record.functions.documented, 1);
        // `put` is longer than 50 lines
        assert_eq!(record.functions.complex, 1);
        assert_eq!(record.classes.count, 1);
        assert_eq!(record.class_details[0].methods, 2);
        assert_eq!(record.comment_lines, 3);
        assert_eq!(record.comments.len(), 1);
        assert_eq!(record.todos.len(), 1);
        assert!(!record.is_entry_point);
        assert!(!record.is_core);
    }

    #[test]
    fn test_entry_points() {
        let mut record = FileAnalysis::new("src/main.rs", "rust");
        assert!(is_entry_point(&record));

        record.path = "tools/deploy.py".into();
        assert!(!is_entry_point(&record));
        record.function_details.push(FunctionInfo {
            name: "run".into(),
            owner: Some("Job".into()),
            ..Default::default()
        });
        // methods named run do not count
        assert!(!is_entry_point(&record));
        record.function_details.push(FunctionInfo {
            name: "run".into(),
            ..Default::default()
        });
        assert!(is_entry_point(&record));
    }

    #[test]
    fn test_core_thresholds() {
        let mut record = FileAnalysis::new("a.py", "python");
        assert!(!is_core(&record, 20));
        assert!(is_core(&record, 21));
        record.functions.count = 6;
        assert!(is_core(&record, 0));
        record.functions.count = 0;
        record.classes.count = 3;
        assert!(is_core(&record, 0));
    }

    #[test]
    fn test_read_text_detects_binary() {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("blob.bin");
        fs::write(&bin, b"abc\0def").unwrap();
        let txt = dir.path().join("a.txt");
        fs::write(&txt, "plain").unwrap();

        assert!(is_binary(&bin).unwrap());
        assert!(!is_binary(&txt).unwrap());
        assert_eq!(read_text(&bin).unwrap(), None);
        assert_eq!(read_text(&txt).unwrap().as_deref(), Some("plain"));
    }

    #[test]
    fn test_run_mixed_tree() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.py"), "def main():\n    pass\n").unwrap();
        fs::write(dir.path().join("README.md"), "# readme\n").unwrap();
        fs::write(dir.path().join("data.py"), b"\0\x01binary").unwrap();
        fs::write(
            dir.path().join("schema.sql"),
            "CREATE VIEW v AS SELECT * FROM t\nGO\n",
        )
        .unwrap();

        let pipeline = Pipeline::new(dir.path()).with_options(PipelineOptions {
            parallel: false,
            ..Default::default()
        });
        let paths = ["app.py", "README.md", "data.py", "schema.sql"];
        let output = pipeline.run(&paths[..]);

        let ids: Vec<_> = output.records.iter().map(|r| r.identifier()).collect();
        assert_eq!(ids, vec!["app.py", "schema.sql", "sql:dbo.v"]);
        assert_eq!(output.unsupported, vec!["README.md"]);
        assert_eq!(output.binary, vec!["data.py"]);

        match &output.records[0] {
            AnalysisRecord::File(f) => {
                assert!(f.is_entry_point);
                assert_eq!(f.functions.count, 1);
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_becomes_error_record() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(dir.path());
        match pipeline.analyze_path(Path::new("gone.rs")) {
            FileOutcome::Analyzed(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].identifier(), "gone.rs");
                assert_eq!(records[0].lines(), 0);
                assert!(records[0].errors()[0].starts_with("read failed"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    /// Panics on any file containing "boom".
    struct ExplodingAnalyzer;

    impl LanguageAnalyzer for ExplodingAnalyzer {
        fn language_id(&self) -> &'static str {
            "exploding"
        }

        fn file_extensions(&self) -> &'static [&'static str] {
            &["xpl"]
        }

        fn analyze(&self, path: &Path, source: &str) -> anyhow::Result<FileFacts> {
            if source.contains("boom") {
                panic!("grammar invariant violated");
            }
            let mut facts = FileFacts::empty(&path.to_string_lossy(), "exploding");
            facts.lines = source.lines().count();
            Ok(facts)
        }
    }

    #[test]
    fn test_analyzer_panic_becomes_error_record() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.xpl"), "fine\n").unwrap();
        fs::write(dir.path().join("b.xpl"), "boom\n").unwrap();
        fs::write(dir.path().join("c.py"), "def main():\n    pass\n").unwrap();

        for parallel in [true, false] {
            let pipeline = Pipeline::new(dir.path())
                .with_options(PipelineOptions {
                    parallel,
                    ..Default::default()
                })
                .with_analyzer(ExplodingAnalyzer);
            let output = pipeline.run(&["a.xpl", "b.xpl", "c.py"][..]);

            let ids: Vec<_> = output.records.iter().map(|r| r.identifier()).collect();
            assert_eq!(ids, vec!["a.xpl", "b.xpl", "c.py"]);
            match &output.records[1] {
                AnalysisRecord::File(f) => {
                    assert_eq!(f.language, "exploding");
                    assert_eq!(f.lines, 0);
                    assert_eq!(f.errors, vec!["analysis panicked: grammar invariant violated"]);
                }
                other => panic!("unexpected record {other:?}"),
            }
            assert!(output.records[0].errors().is_empty());
            assert!(output.records[2].errors().is_empty());
        }
    }
}
