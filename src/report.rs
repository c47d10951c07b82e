//! Output formatting for codelens results.
//!
//! Supports two report formats:
//! - Text: sectioned plain text meant to be pasted into an LLM prompt
//! - JSON: the full summary, derived metrics and insights for tooling
//!
//! With `--full`, included files and SQL object definitions are also exported
//! as token-bounded chunks, one chunk per `full_{k}.txt` / `sql_full_{k}.txt`.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::*;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::aggregate::{DerivedMetrics, FileAnalysis, ProjectSummary, SqlObjectAnalysis};
use crate::analysis::{display_path, read_text};
use crate::chunk::ContentChunker;
use crate::insights::Insight;

/// Width of the `=` rules around directory and export headers.
const RULE_WIDTH: usize = 80;

lazy_static! {
    /// Files a previous run may have left in the output directory.
    static ref PREVIOUS_OUTPUT: Regex =
        Regex::new(r"^(analysis\.(txt|json)|full_\d+\.txt|sql_full_\d+\.txt)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    /// Parse a format name as used in config files and on the command line.
    pub fn parse(name: &str) -> anyhow::Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => anyhow::bail!("unknown output format '{}' (expected txt or json)", other),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
        }
    }
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

// =============================================================================
// Text Format
// =============================================================================

/// Render the text report into a string.
pub fn render_text(summary: &ProjectSummary, insights: &[Insight]) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_text(&mut buf, summary, insights);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Write the text report.
pub fn write_text<W: Write>(out: &mut W, summary: &ProjectSummary, insights: &[Insight]) -> io::Result<()> {
    write_overview(out, summary)?;

    if !insights.is_empty() {
        section(out, "KEY INSIGHTS")?;
        for insight in insights {
            writeln!(out, "- {}", insight)?;
        }
    }

    write_metrics(out, summary)?;
    write_todos(out, summary)?;

    if !summary.structure.entry_points.is_empty() {
        section(out, "ENTRY POINTS")?;
        for path in &summary.structure.entry_points {
            writeln!(out, "- {}", path)?;
        }
    }

    if !summary.structure.core_files.is_empty() {
        section(out, "CORE FILES")?;
        for path in &summary.structure.core_files {
            writeln!(out, "- {}", path)?;
        }
    }

    write_sql_objects(out, summary)?;
    write_structure(out, summary)?;
    Ok(())
}

fn section<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", "-".repeat(title.len()))
}

fn write_overview<W: Write>(out: &mut W, summary: &ProjectSummary) -> io::Result<()> {
    let stats = &summary.project_stats;
    writeln!(out, "CODEBASE SUMMARY")?;
    writeln!(out, "{}", "-".repeat("CODEBASE SUMMARY".len()))?;
    writeln!(out, "Total files: {}", stats.total_files)?;
    if stats.total_sql_objects > 0 {
        writeln!(out, "SQL objects: {}", stats.total_sql_objects)?;
    }
    if !stats.by_type.is_empty() {
        let types: Vec<String> = stats
            .by_type
            .iter()
            .map(|(ext, n)| format!("{} ({})", ext, n))
            .collect();
        writeln!(out, "File types: {}", types.join(", "))?;
    }
    writeln!(out, "Total lines of code: {}", stats.lines_of_code)?;
    writeln!(out, "Average file size: {:.1} lines", summary.avg_file_size())?;
    writeln!(out, "Overall complexity: {}", overall_complexity(summary))
}

/// Sum of function complexities across all files.
fn overall_complexity(summary: &ProjectSummary) -> u64 {
    summary
        .files()
        .flat_map(|f| f.function_details.iter())
        .map(|f| f.complexity as u64)
        .sum()
}

fn write_metrics<W: Write>(out: &mut W, summary: &ProjectSummary) -> io::Result<()> {
    let metrics = &summary.code_metrics;
    section(out, "CODE METRICS")?;
    writeln!(
        out,
        "Functions: {} ({} documented, {} complex)",
        metrics.functions.count, metrics.functions.documented, metrics.functions.complex
    )?;
    writeln!(
        out,
        "Classes: {} ({} documented)",
        metrics.classes.count, metrics.classes.documented
    )?;
    if let Some(coverage) = summary.doc_coverage() {
        writeln!(out, "Documentation coverage: {:.1}%", coverage)?;
    }
    if let Some(ratio) = summary.comment_ratio() {
        writeln!(
            out,
            "Comment lines: {} ({:.1}% of code)",
            summary.project_stats.comment_lines,
            ratio * 100.0
        )?;
    }
    writeln!(
        out,
        "Total imports: {} ({} unique)",
        metrics.imports.count,
        metrics.imports.unique.len()
    )?;

    let sql = &metrics.sql_objects;
    if sql.total() > 0 {
        writeln!(
            out,
            "SQL objects: {} ({} procedures, {} views, {} functions, {} complex)",
            sql.total(),
            sql.stored_procedures,
            sql.views,
            sql.functions,
            sql.complex
        )?;
    }
    Ok(())
}

fn write_todos<W: Write>(out: &mut W, summary: &ProjectSummary) -> io::Result<()> {
    let todos = &summary.maintenance.todos;
    if todos.is_empty() {
        return Ok(());
    }

    section(out, "TODOS")?;
    // Highest priority first, stable within a priority.
    let mut sorted: Vec<_> = todos.iter().collect();
    sorted.sort_by(|a, b| b.note.priority.cmp(&a.note.priority));
    for todo in sorted {
        writeln!(
            out,
            "- [{}] {}:{}: {}",
            todo.note.priority.as_str().to_uppercase(),
            todo.source,
            todo.note.line,
            todo.note.text
        )?;
    }
    Ok(())
}

fn write_sql_objects<W: Write>(out: &mut W, summary: &ProjectSummary) -> io::Result<()> {
    let objects: Vec<&SqlObjectAnalysis> = summary.sql_objects().collect();
    if objects.is_empty() {
        return Ok(());
    }

    section(out, "SQL OBJECTS")?;
    for obj in objects {
        writeln!(
            out,
            "  [{}].[{}] ({}, {} lines, complexity {})",
            obj.schema,
            obj.name,
            obj.kind.as_str(),
            obj.lines,
            obj.complexity
        )?;

        if !obj.parameters.is_empty() {
            writeln!(out, "    PARAMETERS:")?;
            for p in &obj.parameters {
                let mut line = format!("      {} ({}", p.name, p.data_type);
                if let Some(default) = &p.default {
                    line.push_str(&format!(", default={}", default));
                }
                line.push(')');
                if let Some(desc) = &p.description {
                    line.push_str(&format!(" -- {}", desc));
                }
                writeln!(out, "{}", line)?;
            }
        }

        if !obj.dependencies.is_empty() {
            writeln!(out, "    DEPENDENCIES:")?;
            for dep in &obj.dependencies {
                writeln!(out, "      {}", dep)?;
            }
        }

        if !obj.comments.is_empty() {
            writeln!(out, "    COMMENTS:")?;
            for c in &obj.comments {
                writeln!(out, "      Line {}: {}", c.line, c.text)?;
            }
        }

        write_notes(out, "    ", obj.todos.iter().map(|t| (t.line, t.text.as_str())), &obj.errors)?;
    }
    Ok(())
}

fn write_structure<W: Write>(out: &mut W, summary: &ProjectSummary) -> io::Result<()> {
    let mut by_dir: BTreeMap<String, Vec<&FileAnalysis>> = BTreeMap::new();
    for file in summary.files() {
        by_dir.entry(file.directory()).or_default().push(file);
    }
    if by_dir.is_empty() {
        return Ok(());
    }

    section(out, "PROJECT STRUCTURE")?;
    for (dir, files) in by_dir {
        let lines: usize = files.iter().map(|f| f.lines).sum();
        writeln!(out, "{}", rule())?;
        writeln!(out, "{}/ ({} lines)", dir, lines)?;
        writeln!(out, "{}", rule())?;
        for file in files {
            write_file(out, file)?;
        }
    }
    Ok(())
}

fn write_file<W: Write>(out: &mut W, file: &FileAnalysis) -> io::Result<()> {
    let name = file.path.rsplit('/').next().unwrap_or(&file.path);
    if file.lines == 0 && file.errors.is_empty() {
        return writeln!(out, "  {} (empty)", name);
    }

    writeln!(out, "  {}", name)?;
    writeln!(out, "    Lines: {}", file.lines)?;
    let complexity: u32 = file.function_details.iter().map(|f| f.complexity).sum();
    if complexity > 0 {
        writeln!(out, "    Complexity: {}", complexity)?;
    }

    if !file.class_details.is_empty() {
        writeln!(out, "    CLASSES:")?;
        for c in &file.class_details {
            let doc = if c.documented { "" } else { ", undocumented" };
            writeln!(
                out,
                "      {} {} (line {}, {} methods{})",
                c.kind, c.name, c.line, c.methods, doc
            )?;
        }
    }

    if !file.function_details.is_empty() {
        writeln!(out, "    FUNCTIONS:")?;
        for f in &file.function_details {
            let name = match &f.owner {
                Some(owner) => format!("{}.{}", owner, f.name),
                None => f.name.clone(),
            };
            let doc = if f.documented { "" } else { ", undocumented" };
            writeln!(
                out,
                "      {} (line {}, {} params, complexity {}{})",
                name, f.line, f.params, f.complexity, doc
            )?;
        }
    }

    if !file.imports.is_empty() {
        writeln!(out, "    IMPORTS:")?;
        for import in &file.imports {
            writeln!(out, "      {}", import)?;
        }
    }

    write_notes(out, "    ", file.todos.iter().map(|t| (t.line, t.text.as_str())), &file.errors)
}

fn write_notes<'a, W: Write>(
    out: &mut W,
    indent: &str,
    todos: impl Iterator<Item = (usize, &'a str)>,
    errors: &[String],
) -> io::Result<()> {
    let todos: Vec<_> = todos.collect();
    if !todos.is_empty() {
        writeln!(out, "{}TODOS:", indent)?;
        for (line, text) in todos {
            writeln!(out, "{}  Line {}: {}", indent, line, text)?;
        }
    }
    if !errors.is_empty() {
        writeln!(out, "{}ERRORS:", indent)?;
        for e in errors {
            writeln!(out, "{}  {}", indent, e)?;
        }
    }
    Ok(())
}

// =============================================================================
// JSON Format
// =============================================================================

/// JSON report structure.
#[derive(Serialize)]
pub struct JsonReport<'a> {
    pub version: &'static str,
    pub summary: &'a ProjectSummary,
    pub derived: DerivedMetrics,
    pub insights: &'a [Insight],
}

impl<'a> JsonReport<'a> {
    pub fn new(summary: &'a ProjectSummary, insights: &'a [Insight]) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            summary,
            derived: summary.derived(),
            insights,
        }
    }
}

/// Render the JSON report.
pub fn render_json(summary: &ProjectSummary, insights: &[Insight]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&JsonReport::new(summary, insights))?)
}

// =============================================================================
// Output directory
// =============================================================================

/// Remove report and export files left by a previous run.
///
/// Returns how many files were removed. A missing directory is not an error.
pub fn clear_previous(output_dir: &Path) -> anyhow::Result<usize> {
    let entries = match fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", output_dir.display()))
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !PREVIOUS_OUTPUT.is_match(&name) || !entry.path().is_file() {
            continue;
        }
        fs::remove_file(entry.path())
            .with_context(|| format!("Failed to remove {}", entry.path().display()))?;
        removed += 1;
    }
    if removed > 0 {
        debug!(dir = %output_dir.display(), removed, "cleared previous output");
    }
    Ok(removed)
}

/// Write `analysis.{txt,json}` into `output_dir` and return its path.
pub fn write_report(
    output_dir: &Path,
    format: ReportFormat,
    summary: &ProjectSummary,
    insights: &[Insight],
) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let content = match format {
        ReportFormat::Text => render_text(summary, insights),
        ReportFormat::Json => render_json(summary, insights)?,
    };
    let path = output_dir.join(format!("analysis.{}", format.extension()));
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

// =============================================================================
// Full content export
// =============================================================================

/// What a full-content export wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub files: usize,
    pub chunks: usize,
    pub skipped: usize,
    pub written: Vec<PathBuf>,
}

/// Writes numbered chunk files with a `FILE:` header.
struct ChunkWriter<'a> {
    dir: &'a Path,
    prefix: &'static str,
    next: usize,
}

impl<'a> ChunkWriter<'a> {
    fn new(dir: &'a Path, prefix: &'static str) -> Self {
        Self { dir, prefix, next: 1 }
    }

    fn write(&mut self, label: &str, index: usize, total: usize, content: &str) -> anyhow::Result<PathBuf> {
        let path = self.dir.join(format!("{}_{}.txt", self.prefix, self.next));
        let mut text = format!("FILE: {} (part {}/{})\n{}\n", label, index, total, rule());
        text.push_str(content);
        if !content.ends_with('\n') {
            text.push('\n');
        }
        fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        self.next += 1;
        Ok(path)
    }
}

/// Export every included file as token-bounded chunks under `output_dir`.
///
/// `paths` are relative to `root`. Binary and unreadable files are skipped
/// and counted in [`ExportStats::skipped`].
pub fn export_files<P: AsRef<Path>>(
    root: &Path,
    paths: &[P],
    output_dir: &Path,
    chunker: &ContentChunker<'_>,
    max_tokens: usize,
) -> anyhow::Result<ExportStats> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut stats = ExportStats::default();
    let mut writer = ChunkWriter::new(output_dir, "full");
    for rel in paths {
        let rel = rel.as_ref();
        let label = display_path(rel);
        let content = match read_text(&root.join(rel)) {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!(file = %label, "skipping binary file in export");
                stats.skipped += 1;
                continue;
            }
            Err(e) => {
                warn!(file = %label, error = %e, "skipping unreadable file in export");
                stats.skipped += 1;
                continue;
            }
        };

        for chunk in chunker.split_named(&content, max_tokens, &label) {
            let path = writer.write(&label, chunk.index, chunk.total, &chunk.content)?;
            stats.written.push(path);
            stats.chunks += 1;
        }
        stats.files += 1;
    }
    Ok(stats)
}

/// Export SQL object definitions as `sql_full_{k}.txt` chunks.
pub fn export_sql<'s>(
    objects: impl IntoIterator<Item = &'s SqlObjectAnalysis>,
    output_dir: &Path,
    chunker: &ContentChunker<'_>,
    max_tokens: usize,
) -> anyhow::Result<ExportStats> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut stats = ExportStats::default();
    let mut writer = ChunkWriter::new(output_dir, "sql_full");
    for obj in objects {
        if obj.definition.trim().is_empty() {
            stats.skipped += 1;
            continue;
        }
        let label = format!("{}: [{}].[{}]", obj.kind.as_str().to_uppercase(), obj.schema, obj.name);
        for chunk in chunker.split_named(&obj.definition, max_tokens, &label) {
            let path = writer.write(&label, chunk.index, chunk.total, &chunk.content)?;
            stats.written.push(path);
            stats.chunks += 1;
        }
        stats.files += 1;
    }
    Ok(stats)
}

// =============================================================================
// Terminal summary
// =============================================================================

/// Print a short colored summary of the run to stdout.
pub fn print_run_summary(
    root: &Path,
    report_path: &Path,
    summary: &ProjectSummary,
    insights: &[Insight],
    exports: &[&ExportStats],
) {
    println!();
    print!("  ");
    print!("{}", "codelens".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Analyzed: ".dimmed());
    println!("{}", root.display());
    print!("  {}", "Report:   ".dimmed());
    println!("{}", report_path.display());
    println!();

    let stats = &summary.project_stats;
    print!("  {}", "Files: ".dimmed());
    print!("{}", stats.total_files.to_string().bold());
    print!("  {}", "Lines: ".dimmed());
    print!("{}", stats.lines_of_code.to_string().bold());
    if stats.total_sql_objects > 0 {
        print!("  {}", "SQL objects: ".dimmed());
        print!("{}", stats.total_sql_objects.to_string().bold());
    }
    println!();

    let errors = summary.maintenance.errors.len();
    if errors > 0 {
        println!(
            "  {}",
            format!("{} source(s) could not be analyzed", errors).yellow()
        );
    }

    for export in exports {
        if export.chunks == 0 {
            continue;
        }
        print!("  {}", "Exported: ".dimmed());
        println!(
            "{} source(s) in {} chunk file(s){}",
            export.files,
            export.chunks,
            if export.skipped > 0 {
                format!(", {} skipped", export.skipped)
            } else {
                String::new()
            }
        );
    }

    if !insights.is_empty() {
        println!();
        for insight in insights.iter().take(5) {
            println!("  {} {}", "•".cyan(), insight);
        }
    }
    println!();
}
