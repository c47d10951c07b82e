//! AST-backed code analysis module.
//!
//! This module turns source files into per-file analysis records. Analyzers
//! extract "facts" with tree-sitter:
//! - Declarations (functions, methods, classes, structs, traits, ...)
//! - Imports/dependencies
//! - Comments, with TODO markers split out
//! - Control flow information for complexity calculation
//!
//! SQL scripts and introspection dumps go through a regex analyzer instead.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Included paths  │────▶│ Analyzers    │────▶│ FileFacts     │
//! └─────────────────┘     │ (py, js, ts, │     └───────────────┘
//!                         │  rs, sql)    │             │
//!                         └──────────────┘             ▼
//!                                              ┌───────────────┐
//!                                              │AnalysisRecord │
//!                                              └───────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a new module in `src/analysis/languages/`
//! 2. Implement `LanguageAnalyzer` trait
//! 3. Define tree-sitter queries for declarations, imports and comments
//! 4. Register the analyzer in `languages/mod.rs`
//!
//! See `languages/python.rs` for a reference implementation.

mod facts;
mod languages;
mod pipeline;
mod todos;
mod traits;

pub use facts::{
    CommentFact, ControlFlowInfo, Declaration, DeclarationKind, FileFacts, Import, Span,
};
pub use languages::{
    estimate_sql_complexity, extract_sql_dependencies, extract_sql_parameters, get_analyzer,
    get_analyzer_by_id, is_supported, load_sql_dump, register_analyzers, registered_extensions,
    JavaScriptAnalyzer, PythonAnalyzer, RustAnalyzer, SqlAnalyzer, SqlFileReport,
    TypeScriptAnalyzer, DEFAULT_SCHEMA,
};
pub use pipeline::{
    core_limits, display_path, file_record, is_binary, is_core, is_entry_point, read_text,
    FileOutcome, Pipeline, PipelineOptions, PipelineOutput, BINARY_SNIFF_BYTES,
};
pub use todos::{estimate_priority, is_todo, partition_comments};
pub use traits::{LanguageAnalyzer, ParsedFile};
