//! codelens - bounded, LLM-friendly digests of source trees.
//!
//! codelens walks a project, lets the user choose which files to include,
//! analyzes each included file with a language-specific extractor and merges
//! the results into one project summary. Insights are derived from that
//! summary, and on request the raw files are exported in chunks that each
//! fit a token budget.
//!
//! # Architecture
//!
//! - `selection`: tri-state selection tree, exclusion policy, saved decisions
//! - `analysis`: tree-sitter analyzers (Python, JavaScript, TypeScript, Rust)
//!   and the regex SQL analyzer, run over the selection by `Pipeline`
//! - `aggregate`: per-source records merged into a `ProjectSummary`
//! - `insights`: observations derived from a summary
//! - `chunk`: token-bounded splitting with a tokenizer fallback
//! - `report`: text and JSON reports, full-content export
//! - `config`: YAML configuration
//!
//! # Adding a New Language
//!
//! See `src/analysis/languages/` for examples. Implement `LanguageAnalyzer`
//! trait and register in `languages/mod.rs`.

pub mod aggregate;
pub mod analysis;
pub mod chunk;
pub mod cli;
pub mod config;
pub mod insights;
pub mod report;
pub mod selection;

pub use aggregate::{combine, AnalysisRecord, Aggregator, FileAnalysis, ProjectSummary, SqlObjectAnalysis};
pub use analysis::{register_analyzers, FileFacts, LanguageAnalyzer, Pipeline, PipelineOptions};
pub use chunk::{Chunk, ContentChunker, TiktokenTokenizer, Tokenizer};
pub use config::Config;
pub use insights::Insight;
pub use selection::{ExclusionPolicy, NodeState, SelectionStore, SelectionTree};

/// Initialize all subsystems.
///
/// Call this once at startup.
pub fn init() {
    register_analyzers();
}
