//! Language-specific analyzer implementations.

mod ecmascript;
mod javascript;
mod python;
mod rust_lang;
mod sql;
mod typescript;

pub use javascript::JavaScriptAnalyzer;
pub use python::PythonAnalyzer;
pub use rust_lang::RustAnalyzer;
pub use sql::{
    estimate_complexity as estimate_sql_complexity, extract_dependencies as extract_sql_dependencies,
    extract_parameters as extract_sql_parameters, load_sql_dump, SqlAnalyzer, SqlFileReport,
    DEFAULT_SCHEMA,
};
pub use typescript::TypeScriptAnalyzer;

use super::LanguageAnalyzer;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};

/// Static storage for JavaScript analyzer.
static JAVASCRIPT_ANALYZER: OnceCell<JavaScriptAnalyzer> = OnceCell::new();

/// Static storage for Python analyzer.
static PYTHON_ANALYZER: OnceCell<PythonAnalyzer> = OnceCell::new();

/// Static storage for Rust analyzer.
static RUST_ANALYZER: OnceCell<RustAnalyzer> = OnceCell::new();

/// Static storage for TypeScript analyzer.
static TYPESCRIPT_ANALYZER: OnceCell<TypeScriptAnalyzer> = OnceCell::new();

/// Whether analyzers have been registered.
static REGISTERED: AtomicBool = AtomicBool::new(false);

/// Register all tree-sitter analyzers.
///
/// Idempotent; [`get_analyzer`] calls it on first use.
pub fn register_analyzers() {
    if REGISTERED.swap(true, Ordering::SeqCst) {
        return; // Already registered
    }

    JAVASCRIPT_ANALYZER.get_or_init(JavaScriptAnalyzer::new);
    PYTHON_ANALYZER.get_or_init(PythonAnalyzer::new);
    RUST_ANALYZER.get_or_init(RustAnalyzer::new);
    TYPESCRIPT_ANALYZER.get_or_init(TypeScriptAnalyzer::new);
}

fn all() -> [Option<&'static dyn LanguageAnalyzer>; 4] {
    register_analyzers();
    [
        JAVASCRIPT_ANALYZER.get().map(|a| a as &'static dyn LanguageAnalyzer),
        PYTHON_ANALYZER.get().map(|a| a as &'static dyn LanguageAnalyzer),
        RUST_ANALYZER.get().map(|a| a as &'static dyn LanguageAnalyzer),
        TYPESCRIPT_ANALYZER.get().map(|a| a as &'static dyn LanguageAnalyzer),
    ]
}

/// Get the tree-sitter analyzer for a file extension (without dot).
///
/// Returns None if no analyzer handles the extension. SQL is handled by
/// [`SqlAnalyzer`] and is not returned here.
pub fn get_analyzer(ext: &str) -> Option<&'static dyn LanguageAnalyzer> {
    all().into_iter().flatten().find(|a| a.handles_extension(ext))
}

/// Get an analyzer by language ID.
pub fn get_analyzer_by_id(lang_id: &str) -> Option<&'static dyn LanguageAnalyzer> {
    all().into_iter().flatten().find(|a| a.language_id() == lang_id)
}

/// Every extension some analyzer (SQL included) handles, sorted.
pub fn registered_extensions() -> Vec<&'static str> {
    let mut exts: Vec<&'static str> = all()
        .into_iter()
        .flatten()
        .flat_map(|a| a.file_extensions().iter().copied())
        .chain(SqlAnalyzer::new().file_extensions().iter().copied())
        .collect();
    exts.sort_unstable();
    exts
}

/// Whether any analyzer handles the extension.
pub fn is_supported(ext: &str) -> bool {
    get_analyzer(ext).is_some() || SqlAnalyzer::new().handles_extension(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_extension() {
        assert_eq!(get_analyzer("py").unwrap().language_id(), "python");
        assert_eq!(get_analyzer("jsx").unwrap().language_id(), "javascript");
        assert_eq!(get_analyzer("cjs").unwrap().language_id(), "javascript");
        assert_eq!(get_analyzer("tsx").unwrap().language_id(), "typescript");
        assert_eq!(get_analyzer("rs").unwrap().language_id(), "rust");
        assert!(get_analyzer("sql").is_none());
        assert!(get_analyzer("go").is_none());
    }

    #[test]
    fn test_lookup_by_id() {
        assert!(get_analyzer_by_id("typescript").is_some());
        assert!(get_analyzer_by_id("cobol").is_none());
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported("sql"));
        assert!(is_supported("mts"));
        assert!(!is_supported("md"));
        let exts = registered_extensions();
        assert!(exts.contains(&"py"));
        assert!(exts.windows(2).all(|w| w[0] <= w[1]));
    }
}
