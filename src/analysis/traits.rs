//! Core traits for language analysis.

use std::path::Path;

use anyhow::Context;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use super::{CommentFact, FileFacts};

/// Holds a parsed tree-sitter tree and associated metadata.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// The file path (for error reporting).
    pub path: String,
}

impl ParsedFile {
    /// Parse `source` with a fresh parser for `language`.
    ///
    /// Partial parse errors still produce a tree with ERROR nodes; only a
    /// parser that gives up entirely is an error.
    pub fn parse(language: &Language, path: &Path, source: &str) -> anyhow::Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(language)?;
        let tree = parser
            .parse(source, None)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Self {
            tree,
            source: source.as_bytes().to_vec(),
            path: path.to_string_lossy().into_owned(),
        })
    }

    /// Get the source code as a string slice.
    pub fn source_str(&self) -> &str {
        std::str::from_utf8(&self.source).unwrap_or("")
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }

    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Run a single-capture query and collect every comment it matches.
    pub fn collect_comments(&self, language: &Language, query: &str) -> anyhow::Result<Vec<CommentFact>> {
        let query = Query::new(language, query)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, self.tree.root_node(), &self.source[..]);

        let mut comments = Vec::new();
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let node = capture.node;
                let text = clean_comment(self.node_text(node));
                if text.is_empty() {
                    continue;
                }
                comments.push(CommentFact {
                    line: node.start_position().row + 1,
                    lines: line_span(node),
                    text,
                });
            }
        }

        comments.sort_by_key(|c| c.line);
        comments.dedup_by_key(|c| c.line);
        Ok(comments)
    }

    /// Documentation comments directly above `node`.
    ///
    /// Walks backwards over siblings of `kind` in `comment_kinds`, skipping
    /// siblings listed in `skip_kinds` (attributes, decorators). Comments
    /// must be contiguous with the declaration; a blank line ends the block.
    pub fn doc_comment_before(
        &self,
        node: Node,
        comment_kinds: &[&str],
        skip_kinds: &[&str],
        is_doc: impl Fn(&str) -> bool,
    ) -> Option<String> {
        let mut lines = Vec::new();
        let mut expected_row = node.start_position().row;
        let mut current = node.prev_sibling();

        while let Some(sibling) = current {
            let end_row = sibling.end_position().row;
            // line comments in some grammars include the trailing newline
            let end_row = if sibling.end_position().column == 0 && end_row > 0 {
                end_row - 1
            } else {
                end_row
            };
            if end_row + 1 < expected_row {
                break;
            }
            if skip_kinds.contains(&sibling.kind()) {
                expected_row = sibling.start_position().row;
                current = sibling.prev_sibling();
                continue;
            }
            if !comment_kinds.contains(&sibling.kind()) {
                break;
            }
            let raw = self.node_text(sibling);
            if !is_doc(raw.trim_start()) {
                break;
            }
            lines.push(clean_comment(raw));
            expected_row = sibling.start_position().row;
            current = sibling.prev_sibling();
        }

        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        let doc = lines.join("\n").trim().to_string();
        (!doc.is_empty()).then_some(doc)
    }
}

/// Number of source lines a node spans.
pub(crate) fn line_span(node: Node) -> usize {
    let start = node.start_position().row;
    let end = node.end_position();
    // a trailing newline does not occupy the next line
    let end_row = if end.column == 0 && end.row > start {
        end.row - 1
    } else {
        end.row
    };
    end_row - start + 1
}

/// Strip comment delimiters and leading `*` gutters.
pub(crate) fn clean_comment(raw: &str) -> String {
    let raw = raw.trim();
    let body = if let Some(inner) = raw.strip_prefix("/*") {
        inner.strip_suffix("*/").unwrap_or(inner)
    } else {
        raw
    };

    body.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches('/')
                .trim_start_matches('!')
                .trim_start_matches('#')
                .trim_start_matches('*')
                .trim()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Language-specific analyzer trait.
///
/// Each language implements this trait to turn one source file into
/// [`FileFacts`].
///
/// # Thread Safety
///
/// `tree_sitter::Parser` is not Sync, so implementations create a parser
/// per call.
pub trait LanguageAnalyzer: Send + Sync {
    /// Returns the language identifier (e.g., "python", "rust").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this analyzer handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Extract all facts from a source file.
    ///
    /// Files with syntax errors still produce facts for the parts that
    /// parsed; `has_parse_errors` is set on the result.
    fn analyze(&self, path: &Path, source: &str) -> anyhow::Result<FileFacts>;

    /// Check if this analyzer handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_comment_line_styles() {
        assert_eq!(clean_comment("// hello"), "hello");
        assert_eq!(clean_comment("/// Doc line"), "Doc line");
        assert_eq!(clean_comment("//! Module doc"), "Module doc");
        assert_eq!(clean_comment("# python"), "python");
        assert_eq!(clean_comment("//"), "");
    }

    #[test]
    fn test_clean_comment_block() {
        let raw = "/**\n * Adds numbers.\n *\n * @param a first\n */";
        assert_eq!(clean_comment(raw), "Adds numbers.\n@param a first");
        assert_eq!(clean_comment("/* inline */"), "inline");
    }
}
