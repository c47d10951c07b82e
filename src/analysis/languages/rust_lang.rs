//! Rust language analyzer using tree-sitter.
//!
//! Extracts:
//! - Function declarations
//! - Impl and trait methods
//! - Struct/enum/trait/type alias definitions
//! - Use statements (imports)
//! - Outer doc comments (`///`, `/** */`)
//! - Control flow for complexity

use std::collections::HashSet;
use std::path::Path;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Query, QueryCursor};

use crate::analysis::{
    ControlFlowInfo, Declaration, DeclarationKind, FileFacts, Import, LanguageAnalyzer,
    ParsedFile, Span,
};

/// Tree-sitter query for extracting Rust declarations.
const DECLARATION_QUERY: &str = r#"
; Functions, including those inside impl and trait blocks
(function_item
  name: (identifier) @func_name
) @function

; Required trait methods without a body
(function_signature_item
  name: (identifier) @func_name
) @function

; Struct declarations
(struct_item
  name: (type_identifier) @struct_name
) @struct

; Enum declarations
(enum_item
  name: (type_identifier) @enum_name
) @enum

; Trait declarations
(trait_item
  name: (type_identifier) @trait_name
) @trait

; Type aliases
(type_item
  name: (type_identifier) @type_name
) @type_alias
"#;

/// Tree-sitter query for extracting imports (use statements).
const IMPORT_QUERY: &str = r#"
(use_declaration
  argument: (_) @path
)

(extern_crate_declaration
  name: (identifier) @path
)
"#;

/// Tree-sitter query for control flow nodes (complexity calculation).
const CONTROL_FLOW_QUERY: &str = r#"
(if_expression) @if
(for_expression) @for
(while_expression) @while
(loop_expression) @loop
(match_expression) @switch
(match_arm) @case
(binary_expression operator: "&&") @and
(binary_expression operator: "||") @or
(try_expression) @catch
"#;

const COMMENT_QUERY: &str = r#"
(line_comment) @comment
(block_comment) @comment
"#;

/// Rust language analyzer.
pub struct RustAnalyzer {
    language: Language,
}

impl RustAnalyzer {
    /// Create a new Rust analyzer.
    pub fn new() -> Self {
        Self {
            language: tree_sitter_rust::LANGUAGE.into(),
        }
    }

    /// Extract declarations from a parsed file.
    fn extract_declarations(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<Declaration>> {
        let query = Query::new(&self.language, DECLARATION_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut declarations = Vec::new();
        let mut seen_positions = HashSet::new();

        while let Some(m) = matches.next() {
            let mut name = String::new();
            let mut kind = None;
            let mut decl_node = None;

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                match capture_name {
                    "func_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = Some(DeclarationKind::Function);
                    }
                    "struct_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = Some(DeclarationKind::Struct);
                    }
                    "enum_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = Some(DeclarationKind::Enum);
                    }
                    "trait_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = Some(DeclarationKind::Trait);
                    }
                    "type_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = Some(DeclarationKind::Type);
                    }
                    _ => decl_node = Some(capture.node),
                }
            }

            let (Some(kind), Some(node)) = (kind, decl_node) else {
                continue;
            };
            if name.is_empty() || !seen_positions.insert(node.start_byte()) {
                continue;
            }

            let doc = parsed.doc_comment_before(
                node,
                &["line_comment", "block_comment"],
                &["attribute_item"],
                is_outer_doc,
            );

            let declaration = if kind.is_callable() {
                let owner = owning_type(parsed, node);
                let control_flow = match node.child_by_field_name("body") {
                    Some(body) => Some(self.extract_control_flow(parsed, body)?),
                    None => None,
                };
                Declaration {
                    name,
                    kind: if owner.is_some() {
                        DeclarationKind::Method
                    } else {
                        DeclarationKind::Function
                    },
                    span: Span::from_node(node),
                    owner,
                    params: count_params(node),
                    doc,
                    control_flow,
                }
            } else {
                Declaration {
                    name,
                    kind,
                    span: Span::from_node(node),
                    owner: None,
                    params: 0,
                    doc,
                    control_flow: None,
                }
            };
            declarations.push(declaration);
        }

        // Sort by position for deterministic output
        declarations.sort_by_key(|d| (d.span.start_byte, d.name.clone()));
        Ok(declarations)
    }

    fn extract_control_flow(&self, parsed: &ParsedFile, body_node: Node) -> anyhow::Result<ControlFlowInfo> {
        let query = Query::new(&self.language, CONTROL_FLOW_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, body_node, &parsed.source[..]);

        let mut info = ControlFlowInfo::default();
        while let Some(m) = matches.next() {
            for capture in m.captures {
                // `?` counts as a branch
                info.record(query.capture_names()[capture.index as usize]);
            }
        }

        Ok(info)
    }

    /// Extract imports from a parsed file.
    fn extract_imports(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<Import>> {
        let query = Query::new(&self.language, IMPORT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut imports = Vec::new();
        let mut seen_paths = HashSet::new();

        while let Some(m) = matches.next() {
            for capture in m.captures {
                let path: String = parsed
                    .node_text(capture.node)
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
                if !path.is_empty() && seen_paths.insert(path.clone()) {
                    imports.push(Import {
                        path,
                        line: capture.node.start_position().row + 1,
                    });
                }
            }
        }

        // Sort by path for deterministic output
        imports.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(imports)
    }
}

impl Default for RustAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for RustAnalyzer {
    fn language_id(&self) -> &'static str {
        "rust"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn analyze(&self, path: &Path, source: &str) -> anyhow::Result<FileFacts> {
        let parsed = ParsedFile::parse(&self.language, path, source)?;

        Ok(FileFacts {
            path: parsed.path.clone(),
            language: self.language_id().to_string(),
            lines: source.lines().count(),
            declarations: self.extract_declarations(&parsed)?,
            imports: self.extract_imports(&parsed)?,
            comments: parsed.collect_comments(&self.language, COMMENT_QUERY)?,
            has_parse_errors: parsed.has_errors(),
        })
    }
}

fn is_outer_doc(text: &str) -> bool {
    (text.starts_with("///") && !text.starts_with("////")) || text.starts_with("/**")
}

/// Type an `impl` or `trait` block attaches a function to.
fn owning_type(parsed: &ParsedFile, func: Node) -> Option<String> {
    let list = func.parent()?;
    if list.kind() != "declaration_list" {
        return None;
    }
    let block = list.parent()?;
    let name = match block.kind() {
        "impl_item" => block.child_by_field_name("type")?,
        "trait_item" => block.child_by_field_name("name")?,
        _ => return None,
    };
    Some(parsed.node_text(name).to_string())
}

/// Parameters excluding `self`.
fn count_params(func: Node) -> usize {
    let Some(params) = func.child_by_field_name("parameters") else {
        return 0;
    };
    let mut walker = params.walk();
    let count = params
        .named_children(&mut walker)
        .filter(|p| matches!(p.kind(), "parameter" | "variadic_parameter"))
        .count();
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(source: &str) -> FileFacts {
        RustAnalyzer::new()
            .analyze(Path::new("lib.rs"), source)
            .unwrap()
    }

    #[test]
    fn test_declarations_and_owners() {
        let facts = analyze(
            r#"
use std::collections::HashMap;
use std::io::{self, Read};

/// A key-value cache.
#[derive(Debug, Default)]
pub struct Cache {
    map: HashMap<String, String>,
}

impl Cache {
    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&String> {
        self.map.get(key)
    }

    pub fn load(&mut self, mut r: impl Read, strict: bool) -> io::Result<()> {
        let mut s = String::new();
        r.read_to_string(&mut s)?;
        if strict && s.is_empty() {
            return Ok(());
        }
        Ok(())
    }
}

pub trait Store {
    fn put(&mut self, key: String);
}

fn main() {}
"#,
        );

        let names: Vec<_> = facts.declarations.iter().map(|d| d.qualified_name()).collect();
        assert_eq!(
            names,
            vec!["Cache", "Cache.get", "Cache.load", "Store", "Store.put", "main"]
        );

        let cache = facts.find_declaration("Cache").unwrap();
        assert_eq!(cache.kind, DeclarationKind::Struct);
        assert_eq!(cache.doc.as_deref(), Some("A key-value cache."));

        let get = facts.find_declaration("get").unwrap();
        assert_eq!(get.kind, DeclarationKind::Method);
        assert_eq!(get.params, 1);
        assert!(get.is_documented());

        let load = facts.find_declaration("load").unwrap();
        assert_eq!(load.params, 2);
        assert!(!load.is_documented());
        // ? + if + &&
        assert_eq!(load.complexity(), 4);

        let put = facts.find_declaration("put").unwrap();
        assert_eq!(put.owner.as_deref(), Some("Store"));
        assert!(put.control_flow.is_none());

        let main = facts.find_declaration("main").unwrap();
        assert_eq!(main.kind, DeclarationKind::Function);
        assert_eq!(main.params, 0);

        let imports: Vec<_> = facts.imports.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(imports, vec!["std::collections::HashMap", "std::io::{self, Read}"]);
    }

    #[test]
    fn test_plain_comment_is_not_doc() {
        let facts = analyze("// helper\nfn f() {}\n\n/// doc\n\nfn g() {}\n");
        assert!(!facts.find_declaration("f").unwrap().is_documented());
        // blank line separates the doc from g
        assert!(!facts.find_declaration("g").unwrap().is_documented());
        assert_eq!(facts.comments.len(), 2);
    }
}
