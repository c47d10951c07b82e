//! Python language analyzer using tree-sitter.

use std::collections::HashSet;
use std::path::Path;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Query, QueryCursor};

use crate::analysis::{
    ControlFlowInfo, Declaration, DeclarationKind, FileFacts, Import, LanguageAnalyzer,
    ParsedFile, Span,
};

const DECLARATION_QUERY: &str = r#"
; Function definitions (plain and decorated)
(function_definition
  name: (identifier) @func_name
) @function

; Class definitions
(class_definition
  name: (identifier) @class_name
) @class
"#;

const CONTROL_FLOW_QUERY: &str = r#"
(if_statement) @if
(elif_clause) @if
(for_statement) @for
(while_statement) @while
(conditional_expression) @ternary
(boolean_operator operator: "and") @and
(boolean_operator operator: "or") @or
(except_clause) @catch
(match_statement) @switch
(case_clause) @case
"#;

/// Tree-sitter query for extracting imports.
const IMPORT_QUERY: &str = r#"
; import module
(import_statement
  name: (dotted_name) @module_name
)

; import module as alias
(import_statement
  name: (aliased_import
    name: (dotted_name) @module_name
  )
)

; from module import name
(import_from_statement
  module_name: (dotted_name) @module_name
)

; from . import name (relative imports)
(import_from_statement
  module_name: (relative_import) @module_name
)
"#;

const COMMENT_QUERY: &str = "(comment) @comment";

/// Receivers that do not count as parameters.
const RECEIVERS: &[&str] = &["self", "cls"];

pub struct PythonAnalyzer {
    language: Language,
}

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    fn extract_declarations(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<Declaration>> {
        let query = Query::new(&self.language, DECLARATION_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut declarations = Vec::new();
        let mut seen_positions = HashSet::new();

        while let Some(m) = matches.next() {
            let mut name = String::new();
            let mut is_class = false;
            let mut decl_node = None;

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                match capture_name {
                    "func_name" => name = parsed.node_text(capture.node).to_string(),
                    "class_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        is_class = true;
                    }
                    "function" | "class" => decl_node = Some(capture.node),
                    _ => {}
                }
            }

            let Some(node) = decl_node else { continue };
            if name.is_empty() || !seen_positions.insert(node.start_byte()) {
                continue;
            }

            let doc = docstring(parsed, node);
            let declaration = if is_class {
                Declaration {
                    name,
                    kind: DeclarationKind::Class,
                    span: Span::from_node(node),
                    owner: None,
                    params: 0,
                    doc,
                    control_flow: None,
                }
            } else {
                let owner = enclosing_class(parsed, node);
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
                    params: count_params(parsed, node, owner.is_some()),
                    owner,
                    doc,
                    control_flow,
                }
            };
            declarations.push(declaration);
        }

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
                info.record(query.capture_names()[capture.index as usize]);
            }
        }

        Ok(info)
    }

    fn extract_imports(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<Import>> {
        let query = Query::new(&self.language, IMPORT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut imports = Vec::new();
        let mut seen_paths = HashSet::new();

        while let Some(m) = matches.next() {
            for capture in m.captures {
                let path = parsed.node_text(capture.node).to_string();
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

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
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

/// Name of the class a function is defined in, if it is a method.
///
/// Nested functions stop the search: a function inside a method is a
/// plain function.
fn enclosing_class(parsed: &ParsedFile, node: Node) -> Option<String> {
    let mut current = node.parent();
    while let Some(n) = current {
        match n.kind() {
            "class_definition" => {
                return n
                    .child_by_field_name("name")
                    .map(|name| parsed.node_text(name).to_string());
            }
            "function_definition" => return None,
            _ => current = n.parent(),
        }
    }
    None
}

fn count_params(parsed: &ParsedFile, func: Node, is_method: bool) -> usize {
    let Some(params) = func.child_by_field_name("parameters") else {
        return 0;
    };

    let mut count = 0;
    let mut walker = params.walk();
    for (i, param) in params.named_children(&mut walker).enumerate() {
        match param.kind() {
            "comment" | "keyword_separator" | "positional_separator" => continue,
            "identifier" if i == 0 && is_method && RECEIVERS.contains(&parsed.node_text(param)) => {
                continue
            }
            _ => count += 1,
        }
    }
    count
}

/// Docstring of a function or class: a string literal as the first
/// statement of its body.
fn docstring(parsed: &ParsedFile, node: Node) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let literal = first.named_child(0)?;
    if literal.kind() != "string" {
        return None;
    }

    let text = parsed
        .node_text(literal)
        .trim_start_matches(|c: char| "rRuUbBfF".contains(c))
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}
