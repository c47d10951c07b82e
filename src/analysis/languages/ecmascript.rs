//! Extraction shared by the JavaScript and TypeScript analyzers.
//!
//! Both grammars use the same node kinds for functions, methods, control
//! flow and module syntax; they differ in how type names are spelled, so
//! each analyzer supplies its own declaration query.

use std::collections::HashSet;
use std::path::Path;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Query, QueryCursor};

use crate::analysis::{
    ControlFlowInfo, Declaration, DeclarationKind, FileFacts, Import, ParsedFile, Span,
};

pub(super) const CONTROL_FLOW_QUERY: &str = r#"
(if_statement) @if
(for_statement) @for
(for_in_statement) @for
(while_statement) @while
(do_statement) @while
(switch_statement) @switch
(switch_case) @case
(ternary_expression) @ternary
(binary_expression operator: "&&") @and
(binary_expression operator: "||") @or
(binary_expression operator: "??") @or
(catch_clause) @catch
"#;

/// Tree-sitter query for extracting imports.
pub(super) const IMPORT_QUERY: &str = r#"
; import x from 'module'
(import_statement
  source: (string) @source
)

; export * from 'module'
(export_statement
  source: (string) @source
)

; require('module')
(call_expression
  function: (identifier) @require_func (#eq? @require_func "require")
  arguments: (arguments (string) @source)
)
"#;

pub(super) const COMMENT_QUERY: &str = "(comment) @comment";

/// Statements that wrap a declaration without being one.
const WRAPPERS: &[&str] = &["export_statement", "lexical_declaration", "variable_declaration"];

const CLASS_KINDS: &[&str] = &["class_declaration", "class", "abstract_class_declaration"];

/// Run the full extraction for one file.
pub(super) fn analyze(
    language: &Language,
    language_id: &str,
    declaration_query: &str,
    path: &Path,
    source: &str,
) -> anyhow::Result<FileFacts> {
    let parsed = ParsedFile::parse(language, path, source)?;

    Ok(FileFacts {
        path: parsed.path.clone(),
        language: language_id.to_string(),
        lines: source.lines().count(),
        declarations: extract_declarations(language, declaration_query, &parsed)?,
        imports: extract_imports(language, &parsed)?,
        comments: parsed.collect_comments(language, COMMENT_QUERY)?,
        has_parse_errors: parsed.has_errors(),
    })
}

fn kind_for_capture(capture: &str) -> Option<DeclarationKind> {
    match capture {
        "func_name" | "arrow_name" | "method_name" => Some(DeclarationKind::Function),
        "class_name" => Some(DeclarationKind::Class),
        "interface_name" => Some(DeclarationKind::Interface),
        "type_name" => Some(DeclarationKind::Type),
        "enum_name" => Some(DeclarationKind::Enum),
        _ => None,
    }
}

fn extract_declarations(
    language: &Language,
    declaration_query: &str,
    parsed: &ParsedFile,
) -> anyhow::Result<Vec<Declaration>> {
    let query = Query::new(language, declaration_query)?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

    let mut declarations = Vec::new();
    let mut seen_positions = HashSet::new();

    while let Some(m) = matches.next() {
        let mut name = String::new();
        let mut kind = None;
        let mut decl_node = None;
        let mut func_node = None;

        for capture in m.captures {
            let capture_name = query.capture_names()[capture.index as usize];
            if let Some(k) = kind_for_capture(capture_name) {
                name = parsed.node_text(capture.node).to_string();
                kind = Some(k);
                continue;
            }
            match capture_name {
                "arrow_value" => func_node = Some(capture.node),
                "require_func" => {}
                _ => decl_node = Some(capture.node),
            }
        }

        let (Some(kind), Some(node)) = (kind, decl_node) else {
            continue;
        };
        if name.is_empty() || !seen_positions.insert(node.start_byte()) {
            continue;
        }

        let doc = jsdoc(parsed, node);
        let declaration = if kind.is_callable() {
            let func = func_node.unwrap_or(node);
            let owner = (node.kind() == "method_definition")
                .then(|| enclosing_class(parsed, node))
                .flatten();
            let control_flow = match func.child_by_field_name("body") {
                Some(body) => Some(extract_control_flow(language, parsed, body)?),
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
                params: count_params(func),
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

    declarations.sort_by_key(|d| (d.span.start_byte, d.name.clone()));
    Ok(declarations)
}

fn extract_control_flow(
    language: &Language,
    parsed: &ParsedFile,
    body_node: Node,
) -> anyhow::Result<ControlFlowInfo> {
    let query = Query::new(language, CONTROL_FLOW_QUERY)?;
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

fn extract_imports(language: &Language, parsed: &ParsedFile) -> anyhow::Result<Vec<Import>> {
    let query = Query::new(language, IMPORT_QUERY)?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

    let mut imports = Vec::new();
    let mut seen_paths = HashSet::new();

    while let Some(m) = matches.next() {
        for capture in m.captures {
            if query.capture_names()[capture.index as usize] != "source" {
                continue;
            }
            let path = parsed
                .node_text(capture.node)
                .trim_matches(|c| c == '"' || c == '\'' || c == '`')
                .to_string();
            if !path.is_empty() && seen_paths.insert(path.clone()) {
                imports.push(Import {
                    path,
                    line: capture.node.start_position().row + 1,
                });
            }
        }
    }

    imports.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(imports)
}

fn enclosing_class(parsed: &ParsedFile, method: Node) -> Option<String> {
    let body = method.parent()?;
    if body.kind() != "class_body" {
        return None;
    }
    let class = body.parent()?;
    if !CLASS_KINDS.contains(&class.kind()) {
        return None;
    }
    class
        .child_by_field_name("name")
        .map(|name| parsed.node_text(name).to_string())
}

fn count_params(func: Node) -> usize {
    if let Some(params) = func.child_by_field_name("parameters") {
        let mut walker = params.walk();
        let count = params
            .named_children(&mut walker)
            .filter(|p| p.kind() != "comment")
            .count();
        return count;
    }
    // `x => x + 1`
    usize::from(func.child_by_field_name("parameter").is_some())
}

/// `/** ... */` block directly above the declaration or its wrapping
/// export/variable statement.
fn jsdoc(parsed: &ParsedFile, node: Node) -> Option<String> {
    let mut anchor = node;
    while let Some(parent) = anchor.parent() {
        if !WRAPPERS.contains(&parent.kind()) {
            break;
        }
        anchor = parent;
    }
    parsed.doc_comment_before(anchor, &["comment"], &["decorator"], |text| {
        text.starts_with("/**")
    })
}
