//! Fact structures extracted from AST analysis.

use std::fmt;

/// Source location span with byte offsets and line positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// End line (1-indexed).
    pub end_line: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    pub fn from_node(node: tree_sitter::Node) -> Self {
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: node.start_position().row + 1, // tree-sitter is 0-indexed
            end_line: node.end_position().row + 1,
        }
    }

    /// Number of lines covered, at least one.
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_line, self.end_line)
    }
}

/// Kind of declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Trait,
    Interface,
    Type,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Function => "function",
            DeclarationKind::Method => "method",
            DeclarationKind::Class => "class",
            DeclarationKind::Struct => "struct",
            DeclarationKind::Enum => "enum",
            DeclarationKind::Trait => "trait",
            DeclarationKind::Interface => "interface",
            DeclarationKind::Type => "type",
        }
    }

    /// Check if this is a callable (function or method).
    pub fn is_callable(&self) -> bool {
        matches!(self, DeclarationKind::Function | DeclarationKind::Method)
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declaration extracted from source code.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// Source span for the entire declaration.
    pub span: Span,
    /// Enclosing type for methods (class, impl target, interface).
    pub owner: Option<String>,
    /// Parameter count, excluding `self`/`cls`/`this` receivers.
    pub params: usize,
    /// Leading documentation (docstring or doc comment), trimmed.
    pub doc: Option<String>,
    /// Control flow of the body, only for callables with a body.
    pub control_flow: Option<ControlFlowInfo>,
}

impl Declaration {
    /// Get the qualified name (owner.name for methods).
    pub fn qualified_name(&self) -> String {
        match self.owner {
            Some(ref owner) => format!("{}.{}", owner, self.name),
            None => self.name.clone(),
        }
    }

    pub fn is_documented(&self) -> bool {
        self.doc.as_deref().is_some_and(|d| !d.trim().is_empty())
    }

    /// Cyclomatic complexity; 1 for declarations without a body.
    pub fn complexity(&self) -> u32 {
        self.control_flow
            .as_ref()
            .map_or(1, ControlFlowInfo::cyclomatic_complexity)
    }
}

/// Control flow information for cyclomatic complexity calculation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFlowInfo {
    /// Number of if statements.
    pub if_count: u32,
    /// Number of for/while/loop statements.
    pub loop_count: u32,
    /// Number of switch/match statements.
    pub switch_count: u32,
    /// Number of case clauses.
    pub case_count: u32,
    /// Number of && operators.
    pub and_count: u32,
    /// Number of || operators.
    pub or_count: u32,
    /// Number of ternary ?: operators.
    pub ternary_count: u32,
    /// Number of catch/except clauses.
    pub catch_count: u32,
}

impl ControlFlowInfo {
    /// Calculate cyclomatic complexity.
    ///
    /// CC = 1 + decision_points
    /// Decision points: if, for, while, case, &&, ||, ?, catch
    pub fn cyclomatic_complexity(&self) -> u32 {
        let decision_points = self.if_count
            + self.loop_count
            + self.case_count
            + self.and_count
            + self.or_count
            + self.ternary_count
            + self.catch_count;

        1 + decision_points
    }

    /// Count one capture from a control-flow query.
    ///
    /// Capture names are shared by every language's query so the
    /// analyzers only differ in the patterns they match.
    pub fn record(&mut self, capture: &str) {
        match capture {
            "if" => self.if_count += 1,
            "for" | "while" | "loop" => self.loop_count += 1,
            "switch" => self.switch_count += 1,
            "case" => self.case_count += 1,
            "ternary" => self.ternary_count += 1,
            "and" => self.and_count += 1,
            "or" => self.or_count += 1,
            "catch" => self.catch_count += 1,
            _ => {}
        }
    }
}

/// An import/dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// The import path or module name.
    pub path: String,
    pub line: usize,
}

/// A source comment, markers stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentFact {
    pub line: usize,
    /// Number of source lines the comment spans.
    pub lines: usize,
    pub text: String,
}

/// All facts extracted from a single file.
#[derive(Debug, Clone, Default)]
pub struct FileFacts {
    pub path: String,
    pub language: String,
    /// Number of lines in the file.
    pub lines: usize,
    pub declarations: Vec<Declaration>,
    pub imports: Vec<Import>,
    pub comments: Vec<CommentFact>,
    /// Whether the tree contained ERROR nodes.
    pub has_parse_errors: bool,
}

impl FileFacts {
    /// Create empty facts for a file.
    pub fn empty(path: &str, language: &str) -> Self {
        Self {
            path: path.to_string(),
            language: language.to_string(),
            ..Default::default()
        }
    }

    /// Find a declaration by name.
    pub fn find_declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == name)
    }

    /// Get all functions and methods.
    pub fn callables(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(|d| d.kind.is_callable())
    }

    /// Get all type-like declarations (classes, structs, traits, ...).
    pub fn types(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(|d| !d.kind.is_callable())
    }

    /// Get total cyclomatic complexity of all callables.
    pub fn total_complexity(&self) -> u32 {
        self.callables().map(Declaration::complexity).sum()
    }

    /// Number of source lines occupied by comments.
    pub fn comment_lines(&self) -> usize {
        self.comments.iter().map(|c| c.lines).sum()
    }
}
