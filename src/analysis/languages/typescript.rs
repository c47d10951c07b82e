//! TypeScript language analyzer using tree-sitter.

use std::path::Path;

use tree_sitter::Language;

use super::ecmascript;
use crate::analysis::{FileFacts, LanguageAnalyzer};

const DECLARATION_QUERY: &str = r#"
; Function declarations
(function_declaration
  name: (identifier) @func_name
) @function

(generator_function_declaration
  name: (identifier) @func_name
) @function

; Functions and arrows assigned to variables
(variable_declarator
  name: (identifier) @arrow_name
  value: [(arrow_function) (function_expression)] @arrow_value
) @arrow

; Method definitions in objects/classes
(method_definition
  name: (property_identifier) @method_name
) @method

; Class declarations
(class_declaration
  name: (type_identifier) @class_name
) @class

(abstract_class_declaration
  name: (type_identifier) @class_name
) @class

; Interface declarations
(interface_declaration
  name: (type_identifier) @interface_name
) @interface

; Type alias declarations
(type_alias_declaration
  name: (type_identifier) @type_name
) @type_alias

; Enum declarations
(enum_declaration
  name: (identifier) @enum_name
) @enum
"#;

pub struct TypeScriptAnalyzer {
    typescript: Language,
    tsx: Language,
}

impl TypeScriptAnalyzer {
    pub fn new() -> Self {
        Self {
            typescript: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            tsx: tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    /// `.tsx` files need the JSX-aware grammar.
    fn grammar_for(&self, path: &Path) -> &Language {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsx") => &self.tsx,
            _ => &self.typescript,
        }
    }
}

impl Default for TypeScriptAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for TypeScriptAnalyzer {
    fn language_id(&self) -> &'static str {
        "typescript"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "mts", "cts"]
    }

    fn analyze(&self, path: &Path, source: &str) -> anyhow::Result<FileFacts> {
        ecmascript::analyze(
            self.grammar_for(path),
            self.language_id(),
            DECLARATION_QUERY,
            path,
            source,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::DeclarationKind;

    fn analyze_as(name: &str, source: &str) -> FileFacts {
        TypeScriptAnalyzer::new()
            .analyze(Path::new(name), source)
            .unwrap()
    }

    #[test]
    fn test_type_declarations() {
        let facts = analyze_as(
            "model.ts",
            r#"
import type { Request } from './http';

export interface User {
  id: number;
}

type Id = string | number;

enum Role { Admin, Guest }

/** Repository of users. */
export class UserStore {
  find(id: Id, strict?: boolean): User | undefined {
    return strict ? undefined : this.cache[id] ?? undefined;
  }
}
"#,
        );

        let kinds: Vec<_> = facts
            .declarations
            .iter()
            .map(|d| (d.name.as_str(), d.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("User", DeclarationKind::Interface),
                ("Id", DeclarationKind::Type),
                ("Role", DeclarationKind::Enum),
                ("UserStore", DeclarationKind::Class),
                ("find", DeclarationKind::Method),
            ]
        );

        let store = facts.find_declaration("UserStore").unwrap();
        assert_eq!(store.doc.as_deref(), Some("Repository of users."));

        let find = facts.find_declaration("find").unwrap();
        assert_eq!(find.owner.as_deref(), Some("UserStore"));
        assert_eq!(find.params, 2);
        // ternary + ??
        assert_eq!(find.complexity(), 3);

        assert_eq!(facts.imports.len(), 1);
        assert_eq!(facts.imports[0].path, "./http");
        assert!(!facts.has_parse_errors);
    }

    #[test]
    fn test_tsx_uses_jsx_grammar() {
        let facts = analyze_as(
            "view.tsx",
            "export function View(props: Props) {\n  return <div>{props.title}</div>;\n}\n",
        );
        assert!(!facts.has_parse_errors);
        assert_eq!(facts.find_declaration("View").unwrap().params, 1);
    }
}
