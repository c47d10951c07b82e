//! JavaScript language analyzer using tree-sitter.
//!
//! Handles plain scripts, ES modules, CommonJS and JSX.

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

; Methods in classes and object literals
(method_definition
  name: (property_identifier) @method_name
) @method

; Class declarations
(class_declaration
  name: (identifier) @class_name
) @class
"#;

pub struct JavaScriptAnalyzer {
    language: Language,
}

impl JavaScriptAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

impl Default for JavaScriptAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for JavaScriptAnalyzer {
    fn language_id(&self) -> &'static str {
        "javascript"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["js", "jsx", "mjs", "cjs"]
    }

    fn analyze(&self, path: &Path, source: &str) -> anyhow::Result<FileFacts> {
        ecmascript::analyze(
            &self.language,
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

    fn analyze(source: &str) -> FileFacts {
        JavaScriptAnalyzer::new()
            .analyze(Path::new("app.js"), source)
            .unwrap()
    }

    #[test]
    fn test_declarations() {
        let facts = analyze(
            r#"
const fs = require('fs');
import { join } from "path";

/**
 * Reads the config file.
 */
function loadConfig(path, encoding) {
  if (!path || !encoding) {
    return null;
  }
  return fs.readFileSync(join(path), encoding);
}

export const double = (x) => x * 2;
const square = x => x * x;

class Server {
  constructor(port) {
    this.port = port;
  }

  start() {
    for (const h of this.handlers) {
      h();
    }
  }
}
"#,
        );

        let names: Vec<_> = facts.declarations.iter().map(|d| d.qualified_name()).collect();
        assert_eq!(
            names,
            vec![
                "loadConfig",
                "double",
                "square",
                "Server",
                "Server.constructor",
                "Server.start"
            ]
        );

        let load = facts.find_declaration("loadConfig").unwrap();
        assert_eq!(load.kind, DeclarationKind::Function);
        assert_eq!(load.params, 2);
        assert_eq!(load.doc.as_deref(), Some("Reads the config file."));
        // if + ||
        assert_eq!(load.complexity(), 3);

        assert_eq!(facts.find_declaration("double").unwrap().params, 1);
        assert_eq!(facts.find_declaration("square").unwrap().params, 1);
        assert!(!facts.find_declaration("square").unwrap().is_documented());

        let start = facts.find_declaration("start").unwrap();
        assert_eq!(start.kind, DeclarationKind::Method);
        assert_eq!(start.owner.as_deref(), Some("Server"));
        assert_eq!(start.complexity(), 2);

        assert_eq!(
            facts.find_declaration("Server").unwrap().kind,
            DeclarationKind::Class
        );

        let imports: Vec<_> = facts.imports.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(imports, vec!["fs", "path"]);
    }

    #[test]
    fn test_line_comment_is_not_jsdoc() {
        let facts = analyze("// helper\nfunction f() {}\n");
        assert!(!facts.find_declaration("f").unwrap().is_documented());
        assert_eq!(facts.comments.len(), 1);
        assert_eq!(facts.comments[0].text, "helper");
    }
}
