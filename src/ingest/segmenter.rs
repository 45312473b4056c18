//! Source-aware segmentation.
//!
//! Files above the line threshold whose language has a grammar are parsed
//! with tree-sitter. Each top-level definition becomes its own segment and a
//! final "simplified" segment keeps the rest of the file with every extracted
//! definition collapsed to a one-line marker. Anything else stays whole.

use super::language::LanguageHint;
use serde::{Deserialize, Serialize};

/// How a segment was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    WholeFile,
    FunctionsClasses,
    SimplifiedCode,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::WholeFile => "whole_file",
            ContentKind::FunctionsClasses => "functions_classes",
            ContentKind::SimplifiedCode => "simplified_code",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "functions_classes" => ContentKind::FunctionsClasses,
            "simplified_code" => ContentKind::SimplifiedCode,
            _ => ContentKind::WholeFile,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Segment {
    pub text: String,
    pub kind: ContentKind,
}

#[derive(Debug, Clone, Copy)]
struct Definition {
    start_byte: usize,
    end_byte: usize,
    start_row: usize,
    /// Byte column of the first character on `start_row`
    start_col: usize,
    end_row: usize,
}

/// Split one file into logical segments.
pub fn segment_source(content: &str, language: LanguageHint, parser_threshold: usize) -> Vec<Segment> {
    if content.lines().count() <= parser_threshold {
        return whole(content);
    }

    let definitions = match extract_definitions(content, language) {
        Some(defs) if !defs.is_empty() => defs,
        _ => return whole(content),
    };

    let mut segments: Vec<Segment> = definitions
        .iter()
        .map(|def| Segment {
            text: content[def.start_byte..def.end_byte].to_string(),
            kind: ContentKind::FunctionsClasses,
        })
        .collect();

    segments.push(Segment {
        text: simplify(content, &definitions, language.comment_prefix()),
        kind: ContentKind::SimplifiedCode,
    });

    segments
}

fn whole(content: &str) -> Vec<Segment> {
    vec![Segment {
        text: content.to_string(),
        kind: ContentKind::WholeFile,
    }]
}

/// Top-level definitions in source order, or None when the language has no
/// grammar or the file does not parse cleanly.
fn extract_definitions(content: &str, language: LanguageHint) -> Option<Vec<Definition>> {
    let ts_language = language.tree_sitter_language()?;

    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&ts_language).ok()?;
    let tree = parser.parse(content, None)?;
    let root = tree.root_node();

    if root.has_error() {
        log::debug!("Syntax errors in {} source, keeping file whole", language.as_str());
        return None;
    }

    let mut cursor = root.walk();
    let definitions = root
        .children(&mut cursor)
        .filter(|node| is_definition(language, node))
        .map(|node| Definition {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_row: node.start_position().row,
            start_col: node.start_position().column,
            end_row: node.end_position().row,
        })
        .collect();

    Some(definitions)
}

fn is_definition(language: LanguageHint, node: &tree_sitter::Node) -> bool {
    match language {
        LanguageHint::Python => matches!(
            node.kind(),
            "function_definition" | "class_definition" | "decorated_definition"
        ),
        LanguageHint::JavaScript | LanguageHint::TypeScript => {
            if node.kind() == "export_statement" {
                return node
                    .child_by_field_name("declaration")
                    .map(|decl| is_script_declaration(language, decl.kind()))
                    .unwrap_or(false);
            }
            is_script_declaration(language, node.kind())
        }
        LanguageHint::Go => matches!(
            node.kind(),
            "function_declaration" | "method_declaration" | "type_declaration"
        ),
        LanguageHint::Java | LanguageHint::Markdown | LanguageHint::Text => false,
    }
}

fn is_script_declaration(language: LanguageHint, kind: &str) -> bool {
    match kind {
        "function_declaration" | "generator_function_declaration" | "class_declaration" => true,
        "abstract_class_declaration" | "interface_declaration" | "enum_declaration" => {
            language == LanguageHint::TypeScript
        }
        _ => false,
    }
}

fn simplify(content: &str, definitions: &[Definition], comment_prefix: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut simplified = Vec::with_capacity(lines.len());
    let mut pending = definitions.iter().peekable();
    let mut row = 0;

    while row < lines.len() {
        // definitions sharing a row with an already collapsed one
        while pending.peek().is_some_and(|def| def.start_row < row) {
            pending.next();
        }

        if let Some(def) = pending.peek() {
            if def.start_row == row {
                let line = lines[row];
                let (leading, rest) = match (line.get(..def.start_col), line.get(def.start_col..)) {
                    (Some(leading), Some(rest)) => (leading.trim_end(), rest),
                    _ => ("", line),
                };
                if !leading.is_empty() {
                    simplified.push(leading.to_string());
                }
                simplified.push(format!("{} Code for: {}", comment_prefix, rest));
                row = def.end_row + 1;
                pending.next();
                continue;
            }
        }

        simplified.push(lines[row].to_string());
        row += 1;
    }

    simplified.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYTHON_MODULE: &str = "import os\n\ndef alpha():\n    return 1\n\nclass Beta:\n    def run(self):\n        return 2\n\nVALUE = 3\n";

    #[test]
    fn test_small_file_stays_whole() {
        let segments = segment_source(PYTHON_MODULE, LanguageHint::Python, 500);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, ContentKind::WholeFile);
        assert_eq!(segments[0].text, PYTHON_MODULE);
    }

    #[test]
    fn test_python_definitions_extracted() {
        let segments = segment_source(PYTHON_MODULE, LanguageHint::Python, 3);

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].kind, ContentKind::FunctionsClasses);
        assert!(segments[0].text.starts_with("def alpha():"));
        assert!(segments[1].text.starts_with("class Beta:"));
        assert!(segments[1].text.contains("def run(self)"));

        let simplified = &segments[2];
        assert_eq!(simplified.kind, ContentKind::SimplifiedCode);
        assert!(simplified.text.contains("import os"));
        assert!(simplified.text.contains("# Code for: def alpha():"));
        assert!(simplified.text.contains("# Code for: class Beta:"));
        assert!(simplified.text.contains("VALUE = 3"));
        assert!(!simplified.text.contains("return 1"));
    }

    #[test]
    fn test_invalid_python_stays_whole() {
        let source = "def broken(:\n    pass\n\nx = [\n";
        let segments = segment_source(source, LanguageHint::Python, 1);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, ContentKind::WholeFile);
    }

    #[test]
    fn test_markdown_never_segmented() {
        let source = "# Title\n\nline\nline\nline\n";
        let segments = segment_source(source, LanguageHint::Markdown, 1);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, ContentKind::WholeFile);
    }

    #[test]
    fn test_go_uses_line_comment_marker() {
        let source = "package main\n\nfunc main() {\n}\n\ntype Server struct{}\n";
        let segments = segment_source(source, LanguageHint::Go, 1);

        assert_eq!(segments.len(), 3);
        let simplified = segments.last().unwrap();
        assert!(simplified.text.contains("package main"));
        assert!(simplified.text.contains("// Code for: func main() {"));
        assert!(simplified.text.contains("// Code for: type Server struct{}"));
    }

    #[test]
    fn test_javascript_exported_function() {
        let source = "export function answer() {\n  return 42;\n}\nconst x = 1;\n";
        let segments = segment_source(source, LanguageHint::JavaScript, 1);

        assert_eq!(segments.len(), 2);
        assert!(segments[0].text.starts_with("export function answer()"));
        assert!(segments[1].text.contains("const x = 1;"));
    }

    #[test]
    fn test_definition_starting_mid_line_keeps_leading_code() {
        let source = "const x = 1; function f() {\n  return 1;\n}\n";
        let segments = segment_source(source, LanguageHint::JavaScript, 1);

        assert_eq!(segments.len(), 2);
        assert!(segments[0].text.starts_with("function f()"));
        assert_eq!(segments[1].text, "const x = 1;\n// Code for: function f() {");
    }

    #[test]
    fn test_no_definitions_stays_whole() {
        let source = "a = 1\nb = 2\nc = 3\n";
        let segments = segment_source(source, LanguageHint::Python, 1);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, ContentKind::WholeFile);
    }
}
