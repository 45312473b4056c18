use serde::{Deserialize, Serialize};

/// Language a loaded file was recognised as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageHint {
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    Markdown,
    Text,
}

impl LanguageHint {
    /// Map a lower-case file extension (without the dot) to a hint.
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_lowercase().as_str() {
            "py" => LanguageHint::Python,
            "js" | "mjs" | "cjs" | "jsx" => LanguageHint::JavaScript,
            "ts" | "mts" | "cts" => LanguageHint::TypeScript,
            "go" => LanguageHint::Go,
            "java" => LanguageHint::Java,
            "md" | "markdown" => LanguageHint::Markdown,
            _ => LanguageHint::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageHint::Python => "python",
            LanguageHint::JavaScript => "javascript",
            LanguageHint::TypeScript => "typescript",
            LanguageHint::Go => "go",
            LanguageHint::Java => "java",
            LanguageHint::Markdown => "markdown",
            LanguageHint::Text => "text",
        }
    }

    /// Inverse of [`LanguageHint::as_str`]; unknown names become `Text`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "python" => LanguageHint::Python,
            "javascript" => LanguageHint::JavaScript,
            "typescript" => LanguageHint::TypeScript,
            "go" => LanguageHint::Go,
            "java" => LanguageHint::Java,
            "markdown" => LanguageHint::Markdown,
            _ => LanguageHint::Text,
        }
    }

    /// Tree-sitter grammar used for segmentation, if any.
    pub fn tree_sitter_language(&self) -> Option<tree_sitter::Language> {
        match self {
            LanguageHint::Python => Some(tree_sitter_python::LANGUAGE.into()),
            LanguageHint::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            LanguageHint::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            LanguageHint::Go => Some(tree_sitter_go::LANGUAGE.into()),
            LanguageHint::Java | LanguageHint::Markdown | LanguageHint::Text => None,
        }
    }

    /// Line comment prefix used in simplified code.
    pub fn comment_prefix(&self) -> &'static str {
        match self {
            LanguageHint::Python => "#",
            _ => "//",
        }
    }
}
