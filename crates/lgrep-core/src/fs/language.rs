//! Language detection from file paths

use std::path::Path;

pub const LANG_GO: &str = "go";
pub const LANG_TYPESCRIPT: &str = "typescript";
pub const LANG_JAVASCRIPT: &str = "javascript";
pub const LANG_PYTHON: &str = "python";
pub const LANG_RUST: &str = "rust";
pub const LANG_JAVA: &str = "java";
pub const LANG_C: &str = "c";
pub const LANG_CPP: &str = "cpp";
pub const LANG_CSHARP: &str = "csharp";
pub const LANG_RUBY: &str = "ruby";
pub const LANG_PHP: &str = "php";
pub const LANG_SWIFT: &str = "swift";
pub const LANG_KOTLIN: &str = "kotlin";
pub const LANG_SCALA: &str = "scala";
pub const LANG_SHELL: &str = "shell";
pub const LANG_SQL: &str = "sql";
pub const LANG_HTML: &str = "html";
pub const LANG_CSS: &str = "css";
pub const LANG_JSON: &str = "json";
pub const LANG_YAML: &str = "yaml";
pub const LANG_TOML: &str = "toml";
pub const LANG_MARKDOWN: &str = "markdown";
pub const LANG_XML: &str = "xml";
pub const LANG_TEXT: &str = "text";
pub const LANG_UNKNOWN: &str = "";

/// Well-known filenames without a useful extension.
fn filename_language(name: &str) -> Option<&'static str> {
    Some(match name {
        "Makefile" | "makefile" => LANG_SHELL,
        "Dockerfile" | "dockerfile" => LANG_SHELL,
        "Jenkinsfile" => LANG_SHELL,
        "Rakefile" | "Gemfile" => LANG_RUBY,
        ".bashrc" | ".zshrc" | ".profile" => LANG_SHELL,
        ".gitignore" | ".gitconfig" | ".editorconfig" => LANG_TEXT,
        _ => return None,
    })
}

fn extension_language(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "go" => LANG_GO,
        "ts" | "tsx" | "mts" | "cts" => LANG_TYPESCRIPT,
        "js" | "jsx" | "mjs" | "cjs" => LANG_JAVASCRIPT,
        "py" | "pyi" | "pyw" => LANG_PYTHON,
        "rs" => LANG_RUST,
        "java" => LANG_JAVA,
        "c" | "h" => LANG_C,
        "cc" | "cpp" | "cxx" | "hpp" | "hxx" => LANG_CPP,
        "cs" => LANG_CSHARP,
        "rb" | "rake" => LANG_RUBY,
        "php" => LANG_PHP,
        "swift" => LANG_SWIFT,
        "kt" | "kts" => LANG_KOTLIN,
        "scala" => LANG_SCALA,
        "sh" | "bash" | "zsh" | "fish" => LANG_SHELL,
        "sql" => LANG_SQL,
        "html" | "htm" => LANG_HTML,
        "css" | "scss" | "sass" | "less" => LANG_CSS,
        "json" | "jsonc" => LANG_JSON,
        "yaml" | "yml" => LANG_YAML,
        "toml" => LANG_TOML,
        "xml" => LANG_XML,
        "md" | "markdown" => LANG_MARKDOWN,
        "txt" | "text" | "rst" => LANG_TEXT,
        _ => return None,
    })
}

/// Determine the language of a file from its path.
///
/// Well-known filenames are checked first, then the lowercased
/// extension. Returns [`LANG_UNKNOWN`] (the empty tag) when neither
/// matches.
pub fn detect_language(path: impl AsRef<Path>) -> &'static str {
    let path = path.as_ref();

    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if let Some(lang) = filename_language(name) {
            return lang;
        }
    }

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if let Some(lang) = extension_language(&ext.to_lowercase()) {
            return lang;
        }
    }

    LANG_UNKNOWN
}

/// True if the file appears to be source code.
pub fn is_code_file(path: impl AsRef<Path>) -> bool {
    matches!(
        detect_language(path),
        LANG_GO
            | LANG_TYPESCRIPT
            | LANG_JAVASCRIPT
            | LANG_PYTHON
            | LANG_RUST
            | LANG_JAVA
            | LANG_C
            | LANG_CPP
            | LANG_CSHARP
            | LANG_RUBY
            | LANG_PHP
            | LANG_SWIFT
            | LANG_KOTLIN
            | LANG_SCALA
            | LANG_SHELL
            | LANG_SQL
    )
}

/// True if the language gets code-aware chunking. General-purpose
/// source languages only; data and markup formats chunk as text.
pub fn supports_code_chunking(lang: &str) -> bool {
    matches!(
        lang,
        LANG_GO
            | LANG_TYPESCRIPT
            | LANG_JAVASCRIPT
            | LANG_PYTHON
            | LANG_RUST
            | LANG_JAVA
            | LANG_C
            | LANG_CPP
            | LANG_CSHARP
            | LANG_RUBY
            | LANG_PHP
            | LANG_SWIFT
            | LANG_KOTLIN
            | LANG_SCALA
    )
}
