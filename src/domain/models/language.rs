use serde::{Deserialize, Serialize};
use std::path::Path;

/// Programming languages the slicer and search filters understand.
///
/// Languages without a compiled-in tree-sitter grammar (`R`, `Sql`) still
/// carry a valid tag: the slicer falls back to a whole-file passthrough
/// snippet for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Go,
    JavaScript,
    TypeScript,
    Java,
    C,
    Cpp,
    Rust,
    CSharp,
    Php,
    Ruby,
    Swift,
    Kotlin,
    Scala,
    R,
    Sql,
    Html,
    Css,
    Shell,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "py" | "pyw" | "pyi" => Language::Python,
            "go" => Language::Go,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" => Language::Cpp,
            "rs" => Language::Rust,
            "cs" => Language::CSharp,
            "php" => Language::Php,
            "rb" => Language::Ruby,
            "swift" => Language::Swift,
            "kt" | "kts" => Language::Kotlin,
            "scala" | "sc" => Language::Scala,
            "r" => Language::R,
            "sql" => Language::Sql,
            "html" | "htm" => Language::Html,
            "css" | "scss" | "sass" | "less" => Language::Css,
            "sh" | "bash" | "zsh" => Language::Shell,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Case-insensitive parse of a language tag (`"python"`, `"Go"`, ...).
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "python" => Language::Python,
            "go" => Language::Go,
            "javascript" | "js" => Language::JavaScript,
            "typescript" | "ts" => Language::TypeScript,
            "java" => Language::Java,
            "c" => Language::C,
            "cpp" | "c++" => Language::Cpp,
            "rust" => Language::Rust,
            "csharp" | "c#" => Language::CSharp,
            "php" => Language::Php,
            "ruby" => Language::Ruby,
            "swift" => Language::Swift,
            "kotlin" => Language::Kotlin,
            "scala" => Language::Scala,
            "r" => Language::R,
            "sql" => Language::Sql,
            "html" => Language::Html,
            "css" => Language::Css,
            "shell" | "bash" | "sh" => Language::Shell,
            _ => Language::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Go => "go",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Rust => "rust",
            Language::CSharp => "csharp",
            Language::Php => "php",
            Language::Ruby => "ruby",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Scala => "scala",
            Language::R => "r",
            Language::Sql => "sql",
            Language::Html => "html",
            Language::Css => "css",
            Language::Shell => "shell",
            Language::Unknown => "unknown",
        }
    }

    /// Human-facing name used in hydrated search results ("Go", "Python").
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Go => "Go",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Java => "Java",
            Language::C => "C",
            Language::Cpp => "Cpp",
            Language::Rust => "Rust",
            Language::CSharp => "CSharp",
            Language::Php => "Php",
            Language::Ruby => "Ruby",
            Language::Swift => "Swift",
            Language::Kotlin => "Kotlin",
            Language::Scala => "Scala",
            Language::R => "R",
            Language::Sql => "Sql",
            Language::Html => "Html",
            Language::Css => "Css",
            Language::Shell => "Shell",
            Language::Unknown => "Unknown",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["py", "pyw", "pyi"],
            Language::Go => &["go"],
            Language::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Language::TypeScript => &["ts", "tsx"],
            Language::Java => &["java"],
            Language::C => &["c", "h"],
            Language::Cpp => &["cpp", "cc", "cxx", "hpp", "hxx"],
            Language::Rust => &["rs"],
            Language::CSharp => &["cs"],
            Language::Php => &["php"],
            Language::Ruby => &["rb"],
            Language::Swift => &["swift"],
            Language::Kotlin => &["kt", "kts"],
            Language::Scala => &["scala", "sc"],
            Language::R => &["r"],
            Language::Sql => &["sql"],
            Language::Html => &["html", "htm"],
            Language::Css => &["css", "scss", "sass", "less"],
            Language::Shell => &["sh", "bash", "zsh"],
            Language::Unknown => &[],
        }
    }

    pub fn primary_extension(&self) -> &'static str {
        self.extensions().first().copied().unwrap_or("")
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Language::Unknown)
    }

    /// Indent-scoped languages terminate signatures with `:`; brace-scoped
    /// ones with `{`.
    pub fn is_indent_scoped(&self) -> bool {
        matches!(self, Language::Python)
    }

    pub fn all_supported() -> Vec<Language> {
        vec![
            Language::Python,
            Language::Go,
            Language::JavaScript,
            Language::TypeScript,
            Language::Java,
            Language::C,
            Language::Cpp,
            Language::Rust,
            Language::CSharp,
            Language::Php,
            Language::Ruby,
            Language::Swift,
            Language::Kotlin,
            Language::Scala,
            Language::R,
            Language::Sql,
            Language::Html,
            Language::Css,
            Language::Shell,
        ]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_round_trip() {
        for lang in Language::all_supported() {
            for ext in lang.extensions() {
                assert_eq!(Language::from_extension(ext), lang, "extension {ext}");
            }
        }
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path(Path::new("main.go")), Language::Go);
        assert_eq!(Language::from_path(Path::new("src/lib.rs")), Language::Rust);
        assert_eq!(Language::from_path(Path::new("README")), Language::Unknown);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Language::parse("Python"), Language::Python);
        assert_eq!(Language::parse("GO"), Language::Go);
        assert_eq!(Language::parse("nonsense"), Language::Unknown);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(Language::Go.display_name(), "Go");
        assert_eq!(Language::Python.display_name(), "Python");
    }
}
