use tracing::debug;

use super::treesitter_slicer::{
    config_for, extract_definition_name, extract_signature, parse_source, walk_nodes,
};
use crate::application::{ApiDocRecord, SourceFile};
use crate::domain::Language;

/// Languages that get generated API documentation.
const SUPPORTED: [Language; 8] = [
    Language::C,
    Language::Cpp,
    Language::CSharp,
    Language::Go,
    Language::Java,
    Language::JavaScript,
    Language::Python,
    Language::Rust,
];

fn type_node_kinds(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python => &["class_definition"],
        Language::JavaScript | Language::TypeScript => &["class_declaration"],
        Language::Java => &["class_declaration", "interface_declaration", "enum_declaration"],
        Language::Go => &["type_declaration"],
        Language::Rust => &["struct_item", "enum_item", "trait_item"],
        Language::C | Language::Cpp => &["struct_specifier", "class_specifier", "enum_specifier"],
        Language::CSharp => &["class_declaration", "interface_declaration", "enum_declaration"],
        _ => &[],
    }
}

/// Heuristic visibility check matching each language's convention.
fn is_public(name: &str, definition_text: &str, language: Language) -> bool {
    match language {
        Language::Python => !name.starts_with('_'),
        Language::Go => name.chars().next().is_some_and(|c| c.is_ascii_uppercase()),
        Language::Rust => definition_text.trim_start().starts_with("pub "),
        _ => true,
    }
}

/// Doc comment attached to a definition node: contiguous comment lines
/// immediately above it.
fn leading_doc_comment(content: &str, start_byte: usize) -> String {
    let head = &content[..start_byte];
    let mut doc_lines: Vec<&str> = Vec::new();
    for line in head.lines().rev() {
        let trimmed = line.trim();
        if trimmed.starts_with("//")
            || trimmed.starts_with('#')
            || trimmed.starts_with("*")
            || trimmed.starts_with("/*")
            || trimmed.starts_with("\"\"\"")
        {
            let cleaned = trimmed
                .trim_start_matches('/')
                .trim_start_matches('#')
                .trim_start_matches('*')
                .trim_start_matches("\"\"\"")
                .trim();
            doc_lines.push(cleaned);
        } else if trimmed.is_empty() && doc_lines.is_empty() {
            continue;
        } else {
            break;
        }
    }
    doc_lines.reverse();
    doc_lines.join(" ").trim().to_string()
}

fn module_path(path: &str) -> String {
    let without_extension = match path.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => path,
    };
    without_extension.replace('/', ".")
}

/// Extract a Go-Doc style Markdown document per module (file).
pub fn extract_api_docs(
    files: &[SourceFile],
    language: Language,
    include_private: bool,
) -> Vec<ApiDocRecord> {
    if files.is_empty() || !SUPPORTED.contains(&language) {
        return Vec::new();
    }
    let Some(config) = config_for(language) else {
        return Vec::new();
    };
    let type_kinds = type_node_kinds(language);

    let mut records = Vec::new();
    for file in files {
        let Some(tree) = parse_source(&file.content, language) else {
            debug!(path = file.path, "failed to parse file, skipping");
            continue;
        };

        let mut nodes = Vec::new();
        walk_nodes(tree.root_node(), &mut nodes);

        let mut functions: Vec<(String, String, String)> = Vec::new();
        let mut types: Vec<(String, String)> = Vec::new();

        for node in nodes {
            let kind = node.kind();
            let is_function = config.function_nodes.contains(&kind)
                || config.method_nodes.contains(&kind);
            let is_type = type_kinds.contains(&kind);
            if !is_function && !is_type {
                continue;
            }

            let Some(name) = extract_definition_name(node, &file.content, &config, language)
            else {
                continue;
            };
            let text = file.content.get(node.byte_range()).unwrap_or("");
            if !include_private && !is_public(&name, text, language) {
                continue;
            }

            let doc = leading_doc_comment(&file.content, node.start_byte());
            if is_function {
                functions.push((name, extract_signature(text, language), doc));
            } else {
                types.push((name, doc));
            }
        }

        if functions.is_empty() && types.is_empty() {
            continue;
        }

        let module = module_path(&file.path);
        let mut markdown = format!("# package {module}\n");

        if !types.is_empty() {
            markdown.push_str("\n## Types\n");
            for (name, doc) in &types {
                markdown.push_str(&format!("\n### `{name}`\n"));
                if !doc.is_empty() {
                    markdown.push_str(&format!("\n{doc}\n"));
                }
            }
        }

        if !functions.is_empty() {
            markdown.push_str("\n## Functions\n");
            for (name, signature, doc) in &functions {
                markdown.push_str(&format!("\n### `{name}`\n\n```\n{signature}\n```\n"));
                if !doc.is_empty() {
                    markdown.push_str(&format!("\n{doc}\n"));
                }
            }
        }

        records.push(ApiDocRecord {
            blob_sha: file.blob_sha.clone(),
            module_path: module,
            content: markdown,
        });
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile {
            blob_sha: format!("blob-{path}"),
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_python_module_docs() {
        let files = vec![file(
            "src/calc.py",
            r#"
# Adds two numbers.
def add(a, b):
    return a + b

def _hidden():
    pass

class Calculator:
    pass
"#,
        )];

        let records = extract_api_docs(&files, Language::Python, false);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.module_path, "src.calc");
        assert!(record.content.contains("# package src.calc"));
        assert!(record.content.contains("### `add`"));
        assert!(record.content.contains("Adds two numbers."));
        assert!(record.content.contains("### `Calculator`"));
        assert!(!record.content.contains("_hidden"));
    }

    #[test]
    fn test_include_private_keeps_underscored_names() {
        let files = vec![file("m.py", "def _hidden():\n    pass\n")];
        assert!(extract_api_docs(&files, Language::Python, false).is_empty());
        let records = extract_api_docs(&files, Language::Python, true);
        assert_eq!(records.len(), 1);
        assert!(records[0].content.contains("_hidden"));
    }

    #[test]
    fn test_go_private_functions_are_excluded() {
        let files = vec![file(
            "pkg/server.go",
            "package pkg\n\nfunc Public() {}\n\nfunc private() {}\n",
        )];

        let records = extract_api_docs(&files, Language::Go, false);
        assert_eq!(records.len(), 1);
        assert!(records[0].content.contains("### `Public`"));
        assert!(!records[0].content.contains("### `private`"));
    }

    #[test]
    fn test_file_with_no_public_api_yields_no_record() {
        let files = vec![file("empty.py", "X = 1\n")];
        assert!(extract_api_docs(&files, Language::Python, false).is_empty());
    }

    #[test]
    fn test_unsupported_language_yields_nothing() {
        let files = vec![file("style.css", ".a { color: red; }")];
        assert!(extract_api_docs(&files, Language::Css, false).is_empty());
    }

    #[test]
    fn test_records_are_keyed_by_blob_sha() {
        let files = vec![file("a.py", "def f():\n    pass\n")];
        let records = extract_api_docs(&files, Language::Python, false);
        assert_eq!(records[0].blob_sha, "blob-a.py");
    }
}
