use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use ignore::WalkBuilder;
use regex::Regex;
use tracing::debug;

use super::api_doc_extractor::extract_api_docs;
use super::treesitter_slicer::{
    config_for, extract_definition_name, extract_signature, parse_source, walk_nodes,
};
use crate::application::{SourceFile, StructureScanner};
use crate::domain::{DomainError, Language};

/// Caps keeping the scans bounded on large repositories.
const MAX_TREE_FILES: usize = 400;
const MAX_SIGNATURES_PER_FILE: usize = 5;
const MAX_README_CHARS: usize = 8000;
const MAX_CONTEXT_FILES: usize = 15;

/// [`StructureScanner`] over a checked-out working copy.
pub struct FilesystemStructureScanner;

impl FilesystemStructureScanner {
    pub fn new() -> Self {
        Self
    }

    fn walk(repo_path: &Path) -> Vec<PathBuf> {
        WalkBuilder::new(repo_path)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.path().to_path_buf())
            .collect()
    }

    fn relative(repo_path: &Path, file: &Path) -> String {
        file.strip_prefix(repo_path)
            .unwrap_or(file)
            .to_string_lossy()
            .to_string()
    }

    fn is_compose_file(name: &str) -> bool {
        let lower = name.to_lowercase();
        (lower.starts_with("docker-compose") || lower.starts_with("compose"))
            && (lower.ends_with(".yml") || lower.ends_with(".yaml"))
    }

    fn describe_compose(content: &str, out: &mut String) {
        let Ok(document) = serde_yaml::from_str::<serde_yaml::Value>(content) else {
            return;
        };
        let Some(services) = document.get("services").and_then(|s| s.as_mapping()) else {
            return;
        };
        for (name, service) in services {
            let Some(name) = name.as_str() else { continue };
            out.push_str(&format!("- service `{name}`"));
            if let Some(image) = service.get("image").and_then(|i| i.as_str()) {
                out.push_str(&format!(", image `{image}`"));
            } else if service.get("build").is_some() {
                out.push_str(", built from a local Dockerfile");
            }
            if let Some(ports) = service.get("ports").and_then(|p| p.as_sequence()) {
                let listed: Vec<String> = ports
                    .iter()
                    .filter_map(|p| p.as_str().map(|s| s.to_string()))
                    .collect();
                if !listed.is_empty() {
                    out.push_str(&format!(", ports {}", listed.join(" ")));
                }
            }
            if let Some(depends) = service.get("depends_on") {
                let names: Vec<String> = match depends {
                    serde_yaml::Value::Sequence(items) => items
                        .iter()
                        .filter_map(|i| i.as_str().map(|s| s.to_string()))
                        .collect(),
                    serde_yaml::Value::Mapping(map) => map
                        .keys()
                        .filter_map(|k| k.as_str().map(|s| s.to_string()))
                        .collect(),
                    _ => Vec::new(),
                };
                if !names.is_empty() {
                    out.push_str(&format!(", depends on {}", names.join(", ")));
                }
            }
            out.push('\n');
        }
    }

    fn signatures_for(content: &str, language: Language) -> Vec<String> {
        let Some(config) = config_for(language) else {
            return Vec::new();
        };
        let Some(tree) = parse_source(content, language) else {
            return Vec::new();
        };
        let mut nodes = Vec::new();
        walk_nodes(tree.root_node(), &mut nodes);

        let mut signatures = Vec::new();
        for node in nodes {
            if signatures.len() >= MAX_SIGNATURES_PER_FILE {
                break;
            }
            if !config.function_nodes.contains(&node.kind())
                && !config.method_nodes.contains(&node.kind())
            {
                continue;
            }
            if extract_definition_name(node, content, &config, language).is_none() {
                continue;
            }
            let text = content.get(node.byte_range()).unwrap_or("");
            signatures.push(extract_signature(text, language));
        }
        signatures
    }
}

impl Default for FilesystemStructureScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn create_table_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)CREATE\s+TABLE(?:\s+IF\s+NOT\s+EXISTS)?\s+["'`]?([A-Za-z0-9_.]+)"#)
            .expect("static regex")
    })
}

#[async_trait]
impl StructureScanner for FilesystemStructureScanner {
    async fn discover_architecture(&self, repo_path: &Path) -> Result<String, DomainError> {
        let mut narrative = String::new();
        let mut dockerfiles = 0usize;

        for file in Self::walk(repo_path) {
            let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.eq_ignore_ascii_case("dockerfile") {
                dockerfiles += 1;
            } else if Self::is_compose_file(name) {
                if let Ok(content) = std::fs::read_to_string(&file) {
                    narrative.push_str(&format!(
                        "Compose file `{}`:\n",
                        Self::relative(repo_path, &file)
                    ));
                    Self::describe_compose(&content, &mut narrative);
                }
            }
        }

        if dockerfiles > 0 {
            narrative.push_str(&format!(
                "The repository contains {dockerfiles} Dockerfile(s).\n"
            ));
        }
        if narrative.is_empty() {
            narrative.push_str("No deployable components discovered in the repository tree.\n");
        }
        Ok(narrative)
    }

    async fn discover_schemas(&self, repo_path: &Path) -> Result<String, DomainError> {
        let mut report = String::new();
        for file in Self::walk(repo_path) {
            let relative = Self::relative(repo_path, &file);
            let is_sql = file.extension().and_then(|e| e.to_str()) == Some("sql");
            let in_migrations = relative.contains("migrations/") || relative.contains("migrate/");
            if !is_sql && !in_migrations {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(&file) else {
                continue;
            };

            let tables: Vec<String> = create_table_regex()
                .captures_iter(&content)
                .map(|c| c[1].to_string())
                .collect();
            if is_sql || !tables.is_empty() {
                report.push_str(&format!("File `{relative}`"));
                if !tables.is_empty() {
                    report.push_str(&format!(": tables {}", tables.join(", ")));
                }
                report.push('\n');
            }
        }

        if report.is_empty() {
            report.push_str("No database schemas detected.\n");
        }
        Ok(report)
    }

    async fn repository_tree(&self, repo_path: &Path) -> Result<String, DomainError> {
        let mut files = Self::walk(repo_path);
        files.sort();
        if files.len() > MAX_TREE_FILES {
            debug!(
                total = files.len(),
                kept = MAX_TREE_FILES,
                "repository tree truncated"
            );
            files.truncate(MAX_TREE_FILES);
        }

        let mut tree = String::new();
        for file in &files {
            let relative = Self::relative(repo_path, file);
            let depth = relative.matches('/').count();
            let language = Language::from_path(file);

            let mut line = format!("{}├── {}", "│   ".repeat(depth), relative);
            if language.is_known() {
                if let Ok(content) = std::fs::read_to_string(file) {
                    let signatures = Self::signatures_for(&content, language);
                    if !signatures.is_empty() {
                        line.push_str(&format!(" - {}", signatures.join(", ")));
                    }
                }
            }
            tree.push_str(&line);
            tree.push('\n');
        }
        Ok(tree)
    }

    async fn gather_context(
        &self,
        repo_path: &Path,
        language: Language,
    ) -> Result<String, DomainError> {
        let mut context = String::new();

        for file in Self::walk(repo_path) {
            let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.to_lowercase().starts_with("readme") {
                if let Ok(content) = std::fs::read_to_string(&file) {
                    context.push_str("## README\n\n");
                    let mut body = content;
                    if body.len() > MAX_README_CHARS {
                        let mut cut = MAX_README_CHARS;
                        while !body.is_char_boundary(cut) {
                            cut -= 1;
                        }
                        body.truncate(cut);
                    }
                    context.push_str(&body);
                    context.push('\n');
                }
                break;
            }
        }

        let mut sources = Vec::new();
        for file in Self::walk(repo_path) {
            if sources.len() >= MAX_CONTEXT_FILES {
                break;
            }
            if Language::from_path(&file) != language {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(&file) else {
                continue;
            };
            sources.push(SourceFile {
                blob_sha: Self::relative(repo_path, &file),
                path: Self::relative(repo_path, &file),
                content,
            });
        }
        let records = extract_api_docs(&sources, language, false);
        if !records.is_empty() {
            context.push_str("\n## Public API\n\n");
            for record in records {
                context.push_str(&record.content);
                context.push('\n');
            }
        }

        if context.is_empty() {
            context.push_str("No README or public API surface found.\n");
        }
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_discover_architecture_reads_compose_services() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "docker-compose.yml",
            "services:\n  api:\n    image: acme/api:1.0\n    ports:\n      - \"8080:8080\"\n  db:\n    image: postgres:16\n",
        );

        let scanner = FilesystemStructureScanner::new();
        let narrative = scanner.discover_architecture(dir.path()).await.unwrap();
        assert!(narrative.contains("service `api`"));
        assert!(narrative.contains("postgres:16"));
    }

    #[tokio::test]
    async fn test_discover_architecture_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = FilesystemStructureScanner::new();
        let narrative = scanner.discover_architecture(dir.path()).await.unwrap();
        assert!(narrative.contains("No deployable components"));
    }

    #[tokio::test]
    async fn test_discover_schemas_finds_create_table() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "migrations/001_init.sql",
            "CREATE TABLE users (id INTEGER PRIMARY KEY);\nCREATE TABLE IF NOT EXISTS posts (id INTEGER);\n",
        );

        let scanner = FilesystemStructureScanner::new();
        let report = scanner.discover_schemas(dir.path()).await.unwrap();
        assert!(report.contains("users"));
        assert!(report.contains("posts"));
        assert!(!report.contains("No database schemas detected"));
    }

    #[tokio::test]
    async fn test_discover_schemas_reports_absence() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.go", "package main\n");

        let scanner = FilesystemStructureScanner::new();
        let report = scanner.discover_schemas(dir.path()).await.unwrap();
        assert!(report.contains("No database schemas detected"));
    }

    #[tokio::test]
    async fn test_repository_tree_includes_signatures() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "calc.py", "def add(a, b):\n    return a + b\n");

        let scanner = FilesystemStructureScanner::new();
        let tree = scanner.repository_tree(dir.path()).await.unwrap();
        assert!(tree.contains("calc.py"));
        assert!(tree.contains("def add(a, b)"));
    }

    #[tokio::test]
    async fn test_gather_context_includes_readme_and_api() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "README.md", "# Calc\nAdds numbers.\n");
        write(dir.path(), "calc.py", "def add(a, b):\n    return a + b\n");

        let scanner = FilesystemStructureScanner::new();
        let context = scanner
            .gather_context(dir.path(), Language::Python)
            .await
            .unwrap();
        assert!(context.contains("Adds numbers."));
        assert!(context.contains("### `add`"));
    }
}
