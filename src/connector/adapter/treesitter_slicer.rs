use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tracing::debug;
use tree_sitter::{Node, Parser, Tree};

use crate::application::{ApiDocRecord, SlicerService, SourceFile};
use crate::domain::{DomainError, Language, Snippet};

/// Longest signature line kept for tree summaries.
pub const MAX_SIGNATURE_CHARS: usize = 100;

/// Per-language node tables driving the slicer walk.
pub(crate) struct LanguageConfig {
    pub function_nodes: &'static [&'static str],
    pub method_nodes: &'static [&'static str],
    pub call_node: &'static str,
    pub import_nodes: &'static [&'static str],
    pub name_field: Option<&'static str>,
}

pub(crate) fn config_for(language: Language) -> Option<LanguageConfig> {
    let config = match language {
        Language::Python => LanguageConfig {
            function_nodes: &["function_definition"],
            method_nodes: &[],
            call_node: "call",
            import_nodes: &["import_statement", "import_from_statement"],
            name_field: None,
        },
        Language::Java => LanguageConfig {
            function_nodes: &["method_declaration"],
            method_nodes: &[],
            call_node: "method_invocation",
            import_nodes: &["import_declaration"],
            name_field: None,
        },
        Language::C => LanguageConfig {
            function_nodes: &["function_definition"],
            method_nodes: &[],
            call_node: "call_expression",
            import_nodes: &["preproc_include"],
            name_field: Some("declarator"),
        },
        Language::Cpp => LanguageConfig {
            function_nodes: &["function_definition"],
            method_nodes: &[],
            call_node: "call_expression",
            import_nodes: &["preproc_include", "using_declaration"],
            name_field: Some("declarator"),
        },
        Language::Rust => LanguageConfig {
            function_nodes: &["function_item"],
            method_nodes: &[],
            call_node: "call_expression",
            import_nodes: &["use_declaration", "extern_crate_declaration"],
            name_field: Some("name"),
        },
        Language::Go => LanguageConfig {
            function_nodes: &["function_declaration"],
            method_nodes: &["method_declaration"],
            call_node: "call_expression",
            import_nodes: &["import_declaration"],
            name_field: None,
        },
        Language::JavaScript | Language::TypeScript => LanguageConfig {
            function_nodes: &[
                "function_declaration",
                "function_expression",
                "arrow_function",
                "method_definition",
            ],
            method_nodes: &[],
            call_node: "call_expression",
            import_nodes: &["import_statement"],
            name_field: None,
        },
        Language::CSharp => LanguageConfig {
            function_nodes: &["method_declaration", "local_function_statement"],
            method_nodes: &[],
            call_node: "invocation_expression",
            import_nodes: &["using_directive"],
            name_field: Some("name"),
        },
        Language::Php => LanguageConfig {
            function_nodes: &["function_definition", "method_declaration"],
            method_nodes: &[],
            call_node: "function_call_expression",
            import_nodes: &["namespace_use_declaration"],
            name_field: Some("name"),
        },
        Language::Ruby => LanguageConfig {
            function_nodes: &["method", "singleton_method"],
            method_nodes: &[],
            call_node: "call",
            import_nodes: &[],
            name_field: Some("name"),
        },
        Language::Swift => LanguageConfig {
            function_nodes: &["function_declaration"],
            method_nodes: &[],
            call_node: "call_expression",
            import_nodes: &["import_declaration"],
            name_field: Some("name"),
        },
        Language::Kotlin => LanguageConfig {
            function_nodes: &["function_declaration"],
            method_nodes: &[],
            call_node: "call_expression",
            import_nodes: &["import_header"],
            name_field: None,
        },
        Language::Scala => LanguageConfig {
            function_nodes: &["function_definition"],
            method_nodes: &[],
            call_node: "call_expression",
            import_nodes: &["import_declaration"],
            name_field: Some("name"),
        },
        Language::Shell => LanguageConfig {
            function_nodes: &["function_definition"],
            method_nodes: &[],
            call_node: "command",
            import_nodes: &[],
            name_field: Some("name"),
        },
        Language::Html => LanguageConfig {
            function_nodes: &["element"],
            method_nodes: &[],
            call_node: "",
            import_nodes: &[],
            name_field: None,
        },
        Language::Css => LanguageConfig {
            function_nodes: &["rule_set"],
            method_nodes: &[],
            call_node: "",
            import_nodes: &["import_statement"],
            name_field: None,
        },
        // R and SQL carry valid tags but no compiled-in grammar; they take
        // the passthrough path.
        Language::R | Language::Sql | Language::Unknown => return None,
    };
    Some(config)
}

pub(crate) fn grammar_for(language: Language) -> Option<tree_sitter::Language> {
    match language {
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
        Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
        Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
        Language::C => Some(tree_sitter_c::LANGUAGE.into()),
        Language::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
        Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
        Language::CSharp => Some(tree_sitter_c_sharp::LANGUAGE.into()),
        Language::Php => Some(tree_sitter_php::LANGUAGE_PHP.into()),
        Language::Ruby => Some(tree_sitter_ruby::LANGUAGE.into()),
        Language::Swift => Some(tree_sitter_swift::LANGUAGE.into()),
        Language::Kotlin => Some(tree_sitter_kotlin_ng::LANGUAGE.into()),
        Language::Scala => Some(tree_sitter_scala::LANGUAGE.into()),
        Language::Html => Some(tree_sitter_html::LANGUAGE.into()),
        Language::Css => Some(tree_sitter_css::LANGUAGE.into()),
        Language::Shell => Some(tree_sitter_bash::LANGUAGE.into()),
        Language::R | Language::Sql | Language::Unknown => None,
    }
}

pub(crate) fn parse_source(content: &str, language: Language) -> Option<Tree> {
    let grammar = grammar_for(language)?;
    let mut parser = Parser::new();
    parser.set_language(&grammar).ok()?;
    parser.parse(content, None)
}

/// Walk the tree depth-first, collecting every node.
pub(crate) fn walk_nodes<'a>(root: Node<'a>, out: &mut Vec<Node<'a>>) {
    out.push(root);
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        walk_nodes(child, out);
    }
}

fn node_text<'a>(node: Node<'a>, content: &'a str) -> &'a str {
    content.get(node.byte_range()).unwrap_or("")
}

/// Extract the definition's name following the language rules: the
/// grammar's `name` field where one exists, `field_identifier` for Go
/// methods, declarator descent for C and C++, first identifier-like child
/// as the last resort.
pub(crate) fn extract_definition_name(
    node: Node,
    content: &str,
    config: &LanguageConfig,
    language: Language,
) -> Option<String> {
    if language == Language::Go && node.kind() == "method_declaration" {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "field_identifier" {
                return Some(node_text(child, content).to_string());
            }
        }
        return None;
    }

    if let Some(named) = node.child_by_field_name("name") {
        if is_identifier_kind(named.kind()) {
            return Some(node_text(named, content).to_string());
        }
    }

    if let Some(field) = config.name_field {
        if let Some(named) = node.child_by_field_name(field) {
            if is_identifier_kind(named.kind()) {
                return Some(node_text(named, content).to_string());
            }
            // C/C++ route the name through a declarator chain.
            let mut nodes = Vec::new();
            walk_nodes(named, &mut nodes);
            for candidate in nodes {
                if candidate.kind() == "identifier" {
                    return Some(node_text(candidate, content).to_string());
                }
            }
            return None;
        }
    }

    // Last resort; deliberately excludes type_identifier so a leading
    // return-type annotation (Java, C#) is never mistaken for the name.
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(
            child.kind(),
            "identifier" | "simple_identifier" | "field_identifier" | "property_identifier"
                | "name" | "word"
        ) {
            return Some(node_text(child, content).to_string());
        }
    }
    None
}

fn is_identifier_kind(kind: &str) -> bool {
    matches!(
        kind,
        "identifier" | "simple_identifier" | "field_identifier" | "property_identifier" | "name"
            | "word" | "type_identifier" | "constant"
    )
}

/// First bracket-balanced signature line: stops at a line ending in `:` for
/// indent-scoped languages or `{` for brace-scoped ones, capped at
/// [`MAX_SIGNATURE_CHARS`].
pub fn extract_signature(definition_text: &str, language: Language) -> String {
    let terminator = if language.is_indent_scoped() { ':' } else { '{' };
    let mut depth: i32 = 0;
    let mut collected = String::new();

    for line in definition_text.lines() {
        for c in line.chars() {
            match c {
                '(' | '[' => depth += 1,
                ')' | ']' => depth -= 1,
                _ => {}
            }
        }
        if !collected.is_empty() {
            collected.push(' ');
        }
        collected.push_str(line.trim());

        let trimmed = line.trim_end();
        if depth <= 0 && trimmed.ends_with(terminator) {
            break;
        }
    }

    let signature = collected
        .trim_end_matches(terminator)
        .trim_end()
        .to_string();
    if signature.len() > MAX_SIGNATURE_CHARS {
        let mut cut = MAX_SIGNATURE_CHARS;
        while !signature.is_char_boundary(cut) {
            cut -= 1;
        }
        signature[..cut].to_string()
    } else {
        signature
    }
}

fn module_stem(path: &str) -> String {
    std::path::Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string()
}

#[derive(Debug, Clone)]
pub(crate) struct DefinitionInfo {
    pub file_index: usize,
    pub name: String,
    pub qualified_name: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_row: usize,
}

/// Intra-file-set analysis: definitions, imports, and the call graph.
pub(crate) struct Analysis {
    pub definitions: HashMap<String, DefinitionInfo>,
    pub call_graph: HashMap<String, BTreeSet<String>>,
    pub reverse_calls: HashMap<String, BTreeSet<String>>,
    pub imports: Vec<HashMap<String, String>>,
}

pub(crate) fn analyze(files: &[SourceFile], language: Language) -> Analysis {
    let mut analysis = Analysis {
        definitions: HashMap::new(),
        call_graph: HashMap::new(),
        reverse_calls: HashMap::new(),
        imports: vec![HashMap::new(); files.len()],
    };
    let Some(config) = config_for(language) else {
        return analysis;
    };

    let mut trees: Vec<Option<Tree>> = Vec::with_capacity(files.len());
    for file in files {
        let tree = parse_source(&file.content, language);
        if tree.is_none() {
            debug!(path = file.path, "failed to parse file, skipping");
        }
        trees.push(tree);
    }

    // Pass 1: definitions and imports.
    for (file_index, (file, tree)) in files.iter().zip(trees.iter()).enumerate() {
        let Some(tree) = tree else { continue };
        let stem = module_stem(&file.path);
        let mut nodes = Vec::new();
        walk_nodes(tree.root_node(), &mut nodes);

        for node in &nodes {
            if config.function_nodes.contains(&node.kind())
                || config.method_nodes.contains(&node.kind())
            {
                let Some(name) =
                    extract_definition_name(*node, &file.content, &config, language)
                else {
                    continue;
                };
                let qualified_name = format!("{stem}.{name}");
                analysis.definitions.insert(
                    qualified_name.clone(),
                    DefinitionInfo {
                        file_index,
                        name,
                        qualified_name,
                        start_byte: node.start_byte(),
                        end_byte: node.end_byte(),
                        start_row: node.start_position().row,
                    },
                );
            } else if config.import_nodes.contains(&node.kind()) {
                for (alias, target) in extract_imports(*node, &file.content) {
                    analysis.imports[file_index].insert(alias, target);
                }
            }
        }
    }

    // Pass 2: call edges, resolved locally first, then through import
    // aliases, then as already-qualified names.
    if !config.call_node.is_empty() {
        let qualified: Vec<String> = analysis.definitions.keys().cloned().collect();
        for qualified_name in qualified {
            let info = analysis.definitions[&qualified_name].clone();
            let file = &files[info.file_index];
            let Some(tree) = &trees[info.file_index] else {
                continue;
            };
            let Some(def_node) = node_at_range(tree.root_node(), info.start_byte, info.end_byte)
            else {
                continue;
            };

            let stem = module_stem(&file.path);
            let mut nodes = Vec::new();
            walk_nodes(def_node, &mut nodes);
            let mut callees = BTreeSet::new();
            for node in nodes {
                if node.kind() != config.call_node {
                    continue;
                }
                let Some(callee) = extract_call_name(node, &file.content) else {
                    continue;
                };
                let resolved = resolve_call(
                    &callee,
                    &stem,
                    &analysis.definitions,
                    &analysis.imports[info.file_index],
                );
                if let Some(resolved) = resolved {
                    if resolved != qualified_name {
                        callees.insert(resolved);
                    }
                }
            }
            for callee in &callees {
                analysis
                    .reverse_calls
                    .entry(callee.clone())
                    .or_default()
                    .insert(qualified_name.clone());
            }
            analysis.call_graph.insert(qualified_name, callees);
        }
    }

    analysis
}

fn node_at_range(root: Node, start_byte: usize, end_byte: usize) -> Option<Node> {
    let node = root.descendant_for_byte_range(start_byte, end_byte)?;
    Some(node)
}

fn extract_call_name(call: Node, content: &str) -> Option<String> {
    let target = call
        .child_by_field_name("function")
        .or_else(|| call.child_by_field_name("name"))
        .or_else(|| call.child(0))?;

    match target.kind() {
        "identifier" | "simple_identifier" | "word" | "name" => {
            Some(node_text(target, content).to_string())
        }
        "attribute" | "field_expression" | "member_expression" | "selector_expression"
        | "navigation_expression" | "scoped_identifier" | "qualified_identifier" => {
            let mut nodes = Vec::new();
            walk_nodes(target, &mut nodes);
            let mut parts: Vec<&str> = Vec::new();
            for node in nodes {
                if is_identifier_kind(node.kind()) && node.child_count() == 0 {
                    parts.push(node_text(node, content));
                }
            }
            match parts.as_slice() {
                [] => None,
                [single] => Some((*single).to_string()),
                [.., object, method] => Some(format!("{object}.{method}")),
            }
        }
        _ => None,
    }
}

fn extract_imports(node: Node, content: &str) -> Vec<(String, String)> {
    let mut imports = Vec::new();
    let mut nodes = Vec::new();
    walk_nodes(node, &mut nodes);
    for candidate in nodes {
        if matches!(candidate.kind(), "dotted_name" | "qualified_name" | "scoped_identifier") {
            let target = node_text(candidate, content).to_string();
            let alias = target.rsplit('.').next().unwrap_or(&target).to_string();
            imports.push((alias, target));
        }
    }
    imports
}

fn resolve_call(
    callee: &str,
    stem: &str,
    definitions: &HashMap<String, DefinitionInfo>,
    imports: &HashMap<String, String>,
) -> Option<String> {
    let local = format!("{stem}.{callee}");
    if definitions.contains_key(&local) {
        return Some(local);
    }
    // Method-style callee: resolve the rightmost segment locally too.
    if let Some((_, method)) = callee.rsplit_once('.') {
        let local_method = format!("{stem}.{method}");
        if definitions.contains_key(&local_method) {
            return Some(local_method);
        }
    }
    if let Some(target) = imports.get(callee) {
        if definitions.contains_key(target) {
            return Some(target.clone());
        }
    }
    if definitions.contains_key(callee) {
        return Some(callee.to_string());
    }
    None
}

/// Kahn topological sort over a dependency subset; members of cycles are
/// appended in arbitrary order at the end.
pub(crate) fn topological_sort(
    members: &BTreeSet<String>,
    call_graph: &HashMap<String, BTreeSet<String>>,
) -> Vec<String> {
    let mut in_degree: HashMap<&str, usize> = members.iter().map(|m| (m.as_str(), 0)).collect();
    for member in members {
        if let Some(callees) = call_graph.get(member) {
            for callee in callees {
                if members.contains(callee) {
                    *in_degree.entry(callee.as_str()).or_insert(0) += 1;
                }
            }
        }
    }

    let mut queue: Vec<&str> = members
        .iter()
        .map(|m| m.as_str())
        .filter(|m| in_degree[m] == 0)
        .collect();
    let mut sorted: Vec<String> = Vec::new();
    while let Some(current) = queue.pop() {
        sorted.push(current.to_string());
        if let Some(callees) = call_graph.get(current) {
            for callee in callees {
                if let Some(degree) = in_degree.get_mut(callee.as_str()) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push(callee.as_str());
                    }
                }
            }
        }
    }
    for member in members {
        if !sorted.contains(member) {
            sorted.push(member.clone());
        }
    }
    sorted
}

/// Tree-sitter backed implementation of the slicer contract.
pub struct TreeSitterSlicer;

impl TreeSitterSlicer {
    pub fn new() -> Self {
        Self
    }

    fn extract_markup_snippets(
        files: &[SourceFile],
        language: Language,
    ) -> Vec<Snippet> {
        let mut snippets = Vec::new();
        let Some(config) = config_for(language) else {
            return snippets;
        };
        for file in files {
            let Some(tree) = parse_source(&file.content, language) else {
                debug!(path = file.path, "failed to parse file, skipping");
                continue;
            };
            let stem = module_stem(&file.path);
            let mut nodes = Vec::new();
            walk_nodes(tree.root_node(), &mut nodes);
            for node in nodes {
                if !config.function_nodes.contains(&node.kind()) {
                    continue;
                }
                let Some(selector) = markup_selector(node, &file.content, language) else {
                    continue;
                };
                let text = node_text(node, &file.content);
                if text.trim().is_empty() {
                    continue;
                }
                snippets.push(
                    Snippet::new(text, language)
                        .with_qualified_name(format!("{stem}.{selector}"))
                        .with_derivation(&file.blob_sha),
                );
            }
        }
        snippets
    }

    fn passthrough_snippets(files: &[SourceFile], language: Language) -> Vec<Snippet> {
        files
            .iter()
            .filter(|f| !f.content.trim().is_empty())
            .map(|f| {
                Snippet::new(&f.content, language)
                    .with_qualified_name(module_stem(&f.path))
                    .with_derivation(&f.blob_sha)
            })
            .collect()
    }

    /// Up to `limit` callers of a definition, with the literal call-site
    /// line. Backs "usage example" retrieval.
    pub fn find_callers(
        files: &[SourceFile],
        language: Language,
        qualified_name: &str,
        limit: usize,
    ) -> Vec<(String, String)> {
        let analysis = analyze(files, language);
        let Some(callers) = analysis.reverse_calls.get(qualified_name) else {
            return Vec::new();
        };
        let target_name = qualified_name.rsplit('.').next().unwrap_or(qualified_name);

        let mut results = Vec::new();
        for caller in callers.iter().take(limit) {
            let Some(info) = analysis.definitions.get(caller) else {
                continue;
            };
            let content = &files[info.file_index].content;
            let body = content.get(info.start_byte..info.end_byte).unwrap_or("");
            let call_line = body
                .lines()
                .find(|line| line.contains(target_name) && line.contains('('))
                .map(|line| line.trim().to_string())
                .unwrap_or_else(|| format!("calls {target_name}"));
            results.push((caller.clone(), call_line));
        }
        results
    }

    /// Bundle a definition with its dependencies (topologically sorted,
    /// cycle members appended last) and up to two usage examples.
    pub fn bundle_snippet(
        files: &[SourceFile],
        language: Language,
        qualified_name: &str,
    ) -> Option<String> {
        let analysis = analyze(files, language);
        let info = analysis.definitions.get(qualified_name)?;

        let mut dependencies: BTreeSet<String> = BTreeSet::new();
        let mut frontier = vec![(qualified_name.to_string(), 0usize)];
        while let Some((current, depth)) = frontier.pop() {
            if depth >= 2 || dependencies.len() >= 8 {
                continue;
            }
            if let Some(callees) = analysis.call_graph.get(&current) {
                for callee in callees {
                    if callee != qualified_name && dependencies.insert(callee.clone()) {
                        frontier.push((callee.clone(), depth + 1));
                    }
                }
            }
        }

        let mut out = String::new();
        let content = &files[info.file_index].content;
        out.push_str(content.get(info.start_byte..info.end_byte).unwrap_or(""));

        let sorted = topological_sort(&dependencies, &analysis.call_graph);
        if !sorted.is_empty() {
            out.push_str("\n\n// === DEPENDENCIES ===\n");
            for dependency in sorted {
                if let Some(dep) = analysis.definitions.get(&dependency) {
                    let dep_content = &files[dep.file_index].content;
                    out.push('\n');
                    out.push_str(dep_content.get(dep.start_byte..dep.end_byte).unwrap_or(""));
                    out.push('\n');
                }
            }
        }

        let callers = Self::find_callers(files, language, qualified_name, 2);
        if !callers.is_empty() {
            out.push_str("\n// === USAGE EXAMPLES ===\n");
            for (caller, line) in callers {
                out.push_str(&format!("// From {caller}:\n//     {line}\n"));
            }
        }
        Some(out)
    }
}

fn markup_selector(node: Node, content: &str, language: Language) -> Option<String> {
    match language {
        Language::Css => {
            let selectors = node.child_by_field_name("selectors").or_else(|| node.child(0))?;
            let text = node_text(selectors, content).trim().to_string();
            (!text.is_empty()).then_some(text)
        }
        Language::Html => {
            let mut nodes = Vec::new();
            walk_nodes(node, &mut nodes);
            let start_tag = nodes.iter().find(|n| n.kind() == "start_tag")?;
            let mut tag = String::new();
            let mut id = None;
            let mut class = None;
            let mut children = Vec::new();
            walk_nodes(*start_tag, &mut children);
            for child in &children {
                match child.kind() {
                    "tag_name" if tag.is_empty() => {
                        tag = node_text(*child, content).to_string();
                    }
                    "attribute" => {
                        let text = node_text(*child, content);
                        if let Some(value) = attribute_value(text, "id") {
                            id = Some(value);
                        } else if let Some(value) = attribute_value(text, "class") {
                            class = Some(value);
                        }
                    }
                    _ => {}
                }
            }
            if let Some(id) = id {
                Some(format!("{tag}#{id}"))
            } else if let Some(class) = class {
                let first = class.split_whitespace().next().unwrap_or(&class).to_string();
                Some(format!("{tag}.{first}"))
            } else if !tag.is_empty() {
                Some(tag)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn attribute_value(attribute_text: &str, name: &str) -> Option<String> {
    let (key, value) = attribute_text.split_once('=')?;
    if key.trim() != name {
        return None;
    }
    Some(value.trim().trim_matches(['"', '\'']).to_string())
}

impl Default for TreeSitterSlicer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SlicerService for TreeSitterSlicer {
    async fn extract_snippets(
        &self,
        files: &[SourceFile],
        language: Language,
    ) -> Result<Vec<Snippet>, DomainError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        if matches!(language, Language::Html | Language::Css) {
            return Ok(Self::extract_markup_snippets(files, language));
        }
        if grammar_for(language).is_none() {
            return Ok(Self::passthrough_snippets(files, language));
        }

        let analysis = analyze(files, language);
        let mut snippets = Vec::new();
        for info in analysis.definitions.values() {
            let file = &files[info.file_index];
            let Some(text) = file.content.get(info.start_byte..info.end_byte) else {
                continue;
            };
            let dependencies: Vec<String> = analysis
                .call_graph
                .get(&info.qualified_name)
                .map(|deps| deps.iter().cloned().collect())
                .unwrap_or_default();
            snippets.push(
                Snippet::new(text, language)
                    .with_qualified_name(&info.qualified_name)
                    .with_dependencies(dependencies)
                    .with_derivation(&file.blob_sha),
            );
        }

        debug!(
            language = language.as_str(),
            files = files.len(),
            snippets = snippets.len(),
            "snippets extracted"
        );
        Ok(snippets)
    }

    async fn extract_api_docs(
        &self,
        files: &[SourceFile],
        language: Language,
        include_private: bool,
    ) -> Result<Vec<ApiDocRecord>, DomainError> {
        Ok(super::api_doc_extractor::extract_api_docs(
            files,
            language,
            include_private,
        ))
    }
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

    #[tokio::test]
    async fn test_extract_python_functions() {
        let slicer = TreeSitterSlicer::new();
        let files = vec![file(
            "calc.py",
            r#"
def add(a, b):
    return a + b

def double(x):
    return add(x, x)
"#,
        )];

        let snippets = slicer
            .extract_snippets(&files, Language::Python)
            .await
            .unwrap();
        assert_eq!(snippets.len(), 2);

        let names: Vec<&str> = snippets
            .iter()
            .flat_map(|s| s.qualified_names())
            .map(|n| n.as_str())
            .collect();
        assert!(names.contains(&"calc.add"));
        assert!(names.contains(&"calc.double"));
    }

    #[tokio::test]
    async fn test_python_call_dependencies_resolve_locally() {
        let slicer = TreeSitterSlicer::new();
        let files = vec![file(
            "calc.py",
            "def add(a, b):\n    return a + b\n\ndef double(x):\n    return add(x, x)\n",
        )];

        let snippets = slicer
            .extract_snippets(&files, Language::Python)
            .await
            .unwrap();
        let double = snippets
            .iter()
            .find(|s| s.qualified_names().contains(&"calc.double".to_string()))
            .expect("double snippet");
        assert_eq!(double.dependencies(), &["calc.add".to_string()]);
    }

    #[tokio::test]
    async fn test_extract_go_functions_and_methods() {
        let slicer = TreeSitterSlicer::new();
        let files = vec![file(
            "server.go",
            r#"
package main

type Server struct{}

func (s *Server) Start() error {
	return nil
}

func main() {
	s := &Server{}
	_ = s.Start()
}
"#,
        )];

        let snippets = slicer.extract_snippets(&files, Language::Go).await.unwrap();
        let names: Vec<&str> = snippets
            .iter()
            .flat_map(|s| s.qualified_names())
            .map(|n| n.as_str())
            .collect();
        assert!(names.contains(&"server.main"));
        assert!(names.contains(&"server.Start"));
    }

    #[tokio::test]
    async fn test_extract_rust_functions() {
        let slicer = TreeSitterSlicer::new();
        let files = vec![file(
            "lib.rs",
            "fn helper() -> i32 { 42 }\n\npub fn entry() -> i32 { helper() }\n",
        )];

        let snippets = slicer
            .extract_snippets(&files, Language::Rust)
            .await
            .unwrap();
        assert_eq!(snippets.len(), 2);
        let entry = snippets
            .iter()
            .find(|s| s.qualified_names().contains(&"lib.entry".to_string()))
            .expect("entry snippet");
        assert_eq!(entry.dependencies(), &["lib.helper".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_language_is_passthrough_not_error() {
        let slicer = TreeSitterSlicer::new();
        let files = vec![file("query.sql", "SELECT 1;")];

        let snippets = slicer.extract_snippets(&files, Language::Sql).await.unwrap();
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].original_text(), "SELECT 1;");
    }

    #[tokio::test]
    async fn test_file_with_no_functions_yields_no_snippets() {
        let slicer = TreeSitterSlicer::new();
        let files = vec![file("constants.py", "X = 1\nY = 2\n")];

        let snippets = slicer
            .extract_snippets(&files, Language::Python)
            .await
            .unwrap();
        assert!(snippets.is_empty());
    }

    #[tokio::test]
    async fn test_parse_failure_skips_file_only() {
        let slicer = TreeSitterSlicer::new();
        // tree-sitter recovers from almost anything, so the second file
        // still parses; the point is extraction never errors.
        let files = vec![
            file("broken.py", "def broken(:\n"),
            file("fine.py", "def fine():\n    pass\n"),
        ];

        let snippets = slicer
            .extract_snippets(&files, Language::Python)
            .await
            .unwrap();
        assert!(snippets
            .iter()
            .any(|s| s.qualified_names().contains(&"fine.fine".to_string())));
    }

    #[tokio::test]
    async fn test_css_rule_selectors() {
        let slicer = TreeSitterSlicer::new();
        let files = vec![file(
            "style.css",
            ".button { color: red; }\n#header { width: 100%; }\n",
        )];

        let snippets = slicer.extract_snippets(&files, Language::Css).await.unwrap();
        let names: Vec<&str> = snippets
            .iter()
            .flat_map(|s| s.qualified_names())
            .map(|n| n.as_str())
            .collect();
        assert!(names.contains(&"style..button"));
        assert!(names.contains(&"style.#header"));
    }

    #[tokio::test]
    async fn test_html_element_selectors() {
        let slicer = TreeSitterSlicer::new();
        let files = vec![file(
            "page.html",
            r#"<html><body><div id="main"><span class="label">hi</span></div></body></html>"#,
        )];

        let snippets = slicer
            .extract_snippets(&files, Language::Html)
            .await
            .unwrap();
        let names: Vec<&str> = snippets
            .iter()
            .flat_map(|s| s.qualified_names())
            .map(|n| n.as_str())
            .collect();
        assert!(names.contains(&"page.div#main"));
        assert!(names.contains(&"page.span.label"));
    }

    #[test]
    fn test_signature_stops_at_brace() {
        let signature = extract_signature(
            "func main(\n\ta int,\n\tb int,\n) error {\n\treturn nil\n}",
            Language::Go,
        );
        assert_eq!(signature, "func main( a int, b int, ) error");
    }

    #[test]
    fn test_signature_stops_at_colon_for_python() {
        let signature =
            extract_signature("def add(\n    a,\n    b,\n):\n    return a + b", Language::Python);
        assert_eq!(signature, "def add( a, b, )");
    }

    #[test]
    fn test_signature_is_capped() {
        let long = format!("def f({}):\n    pass", "x, ".repeat(100));
        let signature = extract_signature(&long, Language::Python);
        assert!(signature.len() <= MAX_SIGNATURE_CHARS);
    }

    #[test]
    fn test_find_callers_returns_call_site_line() {
        let files = vec![file(
            "calc.py",
            "def add(a, b):\n    return a + b\n\ndef double(x):\n    return add(x, x)\n",
        )];

        let callers =
            TreeSitterSlicer::find_callers(&files, Language::Python, "calc.add", 2);
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].0, "calc.double");
        assert!(callers[0].1.contains("add(x, x)"));
    }

    #[test]
    fn test_topological_sort_tolerates_cycles() {
        let mut call_graph: HashMap<String, BTreeSet<String>> = HashMap::new();
        call_graph.insert("m.a".into(), BTreeSet::from(["m.b".to_string()]));
        call_graph.insert("m.b".into(), BTreeSet::from(["m.a".to_string()]));
        let members = BTreeSet::from(["m.a".to_string(), "m.b".to_string()]);

        let sorted = topological_sort(&members, &call_graph);
        assert_eq!(sorted.len(), 2);
    }

    #[test]
    fn test_bundle_includes_dependencies_and_usage() {
        let files = vec![file(
            "calc.py",
            "def add(a, b):\n    return a + b\n\ndef double(x):\n    return add(x, x)\n\ndef quad(x):\n    return double(double(x))\n",
        )];

        let bundle =
            TreeSitterSlicer::bundle_snippet(&files, Language::Python, "calc.double").unwrap();
        assert!(bundle.contains("def double"));
        assert!(bundle.contains("DEPENDENCIES"));
        assert!(bundle.contains("def add"));
        assert!(bundle.contains("USAGE EXAMPLES"));
        assert!(bundle.contains("calc.quad"));
    }
}
