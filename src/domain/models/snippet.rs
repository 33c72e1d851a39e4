use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{Enrichment, EnrichmentKind, Language};

/// Upper bound on extracted snippet text. Larger definitions are truncated
/// at extraction time to bound embedding cost.
pub const MAX_SNIPPET_BYTES: usize = 32 * 1024;

/// Pipeline phases tracked per snippet. A snippet whose content hash matches
/// an already-stored snippet inherits its completed phases, so unchanged code
/// is never re-indexed, re-embedded, or re-enriched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingPhase {
    Bm25Index,
    CodeEmbeddings,
    EnrichSnippets,
    TextEmbeddings,
}

impl ProcessingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingPhase::Bm25Index => "create_bm25_index",
            ProcessingPhase::CodeEmbeddings => "create_code_embeddings",
            ProcessingPhase::EnrichSnippets => "enrich_snippets",
            ProcessingPhase::TextEmbeddings => "create_text_embeddings",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create_bm25_index" => Some(ProcessingPhase::Bm25Index),
            "create_code_embeddings" => Some(ProcessingPhase::CodeEmbeddings),
            "enrich_snippets" => Some(ProcessingPhase::EnrichSnippets),
            "create_text_embeddings" => Some(ProcessingPhase::TextEmbeddings),
            _ => None,
        }
    }
}

/// Content hash identifying a snippet: SHA-256 over the normalized original
/// text plus the language tag. Normalization trims trailing whitespace per
/// line so editor noise does not change identity.
pub fn compute_content_hash(text: &str, language: Language) -> String {
    let mut hasher = Sha256::new();
    for line in text.lines() {
        hasher.update(line.trim_end().as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(b"\0");
    hasher.update(language.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

/// A contiguous region of source code, content-addressed by
/// [`compute_content_hash`]. Two snippets with equal hashes are the same
/// stored entity regardless of which commits derived them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    id: String,
    original_text: String,
    language: Language,
    created_at: DateTime<Utc>,
    /// Qualified names (`module.function`) of the definitions this snippet
    /// spans.
    qualified_names: Vec<String>,
    /// Qualified names of intra-file callees.
    dependencies: Vec<String>,
    /// Blob SHAs of the files this snippet was derived from.
    derives_from: Vec<String>,
    enrichments: Vec<Enrichment>,
}

impl Snippet {
    pub fn new(original_text: impl Into<String>, language: Language) -> Self {
        let mut text: String = original_text.into();
        if text.len() > MAX_SNIPPET_BYTES {
            let mut cut = MAX_SNIPPET_BYTES;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        let id = compute_content_hash(&text, language);
        Self {
            id,
            original_text: text,
            language,
            created_at: Utc::now(),
            qualified_names: Vec::new(),
            dependencies: Vec::new(),
            derives_from: Vec::new(),
            enrichments: Vec::new(),
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        original_text: String,
        language: Language,
        created_at: DateTime<Utc>,
        qualified_names: Vec<String>,
        dependencies: Vec<String>,
        derives_from: Vec<String>,
        enrichments: Vec<Enrichment>,
    ) -> Self {
        Self {
            id,
            original_text,
            language,
            created_at,
            qualified_names,
            dependencies,
            derives_from,
            enrichments,
        }
    }

    pub fn with_qualified_name(mut self, name: impl Into<String>) -> Self {
        self.qualified_names.push(name.into());
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_derivation(mut self, blob_sha: impl Into<String>) -> Self {
        let sha = blob_sha.into();
        if !self.derives_from.contains(&sha) {
            self.derives_from.push(sha);
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn set_created_at(&mut self, created_at: DateTime<Utc>) {
        self.created_at = created_at;
    }

    pub fn qualified_names(&self) -> &[String] {
        &self.qualified_names
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn derives_from(&self) -> &[String] {
        &self.derives_from
    }

    pub fn enrichments(&self) -> &[Enrichment] {
        &self.enrichments
    }

    pub fn add_enrichment(&mut self, enrichment: Enrichment) {
        self.enrichments.push(enrichment);
    }

    /// The snippet's summary text, or an empty string when no summary
    /// enrichment exists yet.
    pub fn summary_text(&self) -> &str {
        self.enrichments
            .iter()
            .find(|e| e.kind() == EnrichmentKind::Summary)
            .map(|e| e.content())
            .unwrap_or("")
    }

    pub fn has_summary(&self) -> bool {
        !self.summary_text().trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_content_yields_equal_ids() {
        let a = Snippet::new("fn add() {}", Language::Rust);
        let b = Snippet::new("fn add() {}", Language::Rust);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_trailing_whitespace_does_not_change_identity() {
        let a = compute_content_hash("fn add() {}  \n", Language::Rust);
        let b = compute_content_hash("fn add() {}\n", Language::Rust);
        assert_eq!(a, b);
    }

    #[test]
    fn test_language_is_part_of_identity() {
        let rust = compute_content_hash("x = 1", Language::Rust);
        let python = compute_content_hash("x = 1", Language::Python);
        assert_ne!(rust, python);
    }

    #[test]
    fn test_oversized_snippet_is_truncated() {
        let big = "x".repeat(MAX_SNIPPET_BYTES * 2);
        let snippet = Snippet::new(big, Language::Python);
        assert_eq!(snippet.original_text().len(), MAX_SNIPPET_BYTES);
    }

    #[test]
    fn test_summary_text_defaults_to_empty() {
        let mut snippet = Snippet::new("def f(): pass", Language::Python);
        assert_eq!(snippet.summary_text(), "");
        assert!(!snippet.has_summary());

        snippet.add_enrichment(Enrichment::new(EnrichmentKind::Summary, "Does nothing."));
        assert_eq!(snippet.summary_text(), "Does nothing.");
        assert!(snippet.has_summary());
    }

    #[test]
    fn test_json_round_trip() {
        let snippet = Snippet::new("fn main() {}", Language::Rust)
            .with_qualified_name("main.main")
            .with_derivation("blob1");
        let json = serde_json::to_string(&snippet).unwrap();
        let back: Snippet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), snippet.id());
        assert_eq!(back.original_text(), snippet.original_text());
        assert_eq!(back.derives_from(), snippet.derives_from());
    }

    #[test]
    fn test_derivation_links_deduplicate() {
        let snippet = Snippet::new("fn main() {}", Language::Rust)
            .with_derivation("blob1")
            .with_derivation("blob1");
        assert_eq!(snippet.derives_from().len(), 1);
    }
}
