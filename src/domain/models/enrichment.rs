use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of LLM-generated enrichment. `Summary` targets a snippet; every
/// other kind targets a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentKind {
    Summary,
    ApiDoc,
    Architecture,
    CommitDescription,
    DatabaseSchema,
    Cookbook,
}

impl EnrichmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentKind::Summary => "summary",
            EnrichmentKind::ApiDoc => "api_doc",
            EnrichmentKind::Architecture => "architecture",
            EnrichmentKind::CommitDescription => "commit_description",
            EnrichmentKind::DatabaseSchema => "database_schema",
            EnrichmentKind::Cookbook => "cookbook",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "summary" => Some(EnrichmentKind::Summary),
            "api_doc" => Some(EnrichmentKind::ApiDoc),
            "architecture" => Some(EnrichmentKind::Architecture),
            "commit_description" => Some(EnrichmentKind::CommitDescription),
            "database_schema" => Some(EnrichmentKind::DatabaseSchema),
            "cookbook" => Some(EnrichmentKind::Cookbook),
            _ => None,
        }
    }

    pub fn targets_commit(&self) -> bool {
        !matches!(self, EnrichmentKind::Summary)
    }
}

impl std::fmt::Display for EnrichmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Markdown content attached to a snippet or a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrichment {
    kind: EnrichmentKind,
    content: String,
    created_at: DateTime<Utc>,
}

impl Enrichment {
    pub fn new(kind: EnrichmentKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn reconstitute(
        kind: EnrichmentKind,
        content: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            content,
            created_at,
        }
    }

    pub fn kind(&self) -> EnrichmentKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// One unit of work for the enrichment pipeline.
#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    pub id: String,
    pub text: String,
    pub system_prompt: String,
}

/// Pipeline output, correlated to the request by `id`. Responses arrive in
/// completion order, not submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentResponse {
    pub id: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_string_round_trip() {
        for kind in [
            EnrichmentKind::Summary,
            EnrichmentKind::ApiDoc,
            EnrichmentKind::Architecture,
            EnrichmentKind::CommitDescription,
            EnrichmentKind::DatabaseSchema,
            EnrichmentKind::Cookbook,
        ] {
            assert_eq!(EnrichmentKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EnrichmentKind::parse("bogus"), None);
    }

    #[test]
    fn test_only_summary_targets_snippets() {
        assert!(!EnrichmentKind::Summary.targets_commit());
        assert!(EnrichmentKind::Cookbook.targets_commit());
    }
}
