use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// A document handed to an index engine: the snippet id plus the text that
/// engine scores (original code for BM25/code vectors, summary for text
/// vectors).
#[derive(Debug, Clone)]
pub struct Document {
    pub snippet_id: String,
    pub text: String,
}

/// A single engine's scored hit.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineHit {
    pub snippet_id: String,
    pub score: f32,
}

/// Fused result: the reciprocal-rank score plus the raw per-engine scores in
/// engine order (keyword, code, text; 0.0 where an engine did not return the
/// snippet).
#[derive(Debug, Clone)]
pub struct FusedHit {
    pub snippet_id: String,
    pub score: f32,
    pub original_scores: Vec<f32>,
}

/// The two vector spaces: dense embeddings of snippet code and of snippet
/// summary text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingKind {
    Code,
    Text,
}

impl EmbeddingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingKind::Code => "code",
            EmbeddingKind::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "code" => Some(EmbeddingKind::Code),
            "text" => Some(EmbeddingKind::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub snippet_id: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub snippet_id: String,
    pub embedding: Vec<f32>,
}

/// Pre-ranking filters. Parsed into canonical form by
/// [`SearchFilters::canonicalize`]: language lowercased, dates UTC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub language: Option<String>,
    pub author: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub source_repo: Option<String>,
    pub file_path: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.language.is_none()
            && self.author.is_none()
            && self.created_after.is_none()
            && self.created_before.is_none()
            && self.source_repo.is_none()
            && self.file_path.is_none()
    }

    pub fn canonicalize(mut self) -> Self {
        self.language = self.language.map(|l| l.to_lowercase());
        self
    }

    /// Parse ISO-8601 date strings (as received over the API) into UTC.
    pub fn parse_dates(
        created_after: Option<&str>,
        created_before: Option<&str>,
    ) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), DomainError> {
        let parse = |value: &str| -> Result<DateTime<Utc>, DomainError> {
            if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
                return Ok(dt.with_timezone(&Utc));
            }
            // Bare dates (YYYY-MM-DD) are accepted as midnight UTC.
            chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|d| {
                    DateTime::<Utc>::from_naive_utc_and_offset(
                        d.and_hms_opt(0, 0, 0).unwrap_or_default(),
                        Utc,
                    )
                })
                .map_err(|_| {
                    DomainError::invalid_input(format!(
                        "Invalid date: {value}. Expected ISO 8601 (YYYY-MM-DD)"
                    ))
                })
        };
        Ok((
            created_after.map(parse).transpose()?,
            created_before.map(parse).transpose()?,
        ))
    }
}

/// Multi-modal search request. Absent query fields are no-ops, not
/// wildcards: an engine only runs when its query kind is present.
#[derive(Debug, Clone, Default)]
pub struct MultiSearchRequest {
    pub top_k: usize,
    pub text_query: Option<String>,
    pub code_query: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub filters: Option<SearchFilters>,
}

impl MultiSearchRequest {
    pub const DEFAULT_TOP_K: usize = 10;

    pub fn top_k_or_default(&self) -> usize {
        if self.top_k == 0 {
            Self::DEFAULT_TOP_K
        } else {
            self.top_k
        }
    }

    pub fn has_query(&self) -> bool {
        self.text_query.is_some()
            || self.code_query.is_some()
            || self.keywords.as_ref().is_some_and(|k| !k.is_empty())
    }
}

/// A hydrated search hit, ready for the API boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub snippet_id: String,
    pub content: String,
    pub language: String,
    pub source_uri: String,
    pub relative_path: String,
    pub authors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub original_scores: Vec<f32>,
    pub fused_score: f32,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_lowercases_language() {
        let filters = SearchFilters {
            language: Some("Python".to_string()),
            ..Default::default()
        };
        assert_eq!(filters.canonicalize().language.as_deref(), Some("python"));
    }

    #[test]
    fn test_parse_bare_date() {
        let (after, before) = SearchFilters::parse_dates(Some("2024-03-01"), None).unwrap();
        assert!(after.is_some());
        assert!(before.is_none());
        assert_eq!(after.unwrap().to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }

    #[test]
    fn test_parse_rfc3339_date() {
        let (after, _) =
            SearchFilters::parse_dates(Some("2024-03-01T12:30:00+02:00"), None).unwrap();
        assert_eq!(after.unwrap().to_rfc3339(), "2024-03-01T10:30:00+00:00");
    }

    #[test]
    fn test_parse_invalid_date_is_rejected() {
        assert!(SearchFilters::parse_dates(Some("not-a-date"), None).is_err());
    }

    #[test]
    fn test_top_k_default() {
        let request = MultiSearchRequest::default();
        assert_eq!(request.top_k_or_default(), 10);
        assert!(!request.has_query());
    }
}
