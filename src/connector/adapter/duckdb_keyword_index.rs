use std::collections::HashMap;

use async_trait::async_trait;
use duckdb::{params, Connection};
use tracing::debug;

use super::duckdb::{quoted_in_list, SharedConnection};
use crate::application::KeywordIndex;
use crate::domain::{Document, DomainError, EngineHit};

pub const BM25_K1: f32 = 1.2;
pub const BM25_B: f32 = 0.75;

/// BM25 keyword index: postings and document lengths live in DuckDB, the
/// ranking function runs in Rust over the fetched postings.
pub struct DuckdbKeywordIndex {
    conn: SharedConnection,
    k1: f32,
    b: f32,
}

impl DuckdbKeywordIndex {
    pub fn with_connection(conn: SharedConnection) -> Self {
        Self {
            conn,
            k1: BM25_K1,
            b: BM25_B,
        }
    }

    pub fn with_parameters(conn: SharedConnection, k1: f32, b: f32) -> Self {
        Self { conn, k1, b }
    }

    pub fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS bm25_postings (
                snippet_id TEXT NOT NULL,
                term TEXT NOT NULL,
                tf BIGINT NOT NULL,
                UNIQUE (snippet_id, term)
            );
            CREATE INDEX IF NOT EXISTS idx_bm25_postings_term ON bm25_postings(term);

            CREATE TABLE IF NOT EXISTS bm25_documents (
                snippet_id TEXT PRIMARY KEY,
                length BIGINT NOT NULL
            );
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize schema: {}", e)))?;
        Ok(())
    }
}

/// Split code text into identifier atoms: snake_case and CamelCase compound
/// names break apart, digits stay attached, everything lowercases.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for run in text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
        for piece in run.split('_') {
            split_camel(piece, &mut tokens);
        }
    }
    tokens
}

fn split_camel(piece: &str, out: &mut Vec<String>) {
    let chars: Vec<char> = piece.chars().collect();
    if chars.is_empty() {
        return;
    }
    let mut start = 0;
    for i in 1..chars.len() {
        let prev = chars[i - 1];
        let cur = chars[i];
        // lower|digit → Upper starts a new word; so does the last capital of
        // an acronym run (HTTPServer → HTTP, Server).
        let boundary = (cur.is_ascii_uppercase()
            && (prev.is_ascii_lowercase() || prev.is_ascii_digit()))
            || (cur.is_ascii_uppercase()
                && prev.is_ascii_uppercase()
                && chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase()));
        if boundary {
            out.push(chars[start..i].iter().collect::<String>().to_lowercase());
            start = i;
        }
    }
    out.push(chars[start..].iter().collect::<String>().to_lowercase());
}

fn term_frequencies(text: &str) -> (HashMap<String, i64>, i64) {
    let tokens = tokenize(text);
    let length = tokens.len() as i64;
    let mut frequencies: HashMap<String, i64> = HashMap::new();
    for token in tokens {
        *frequencies.entry(token).or_insert(0) += 1;
    }
    (frequencies, length)
}

#[async_trait]
impl KeywordIndex for DuckdbKeywordIndex {
    async fn index_documents(&self, documents: &[Document]) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        for document in documents {
            let (frequencies, length) = term_frequencies(&document.text);

            conn.execute(
                "DELETE FROM bm25_postings WHERE snippet_id = ?1",
                params![document.snippet_id],
            )
            .map_err(|e| DomainError::storage(format!("Failed to clear postings: {}", e)))?;
            for (term, tf) in frequencies {
                conn.execute(
                    "INSERT INTO bm25_postings (snippet_id, term, tf) VALUES (?1, ?2, ?3)",
                    params![document.snippet_id, term, tf],
                )
                .map_err(|e| DomainError::storage(format!("Failed to insert posting: {}", e)))?;
            }
            conn.execute(
                r#"
                INSERT INTO bm25_documents (snippet_id, length) VALUES (?1, ?2)
                ON CONFLICT (snippet_id) DO UPDATE SET length = excluded.length
                "#,
                params![document.snippet_id, length],
            )
            .map_err(|e| DomainError::storage(format!("Failed to insert document: {}", e)))?;
        }
        debug!(documents = documents.len(), "BM25 documents indexed");
        Ok(())
    }

    async fn search(
        &self,
        terms: &[String],
        top_k: usize,
        candidates: Option<&[String]>,
    ) -> Result<Vec<EngineHit>, DomainError> {
        // Queries tokenize the same way documents do, so "func_main" matches
        // both atoms.
        let mut query_terms: Vec<String> = terms.iter().flat_map(|t| tokenize(t)).collect();
        query_terms.sort();
        query_terms.dedup();
        if query_terms.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().await;

        let total_docs: i64 = conn
            .query_row("SELECT COUNT(*) FROM bm25_documents", [], |row| row.get(0))
            .map_err(|e| DomainError::storage(format!("Failed to count documents: {}", e)))?;
        if total_docs == 0 {
            return Ok(Vec::new());
        }
        let avg_length: f64 = conn
            .query_row(
                "SELECT COALESCE(AVG(length), 0.0) FROM bm25_documents",
                [],
                |row| row.get(0),
            )
            .map_err(|e| DomainError::storage(format!("Failed to average lengths: {}", e)))?;

        let term_list = quoted_in_list(&query_terms);
        let candidate_clause = match candidates {
            Some(ids) => format!("AND p.snippet_id IN ({})", quoted_in_list(&ids.to_vec())),
            None => String::new(),
        };
        let sql = format!(
            "SELECT p.snippet_id, p.term, p.tf, d.length \
             FROM bm25_postings p JOIN bm25_documents d ON d.snippet_id = p.snippet_id \
             WHERE p.term IN ({term_list}) {candidate_clause}"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare search: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(|e| DomainError::storage(format!("Failed to run search: {}", e)))?;

        let mut postings: Vec<(String, String, i64, i64)> = Vec::new();
        for row in rows {
            postings.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }

        // Document frequency per matched term (over the whole corpus, not
        // just the candidate set).
        let mut doc_freq: HashMap<String, i64> = HashMap::new();
        let sql = format!(
            "SELECT term, COUNT(*) FROM bm25_postings WHERE term IN ({term_list}) GROUP BY term"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare df query: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(|e| DomainError::storage(format!("Failed to run df query: {}", e)))?;
        for row in rows {
            let (term, df) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            doc_freq.insert(term, df);
        }

        let mut scores: HashMap<String, f32> = HashMap::new();
        for (snippet_id, term, tf, length) in &postings {
            let df = *doc_freq.get(term).unwrap_or(&0) as f32;
            let n = total_docs as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
            let tf = *tf as f32;
            let norm = 1.0 - self.b + self.b * (*length as f32) / (avg_length.max(1.0) as f32);
            let score = idf * (tf * (self.k1 + 1.0)) / (tf + self.k1 * norm);
            *scores.entry(snippet_id.clone()).or_insert(0.0) += score;
        }

        let mut hits: Vec<EngineHit> = scores
            .into_iter()
            .map(|(snippet_id, score)| EngineHit { snippet_id, score })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.snippet_id.cmp(&b.snippet_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete(&self, snippet_ids: &[String]) -> Result<(), DomainError> {
        if snippet_ids.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().await;
        let in_list = quoted_in_list(snippet_ids);
        conn.execute_batch(&format!(
            r#"
            DELETE FROM bm25_postings WHERE snippet_id IN ({in_list});
            DELETE FROM bm25_documents WHERE snippet_id IN ({in_list});
            "#
        ))
        .map_err(|e| DomainError::storage(format!("Failed to delete documents: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_splits_snake_and_camel() {
        assert_eq!(tokenize("parse_http_response"), vec!["parse", "http", "response"]);
        assert_eq!(tokenize("parseHttpResponse"), vec!["parse", "http", "response"]);
        assert_eq!(tokenize("HTTPServer"), vec!["http", "server"]);
    }

    #[test]
    fn test_tokenize_preserves_digits() {
        assert_eq!(tokenize("sha256sum"), vec!["sha256sum"]);
        assert_eq!(tokenize("base64Decode"), vec!["base64", "decode"]);
    }

    #[test]
    fn test_tokenize_drops_punctuation() {
        assert_eq!(tokenize("fn main() { x.y }"), vec!["fn", "main", "x", "y"]);
    }

    #[test]
    fn test_term_frequencies() {
        let (frequencies, length) = term_frequencies("foo foo bar");
        assert_eq!(length, 3);
        assert_eq!(frequencies["foo"], 2);
        assert_eq!(frequencies["bar"], 1);
    }
}
