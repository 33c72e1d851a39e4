use async_trait::async_trait;
use duckdb::{params, Connection};
use tracing::debug;

use super::duckdb::{quoted_in_list, SharedConnection};
use crate::application::VectorIndex;
use crate::domain::{DomainError, EmbeddingKind, EmbeddingResponse, EngineHit};

/// Vector index storing embeddings as JSON float arrays; cosine similarity
/// is computed in Rust over the fetched vectors. Dimensions follow whatever
/// the configured provider returns, so no fixed-size column type is needed.
pub struct DuckdbVectorIndex {
    conn: SharedConnection,
}

impl DuckdbVectorIndex {
    pub fn with_connection(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS embeddings (
                snippet_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                vector TEXT NOT NULL,
                UNIQUE (snippet_id, kind)
            );
            CREATE INDEX IF NOT EXISTS idx_embeddings_kind ON embeddings(kind);
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize schema: {}", e)))?;
        Ok(())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl VectorIndex for DuckdbVectorIndex {
    async fn index_embeddings(
        &self,
        kind: EmbeddingKind,
        embeddings: &[EmbeddingResponse],
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        for embedding in embeddings {
            conn.execute(
                r#"
                INSERT INTO embeddings (snippet_id, kind, vector) VALUES (?1, ?2, ?3)
                ON CONFLICT (snippet_id, kind) DO UPDATE SET vector = excluded.vector
                "#,
                params![
                    embedding.snippet_id,
                    kind.as_str(),
                    serde_json::to_string(&embedding.embedding).unwrap_or_default(),
                ],
            )
            .map_err(|e| DomainError::storage(format!("Failed to save embedding: {}", e)))?;
        }
        debug!(kind = kind.as_str(), count = embeddings.len(), "embeddings saved");
        Ok(())
    }

    async fn search(
        &self,
        kind: EmbeddingKind,
        query: &[f32],
        top_k: usize,
        candidates: Option<&[String]>,
    ) -> Result<Vec<EngineHit>, DomainError> {
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().await;

        let mut sql = format!(
            "SELECT snippet_id, vector FROM embeddings WHERE kind = '{}'",
            kind.as_str()
        );
        if let Some(ids) = candidates {
            sql.push_str(&format!(
                " AND snippet_id IN ({})",
                quoted_in_list(&ids.to_vec())
            ));
        }

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare search: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| DomainError::storage(format!("Failed to run search: {}", e)))?;

        let mut hits = Vec::new();
        for row in rows {
            let (snippet_id, raw) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            let vector: Vec<f32> = match serde_json::from_str(&raw) {
                Ok(vector) => vector,
                Err(_) => continue,
            };
            hits.push(EngineHit {
                snippet_id,
                score: cosine_similarity(query, &vector),
            });
        }

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
            "DELETE FROM embeddings WHERE snippet_id IN ({in_list});"
        ))
        .map_err(|e| DomainError::storage(format!("Failed to delete embeddings: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identity() {
        let v = vec![0.6, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }
}
