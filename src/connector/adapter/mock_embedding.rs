use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use rand::Rng;
use rand::SeedableRng;

use crate::application::EmbeddingService;
use crate::domain::{DomainError, EmbeddingRequest, EmbeddingResponse};

/// Deterministic embedding service for tests and offline runs: vectors are
/// seeded from a hash of the text, so identical text always embeds to the
/// identical (normalized) vector.
pub struct MockEmbeddingService {
    dimensions: usize,
}

impl MockEmbeddingService {
    pub fn new() -> Self {
        Self { dimensions: 384 }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }
        vector
    }
}

impl Default for MockEmbeddingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingService for MockEmbeddingService {
    async fn embed(
        &self,
        requests: &[EmbeddingRequest],
    ) -> Result<Vec<EmbeddingResponse>, DomainError> {
        Ok(requests
            .iter()
            .map(|request| EmbeddingResponse {
                snippet_id: request.snippet_id.clone(),
                embedding: self.generate(&request.text),
            })
            .collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        Ok(self.generate(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identical_text_embeds_identically() {
        let service = MockEmbeddingService::new();
        let a = service.embed_query("fn main() {}").await.unwrap();
        let b = service.embed_query("fn main() {}").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_vectors_are_normalized() {
        let service = MockEmbeddingService::with_dimensions(64);
        let v = service.embed_query("hello").await.unwrap();
        assert_eq!(v.len(), 64);
        let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }
}
