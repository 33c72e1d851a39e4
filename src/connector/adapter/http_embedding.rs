use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::application::EmbeddingService;
use crate::domain::{DomainError, EmbeddingRequest, EmbeddingResponse};

const EMBEDDINGS_PATH: &str = "/v1/embeddings";

#[derive(serde::Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct ApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// HTTP client for an OpenAI-compatible embeddings endpoint.
///
/// Transport failures and 5xx responses surface as retryable
/// [`DomainError::Transport`]; 4xx responses are non-retryable provider
/// errors.
pub struct HttpEmbeddingService {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl HttpEmbeddingService {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let base: String = base_url.into();
        let url = format!("{}{EMBEDDINGS_PATH}", base.trim_end_matches('/'));
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            url,
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn call(&self, inputs: Vec<&str>) -> Result<Vec<Vec<f32>>, DomainError> {
        let request = ApiRequest {
            model: &self.model,
            input: inputs,
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().await.map_err(|e| {
            DomainError::transport(format!("Embedding request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("embedding endpoint returned {status}: {body}");
            if status.is_server_error() {
                return Err(DomainError::transport(format!(
                    "Embedding endpoint returned {status}"
                )));
            }
            return Err(DomainError::provider(format!(
                "Embedding endpoint returned {status}"
            )));
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            DomainError::embedding(format!("Failed to parse embedding response: {e}"))
        })?;

        let mut data = api_response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingService {
    async fn embed(
        &self,
        requests: &[EmbeddingRequest],
    ) -> Result<Vec<EmbeddingResponse>, DomainError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let inputs: Vec<&str> = requests.iter().map(|r| r.text.as_str()).collect();
        let vectors = self.call(inputs).await?;
        if vectors.len() != requests.len() {
            return Err(DomainError::embedding(format!(
                "Embedding endpoint returned {} vectors for {} inputs",
                vectors.len(),
                requests.len()
            )));
        }
        Ok(requests
            .iter()
            .zip(vectors)
            .map(|(request, embedding)| EmbeddingResponse {
                snippet_id: request.snippet_id.clone(),
                embedding,
            })
            .collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let mut vectors = self.call(vec![text]).await?;
        vectors
            .pop()
            .ok_or_else(|| DomainError::embedding("Embedding endpoint returned no vector"))
    }
}
