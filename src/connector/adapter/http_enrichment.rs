use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::application::ChatClient;
use crate::domain::DomainError;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(serde::Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(serde::Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// [`ChatClient`] over an OpenAI-compatible chat-completions endpoint.
/// Works against any server speaking that wire format, cloud or local.
///
/// Transport failures and 5xx responses are retryable
/// [`DomainError::Transport`]; 4xx responses are per-item provider failures
/// the pipeline never retries.
pub struct HttpChatClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl HttpChatClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let base: String = base_url.into();
        let url = format!("{}{CHAT_COMPLETIONS_PATH}", base.trim_end_matches('/'));
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
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, DomainError> {
        let request = ApiRequest {
            model: &self.model,
            messages: vec![
                ApiMessage {
                    role: "system",
                    content: system,
                },
                ApiMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DomainError::transport(format!("Enrichment request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("enrichment endpoint returned {status}: {body}");
            if status.is_server_error() {
                return Err(DomainError::transport(format!(
                    "Enrichment endpoint returned {status}"
                )));
            }
            return Err(DomainError::provider(format!(
                "Enrichment endpoint returned {status}"
            )));
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            DomainError::provider(format!("Failed to parse enrichment response: {e}"))
        })?;

        Ok(api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}
