use async_trait::async_trait;

use crate::application::ChatClient;
use crate::domain::DomainError;

/// Canned [`ChatClient`] for tests and offline runs: responds with a short
/// deterministic digest of the prompt instead of calling any endpoint.
pub struct MockChatClient;

impl MockChatClient {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, DomainError> {
        let head: String = user.split_whitespace().take(12).collect::<Vec<_>>().join(" ");
        Ok(format!("Mock summary: {head}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_chat_is_deterministic() {
        let client = MockChatClient::new();
        let a = client.complete("system", "fn main() {}").await.unwrap();
        let b = client.complete("system", "fn main() {}").await.unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("Mock summary:"));
    }
}
