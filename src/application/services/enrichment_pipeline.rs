use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::application::ChatClient;
use crate::domain::{EnrichmentRequest, EnrichmentResponse};

pub const DEFAULT_NUM_PARALLEL_TASKS: usize = 10;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Backoff schedule for transient transport failures: two retries.
const RETRY_BACKOFF: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(2)];

/// Applies an LLM-backed transformer to batches of items under a bounded
/// worker pool.
///
/// Responses stream in request-completion order, not submission order;
/// callers correlate by `id`. A shared bounded channel of `2 * workers`
/// items provides backpressure between the feeder and the pool, so memory
/// stays bounded for arbitrarily large batches. A per-item failure (timeout,
/// exhausted retries, non-retryable provider error) emits an empty `text`
/// and the batch continues.
pub struct EnrichmentPipeline {
    chat: Arc<dyn ChatClient>,
    workers: usize,
    timeout: Duration,
}

impl EnrichmentPipeline {
    pub fn new(chat: Arc<dyn ChatClient>, workers: usize, timeout: Duration) -> Self {
        Self {
            chat,
            workers: workers.max(1),
            timeout,
        }
    }

    pub fn with_defaults(chat: Arc<dyn ChatClient>) -> Self {
        Self::new(chat, DEFAULT_NUM_PARALLEL_TASKS, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Enrich a batch. An empty batch returns an immediately-exhausted
    /// stream without any HTTP calls.
    pub fn enrich(&self, requests: Vec<EnrichmentRequest>) -> ReceiverStream<EnrichmentResponse> {
        let (out_tx, out_rx) = mpsc::channel::<EnrichmentResponse>(self.workers * 2);

        if requests.is_empty() {
            drop(out_tx);
            return ReceiverStream::new(out_rx);
        }

        let (work_tx, work_rx) = mpsc::channel::<EnrichmentRequest>(self.workers * 2);
        let work_rx = Arc::new(tokio::sync::Mutex::new(work_rx));

        // Feeder blocks on the bounded channel when all workers are busy.
        tokio::spawn(async move {
            for request in requests {
                if work_tx.send(request).await.is_err() {
                    break;
                }
            }
        });

        for _ in 0..self.workers {
            let chat = Arc::clone(&self.chat);
            let work_rx = Arc::clone(&work_rx);
            let out_tx = out_tx.clone();
            let timeout = self.timeout;
            tokio::spawn(async move {
                loop {
                    let request = {
                        let mut rx = work_rx.lock().await;
                        rx.recv().await
                    };
                    let Some(request) = request else {
                        break;
                    };
                    let response = process_one(chat.as_ref(), &request, timeout).await;
                    if out_tx.send(response).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(out_tx);

        ReceiverStream::new(out_rx)
    }
}

async fn process_one(
    chat: &dyn ChatClient,
    request: &EnrichmentRequest,
    timeout: Duration,
) -> EnrichmentResponse {
    let mut attempt = 0;
    loop {
        let call = chat.complete(&request.system_prompt, &request.text);
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(text)) => {
                debug!(id = %request.id, "enrichment completed");
                return EnrichmentResponse {
                    id: request.id.clone(),
                    text,
                };
            }
            Ok(Err(err)) if err.is_retryable() && attempt < RETRY_BACKOFF.len() => {
                debug!(id = %request.id, attempt, "retrying enrichment: {err}");
                tokio::time::sleep(RETRY_BACKOFF[attempt]).await;
                attempt += 1;
            }
            Ok(Err(err)) => {
                warn!(id = %request.id, "enrichment failed: {err}");
                return EnrichmentResponse {
                    id: request.id.clone(),
                    text: String::new(),
                };
            }
            Err(_elapsed) if attempt < RETRY_BACKOFF.len() => {
                debug!(id = %request.id, attempt, "enrichment timed out, retrying");
                tokio::time::sleep(RETRY_BACKOFF[attempt]).await;
                attempt += 1;
            }
            Err(_elapsed) => {
                warn!(id = %request.id, "enrichment timed out");
                return EnrichmentResponse {
                    id: request.id.clone(),
                    text: String::new(),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoChat;

    #[async_trait]
    impl ChatClient for EchoChat {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, DomainError> {
            Ok(format!("summary of {user}"))
        }
    }

    struct FlakyChat {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatClient for FlakyChat {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, DomainError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                Err(DomainError::transport("connection reset"))
            } else {
                Ok(format!("ok {user}"))
            }
        }
    }

    struct BrokenChat;

    #[async_trait]
    impl ChatClient for BrokenChat {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, DomainError> {
            Err(DomainError::provider("400 bad request"))
        }
    }

    fn request(id: &str) -> EnrichmentRequest {
        EnrichmentRequest {
            id: id.to_string(),
            text: id.to_string(),
            system_prompt: "summarize".to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_batch_returns_immediately() {
        let pipeline = EnrichmentPipeline::with_defaults(Arc::new(EchoChat));
        let responses: Vec<_> = pipeline.enrich(vec![]).collect().await;
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn test_all_items_complete_and_correlate_by_id() {
        let pipeline = EnrichmentPipeline::new(Arc::new(EchoChat), 3, DEFAULT_REQUEST_TIMEOUT);
        let requests: Vec<_> = (0..20).map(|i| request(&format!("s{i}"))).collect();

        let mut responses: Vec<_> = pipeline.enrich(requests).collect().await;
        assert_eq!(responses.len(), 20);

        responses.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(responses[0].text, "summary of s0");
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        let chat = Arc::new(FlakyChat {
            calls: AtomicUsize::new(0),
        });
        let pipeline = EnrichmentPipeline::new(chat.clone(), 1, DEFAULT_REQUEST_TIMEOUT);

        let responses: Vec<_> = pipeline.enrich(vec![request("a")]).collect().await;
        assert_eq!(responses[0].text, "ok a");
        assert_eq!(chat.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_provider_errors_fail_the_item_without_retry() {
        let pipeline = EnrichmentPipeline::new(Arc::new(BrokenChat), 2, DEFAULT_REQUEST_TIMEOUT);

        let responses: Vec<_> = pipeline
            .enrich(vec![request("a"), request("b")])
            .collect()
            .await;
        assert_eq!(responses.len(), 2);
        assert!(responses.iter().all(|r| r.text.is_empty()));
    }
}
