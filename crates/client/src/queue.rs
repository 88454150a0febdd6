//! Worker queue client.
//!
//! The fan-out orchestrator only needs to publish a payload and learn the
//! message id the marker objects are named after; the serverless worker
//! consumes the same subject. NATS does not assign message ids, so they are
//! minted at publish time and travel in a header.

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use thiserror::Error;

const MESSAGE_ID_HEADER: &str = "Mirage-Msg-Id";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue connect failed: {0}")]
    Connect(String),

    #[error("queue publish failed: {0}")]
    Publish(String),

    #[error("queue subscribe failed: {0}")]
    Subscribe(String),
}

/// One message taken off the worker queue.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub id: String,
    pub payload: Vec<u8>,
}

/// Publish capability the fan-out orchestrator depends on.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue `payload` and return the message id it was accepted under.
    async fn publish(&self, payload: &[u8]) -> Result<String, QueueError>;
}

/// NATS-backed worker queue.
pub struct NatsQueue {
    client: async_nats::Client,
    subject: String,
}

impl NatsQueue {
    /// Connect to `servers` (comma-separated) and bind to `subject`.
    pub async fn connect(servers: &str, subject: impl Into<String>) -> Result<Self, QueueError> {
        tracing::debug!(servers, "connecting to nats");
        let client = async_nats::connect(servers)
            .await
            .map_err(|e| QueueError::Connect(e.to_string()))?;
        Ok(Self { client, subject: subject.into() })
    }

    /// Subscribe to the worker subject.
    pub async fn subscribe(&self) -> Result<impl Stream<Item = QueueMessage> + Unpin, QueueError> {
        let subscriber = self
            .client
            .subscribe(self.subject.clone())
            .await
            .map_err(|e| QueueError::Subscribe(e.to_string()))?;

        Ok(subscriber.map(|message| {
            let id = message
                .headers
                .as_ref()
                .and_then(|headers| headers.get(MESSAGE_ID_HEADER))
                .map(|value| value.to_string())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            QueueMessage { id, payload: message.payload.to_vec() }
        }))
    }
}

#[async_trait]
impl JobQueue for NatsQueue {
    async fn publish(&self, payload: &[u8]) -> Result<String, QueueError> {
        let id = uuid::Uuid::new_v4().to_string();

        let mut headers = async_nats::HeaderMap::new();
        headers.insert(MESSAGE_ID_HEADER, id.as_str());

        self.client
            .publish_with_headers(self.subject.clone(), headers, payload.to_vec().into())
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;
        self.client
            .flush()
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;

        Ok(id)
    }
}
