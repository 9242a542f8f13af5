//! NATS reply publisher

use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Publishes reply bodies to request reply subjects
#[derive(Clone)]
pub struct ResponsePublisher {
    client: Client,
}

impl ResponsePublisher {
    /// Create a new response publisher
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Publish an already-encoded body to `reply`
    pub async fn respond(&self, reply: Subject, body: Vec<u8>) -> Result<()> {
        let bytes = body.len();
        self.client.publish(reply.clone(), body.into()).await?;

        debug!(reply = %reply, bytes = bytes, "Published reply");
        Ok(())
    }

    /// Encode `body` as JSON and publish it to `reply`
    pub async fn respond_json<T: serde::Serialize>(&self, reply: Subject, body: &T) -> Result<()> {
        let payload = serde_json::to_vec(body)?;
        self.respond(reply, payload).await
    }
}
