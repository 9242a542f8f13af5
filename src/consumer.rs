//! NATS request consumer for the predict and explain subjects

use crate::config::NatsConfig;
use crate::metrics::Operation;
use anyhow::Result;
use async_nats::{Client, Message, Subscriber};
use futures::stream::{self, BoxStream, StreamExt};
use tracing::info;

/// One inbound request tagged with the operation its subject maps to
#[derive(Debug)]
pub struct InboundRequest {
    pub operation: Operation,
    pub message: Message,
}

/// Consumer for receiving applicant requests from NATS
pub struct RequestConsumer {
    client: Client,
    predict_subject: String,
    explain_subject: String,
    queue_group: Option<String>,
}

impl RequestConsumer {
    /// Create a new request consumer
    pub fn new(client: Client, config: &NatsConfig) -> Self {
        Self {
            client,
            predict_subject: config.predict_subject.clone(),
            explain_subject: config.explain_subject.clone(),
            queue_group: config.queue_group.clone(),
        }
    }

    /// Subscribe to both subjects and merge them into one request stream
    pub async fn subscribe(&self) -> Result<BoxStream<'static, InboundRequest>> {
        let predict = self.subscribe_subject(&self.predict_subject).await?;
        let explain = self.subscribe_subject(&self.explain_subject).await?;

        let predict = predict.map(|message| InboundRequest {
            operation: Operation::Predict,
            message,
        });
        let explain = explain.map(|message| InboundRequest {
            operation: Operation::Explain,
            message,
        });

        Ok(stream::select(predict, explain).boxed())
    }

    async fn subscribe_subject(&self, subject: &str) -> Result<Subscriber> {
        let subscriber = match &self.queue_group {
            Some(group) => {
                self.client
                    .queue_subscribe(subject.to_string(), group.clone())
                    .await?
            }
            None => self.client.subscribe(subject.to_string()).await?,
        };
        info!(
            subject = %subject,
            queue_group = ?self.queue_group,
            "Subscribed to request subject"
        );
        Ok(subscriber)
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server
}
