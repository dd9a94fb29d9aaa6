//! NATS subscriptions for incoming requests

use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use tracing::info;

/// Subscribes to one request subject, optionally inside a queue group
pub struct RequestConsumer {
    client: Client,
    subject: String,
    queue_group: Option<String>,
}

impl RequestConsumer {
    /// Create a new request consumer
    pub fn new(client: Client, subject: &str, queue_group: Option<&str>) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            queue_group: queue_group.map(str::to_string),
        }
    }

    /// Subscribe to the request subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = match &self.queue_group {
            Some(group) => self
                .client
                .queue_subscribe(self.subject.clone(), group.clone())
                .await,
            None => self.client.subscribe(self.subject.clone()).await,
        }
        .with_context(|| format!("Failed to subscribe to {}", self.subject))?;

        info!(
            subject = %self.subject,
            queue_group = ?self.queue_group,
            "Subscribed to request subject"
        );
        Ok(subscriber)
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn queue_group(&self) -> Option<&str> {
        self.queue_group.as_deref()
    }
}
