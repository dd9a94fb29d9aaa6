//! Replies to request-reply messages

use crate::schema::form::FormManifest;
use crate::types::response::PredictionResponse;
use anyhow::{Context, Result};
use async_nats::{Client, Message};
use serde::Serialize;
use tracing::{debug, warn};

/// Publishes JSON replies to the inbox a request names
#[derive(Clone)]
pub struct ReplyProducer {
    client: Client,
}

impl ReplyProducer {
    /// Create a new reply producer
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Answer a prediction request.
    ///
    /// Returns `Ok(false)` when the request carried no reply subject and the
    /// response was dropped.
    pub async fn reply(&self, request: &Message, response: &PredictionResponse) -> Result<bool> {
        let sent = self.send(request, response).await?;
        if sent {
            debug!(
                request_id = %response.request_id,
                status = ?response.status,
                "Published prediction reply"
            );
        }
        Ok(sent)
    }

    /// Answer a form request with the manifest
    pub async fn reply_form(&self, request: &Message, manifest: &FormManifest) -> Result<bool> {
        self.send(request, manifest).await
    }

    async fn send<T: Serialize>(&self, request: &Message, body: &T) -> Result<bool> {
        let Some(reply) = request.reply.clone() else {
            warn!(subject = %request.subject, "Request has no reply subject, dropping response");
            return Ok(false);
        };

        let payload = serde_json::to_vec(body).context("Failed to encode reply")?;
        self.client
            .publish(reply, payload.into())
            .await
            .context("Failed to publish reply")?;
        Ok(true)
    }
}
