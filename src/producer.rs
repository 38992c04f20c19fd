//! NATS reply publisher

use crate::service::ReplyEnvelope;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Publishes reply envelopes to requesters' inboxes
#[derive(Clone)]
pub struct ReplyPublisher {
    client: Client,
}

impl ReplyPublisher {
    /// Create a new reply publisher
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Publish a reply to the given inbox subject
    pub async fn publish(&self, reply_to: Subject, envelope: &ReplyEnvelope) -> Result<()> {
        let payload = serde_json::to_vec(envelope)?;

        self.client.publish(reply_to.clone(), payload.into()).await?;

        debug!(
            request_id = %envelope.request_id,
            reply_to = %reply_to,
            status = envelope.status,
            "Published reply"
        );

        Ok(())
    }
}
