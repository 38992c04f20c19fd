//! NATS subscription for incoming scoring requests

use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Queue group shared by all scoring service instances
pub const QUEUE_GROUP: &str = "bfsi-scoring";

/// Consumer for request subjects under one prefix
pub struct RequestConsumer {
    client: Client,
    prefix: String,
}

impl RequestConsumer {
    /// Create a new request consumer
    pub fn new(client: Client, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
        }
    }

    /// Wildcard subject covering every request kind
    pub fn subject(&self) -> String {
        format!("{}.>", self.prefix)
    }

    /// Subscribe to all request subjects in the shared queue group
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subject = self.subject();
        let subscriber = self
            .client
            .queue_subscribe(subject.clone(), QUEUE_GROUP.to_string())
            .await?;
        info!(subject = %subject, queue = QUEUE_GROUP, "Subscribed to request subjects");
        Ok(subscriber)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
