//! ---
//! ipc_section: "02-messaging-ipc-data-model"
//! ipc_subsection: "module"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "In-process broker used for tests and integration."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
//! In-memory broker backed by per-topic broadcast channels.
//!
//! Mirrors the external broker's channel semantics: fan-out to every live
//! subscriber, no delivery to late subscribers, messages published with no
//! subscriber are dropped. Used as the dependency-injected test double in
//! place of a networked broker.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::{Broker, Subscription, TransportResult};

const CHANNEL_CAPACITY: usize = 1024;

/// In-process pub/sub broker.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>>,
}

impl InMemoryBroker {
    /// Create a new broker with no channels.
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<Vec<u8>> {
        let mut topics = self.topics.lock();
        topics
            .entry(topic.to_owned())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> TransportResult<()> {
        // A send error means nobody is subscribed, which is ordinary
        // pub/sub behavior, not a failure.
        let _ = self.sender_for(topic).send(payload);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> TransportResult<Subscription> {
        let mut source = self.sender_for(topic).subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = topic.to_owned();
        tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(payload) => {
                        if tx.send(payload).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(topic = %channel, skipped, "subscriber lagged; payloads dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(Subscription::new(topic.to_owned(), rx))
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
