//! ---
//! ipc_section: "02-messaging-ipc-data-model"
//! ipc_subsection: "module"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Broker transport adapters."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
//! Transport adapters for the Potrero messaging layer.
//!
//! The broker itself is an external collaborator; this crate consumes it
//! through exactly two primitives: publish bytes to a named channel, and
//! subscribe to a named channel receiving a lazy stream of byte payloads.
//! Two adapters are provided: [`RedisBroker`] for the fleet's shared Redis
//! instance, and [`InMemoryBroker`] which simulates the broker in-process
//! for tests and single-process integration.
//!
//! Adapters perform no retries; a lost connection surfaces as
//! [`TransportError::Unavailable`] and retry policy stays with the caller.

#![warn(missing_docs)]

use async_trait::async_trait;
use tokio::sync::mpsc;

pub mod memory;
pub mod redis;

pub use memory::InMemoryBroker;
pub use redis::RedisBroker;

/// Shared result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors surfaced by broker adapters.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The broker connection is gone or could not be established.
    #[error("broker unavailable: {0}")]
    Unavailable(String),
    /// The broker answered with something the adapter cannot interpret.
    #[error("broker protocol error: {0}")]
    Protocol(String),
}

/// The two operations required of the external broker. Implementations
/// must support concurrent publish and subscribe-receive without external
/// locking by the caller.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish a raw payload to the named channel.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> TransportResult<()>;

    /// Open a subscription to the named channel. The returned stream is
    /// unbounded and lazy; a closed subscription is restarted by
    /// subscribing again.
    async fn subscribe(&self, topic: &str) -> TransportResult<Subscription>;

    /// Human-readable adapter name for logging.
    fn name(&self) -> &'static str;
}

/// Live subscription to one broker channel.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Subscription {
    pub(crate) fn new(topic: String, rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self { topic, rx }
    }

    /// Receive the next payload, or `None` once the subscription has
    /// ended (broker gone or channel torn down).
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Channel this subscription listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}
