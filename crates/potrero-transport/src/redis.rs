//! ---
//! ipc_section: "02-messaging-ipc-data-model"
//! ipc_subsection: "module"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Redis pub/sub adapter over the redis crate."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
//! Redis pub/sub adapter.
//!
//! One managed connection carries all publishes; the connection manager
//! multiplexes commands internally so callers need no locking. Each
//! subscription opens its own pub/sub connection: a Redis connection in
//! subscribe mode accepts no other commands, so the dedicated connection
//! doubles as the subscription's lifetime.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{Broker, Subscription, TransportError, TransportResult};

impl From<redis::RedisError> for TransportError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
            TransportError::Unavailable(err.to_string())
        } else {
            TransportError::Protocol(err.to_string())
        }
    }
}

/// Broker adapter for a Redis-compatible pub/sub service.
pub struct RedisBroker {
    addr: String,
    client: Client,
    conn: ConnectionManager,
}

impl RedisBroker {
    /// Connect to the broker at `host:port`. Fails with
    /// [`TransportError::Unavailable`] when the service is unreachable.
    pub async fn connect(host: &str, port: u16) -> TransportResult<Self> {
        let addr = format!("redis://{host}:{port}");
        let client = Client::open(addr.as_str())?;
        let conn = ConnectionManager::new(client.clone()).await?;
        debug!(%addr, "connected to broker");
        Ok(Self { addr, client, conn })
    }

    /// Address this adapter talks to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> TransportResult<()> {
        let mut conn = self.conn.clone();
        // Receiver count; zero subscribers is not an error.
        let _receivers: i64 = conn.publish(topic, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> TransportResult<Subscription> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(topic).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let channel = topic.to_owned();
        tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            while let Some(msg) = messages.next().await {
                if tx.send(msg.get_payload_bytes().to_vec()).is_err() {
                    break;
                }
            }
            debug!(topic = %channel, "subscription connection closed");
        });

        Ok(Subscription::new(topic.to_owned(), rx))
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_failures_surface_as_unavailable() {
        let refused = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(matches!(
            TransportError::from(refused),
            TransportError::Unavailable(_)
        ));
    }

    #[test]
    fn non_io_failures_surface_as_protocol_errors() {
        let type_error = redis::RedisError::from((redis::ErrorKind::TypeError, "bad reply"));
        assert!(matches!(
            TransportError::from(type_error),
            TransportError::Protocol(_)
        ));
    }

    #[tokio::test]
    async fn malformed_address_is_rejected_without_panicking() {
        let result = RedisBroker::connect("bad host", 6379).await;
        assert!(result.is_err());
    }
}
