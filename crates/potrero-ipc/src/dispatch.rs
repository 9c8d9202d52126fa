//! ---
//! ipc_section: "02-messaging-ipc-data-model"
//! ipc_subsection: "module"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Typed publish/subscribe dispatcher."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
//! Typed publish/subscribe dispatcher.
//!
//! Binds the codec to a broker adapter. Publishing stamps envelope
//! metadata (sender, timestamp, per-topic sequence number) and forwards
//! encoded bytes; subscribing decodes each arriving payload and hands it
//! to the registered handler on a dedicated delivery task, so a slow
//! handler never stalls the receive loop or other handlers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use potrero_codec::{decode, encode, encode_reply, Meta};
use potrero_schema::{NodeId, Request, RpcReply, Schema, Topic};
use potrero_transport::Broker;

use crate::metrics::IpcMetricsExporter;
use crate::Result;

/// Publishes typed messages and delivers decoded instances to handlers.
///
/// The broker connection is handed in at construction so tests can inject
/// an in-process double. The dispatcher itself is cheap to share behind an
/// `Arc`; all interior state is synchronized.
pub struct Dispatcher {
    broker: Arc<dyn Broker>,
    node: NodeId,
    counters: Mutex<HashMap<String, u64>>,
    metrics: Option<Arc<IpcMetricsExporter>>,
}

impl Dispatcher {
    /// Create a dispatcher for the given node over the given broker.
    pub fn new(node: NodeId, broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            node,
            counters: Mutex::new(HashMap::new()),
            metrics: None,
        }
    }

    /// Attach a metrics exporter.
    pub fn with_metrics(mut self, metrics: Arc<IpcMetricsExporter>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Identity this dispatcher publishes under.
    pub fn node(&self) -> &NodeId {
        &self.node
    }

    /// The underlying broker adapter.
    pub fn broker(&self) -> Arc<dyn Broker> {
        Arc::clone(&self.broker)
    }

    fn next_seq(&self, topic: &str) -> u64 {
        let mut counters = self.counters.lock();
        let counter = counters.entry(topic.to_owned()).or_insert(0);
        let seq = *counter;
        *counter = counter.wrapping_add(1);
        seq
    }

    /// Publish a typed message on its canonical topic. Transport failures
    /// surface to the caller and are not retried.
    pub async fn publish<M: Schema>(&self, message: &M) -> Result<()> {
        self.publish_inner(message, None).await
    }

    pub(crate) async fn publish_correlated<M: Schema>(
        &self,
        message: &M,
        correlation: Uuid,
    ) -> Result<()> {
        self.publish_inner(message, Some(correlation)).await
    }

    async fn publish_inner<M: Schema>(
        &self,
        message: &M,
        correlation: Option<Uuid>,
    ) -> Result<()> {
        let topic = M::TOPIC.as_str();
        let mut meta = Meta::new(self.node.clone(), self.next_seq(topic));
        if let Some(correlation) = correlation {
            meta = meta.with_correlation(correlation);
        }
        let bytes = encode(&meta, message)?;
        self.broker.publish(topic, bytes).await?;
        if let Some(metrics) = &self.metrics {
            metrics.observe_published();
        }
        debug!(topic, sender = %self.node, seq = meta.seq, "message published");
        Ok(())
    }

    /// Publish an RPC reply on `R`'s derived reply topic, carrying the
    /// request's correlation id. Fire-and-forget: there is no guarantee a
    /// caller is still waiting.
    pub async fn respond<R: Request>(&self, correlation: Uuid, reply: &RpcReply) -> Result<()> {
        let reply_topic = R::TOPIC.reply();
        let meta = Meta::new(self.node.clone(), self.next_seq(&reply_topic))
            .with_correlation(correlation);
        let bytes = encode_reply(&meta, reply)?;
        self.broker.publish(&reply_topic, bytes).await?;
        debug!(topic = %reply_topic, %correlation, "reply published");
        Ok(())
    }

    /// Register `handler` for every decoded `M` arriving on its topic.
    ///
    /// Each call opens its own broker subscription, so multiple handlers
    /// per topic each see every message. Malformed payloads are logged and
    /// skipped without affecting subsequent deliveries. Dropping the
    /// returned handle tears the subscription down.
    pub async fn subscribe<M, H, Fut>(&self, handler: H) -> Result<SubscriptionHandle>
    where
        M: Schema,
        H: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let topic = M::TOPIC;
        let mut subscription = self.broker.subscribe(topic.as_str()).await?;
        let metrics = self.metrics.clone();

        // Unbounded queue between the receive loop and the delivery task:
        // decode keeps draining the broker even while the handler runs.
        let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<M>();

        let recv_task = tokio::spawn(async move {
            let mut last_seq: HashMap<NodeId, u64> = HashMap::new();
            while let Some(bytes) = subscription.recv().await {
                match decode::<M>(&bytes) {
                    Ok((meta, message)) => {
                        if let Some(prev) = last_seq.insert(meta.sender.clone(), meta.seq) {
                            if meta.seq != prev.wrapping_add(1) {
                                warn!(
                                    topic = %topic,
                                    sender = %meta.sender,
                                    expected = prev.wrapping_add(1),
                                    received = meta.seq,
                                    "out-of-order message"
                                );
                            }
                        }
                        if let Some(metrics) = &metrics {
                            metrics.observe_delivered();
                        }
                        if queue_tx.send(message).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(topic = %topic, error = %err, "dropping malformed payload");
                        if let Some(metrics) = &metrics {
                            metrics.observe_decode_failure();
                        }
                    }
                }
            }
            debug!(topic = %topic, "subscription stream ended");
        });

        let deliver_task = tokio::spawn(async move {
            while let Some(message) = queue_rx.recv().await {
                handler(message).await;
            }
        });

        Ok(SubscriptionHandle {
            topic,
            recv_task,
            deliver_task,
        })
    }
}

/// Handle to a live typed subscription. Aborts the receive and delivery
/// tasks when dropped.
#[derive(Debug)]
pub struct SubscriptionHandle {
    topic: Topic,
    recv_task: JoinHandle<()>,
    deliver_task: JoinHandle<()>,
}

impl SubscriptionHandle {
    /// Topic this subscription listens on.
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Tear the subscription down immediately.
    pub fn abort(&self) {
        self.recv_task.abort();
        self.deliver_task.abort();
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
