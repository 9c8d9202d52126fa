//! ---
//! ipc_section: "02-messaging-ipc-data-model"
//! ipc_subsection: "module"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Request/response correlation layered on pub/sub."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
//! Request/response correlation layered on plain pub/sub.
//!
//! A call publishes the request with a fresh correlation id and parks a
//! oneshot slot in the pending map; the client's single reply-topic
//! listener resolves the slot when a matching reply arrives. Each call is
//! resolved exactly once: by the matching reply, by deadline expiry, or by
//! the caller abandoning the future. Replies with no pending slot (late,
//! duplicate, or abandoned) are discarded silently.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use potrero_codec::{decode, decode_reply};
use potrero_schema::{Request, RpcReply};

use crate::dispatch::Dispatcher;
use crate::metrics::IpcMetricsExporter;
use crate::{IpcError, Result};

type PendingMap = Arc<Mutex<HashMap<Uuid, oneshot::Sender<RpcReply>>>>;

/// Removes the pending slot when the call completes or is abandoned.
/// Idempotent against the listener, which removes the slot itself before
/// resolving it.
struct PendingSlot {
    pending: PendingMap,
    id: Uuid,
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// Client side of one RPC. Holds the reply-topic subscription for the
/// request type `R` and correlates replies to in-flight calls.
pub struct RpcClient<R: Request> {
    dispatcher: Arc<Dispatcher>,
    pending: PendingMap,
    metrics: Option<Arc<IpcMetricsExporter>>,
    listener: JoinHandle<()>,
    _request: PhantomData<fn() -> R>,
}

impl<R: Request> RpcClient<R> {
    /// Subscribe to `R`'s reply topic and return a client ready to call.
    pub async fn connect(dispatcher: Arc<Dispatcher>) -> Result<Self> {
        Self::connect_inner(dispatcher, None).await
    }

    /// Like [`RpcClient::connect`], recording timeouts on the exporter.
    pub async fn connect_with_metrics(
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<IpcMetricsExporter>,
    ) -> Result<Self> {
        Self::connect_inner(dispatcher, Some(metrics)).await
    }

    async fn connect_inner(
        dispatcher: Arc<Dispatcher>,
        metrics: Option<Arc<IpcMetricsExporter>>,
    ) -> Result<Self> {
        let reply_topic = R::TOPIC.reply();
        let mut subscription = dispatcher.broker().subscribe(&reply_topic).await?;
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let pending_for_listener = Arc::clone(&pending);
        let listener = tokio::spawn(async move {
            while let Some(bytes) = subscription.recv().await {
                let (meta, reply) = match decode_reply(&reply_topic, &bytes) {
                    Ok(decoded) => decoded,
                    Err(err) => {
                        warn!(topic = %reply_topic, error = %err, "dropping malformed reply");
                        continue;
                    }
                };
                let Some(correlation) = meta.correlation else {
                    warn!(topic = %reply_topic, "reply without correlation id");
                    continue;
                };
                // Remove-then-send keeps resolution exactly-once even when
                // a timeout fires concurrently: the oneshot send simply
                // fails if the caller is already gone.
                match pending_for_listener.lock().remove(&correlation) {
                    Some(slot) => {
                        let _ = slot.send(reply);
                    }
                    None => {
                        debug!(topic = %reply_topic, %correlation, "discarding reply with no pending caller");
                    }
                }
            }
            debug!(topic = %reply_topic, "reply subscription ended");
        });

        Ok(Self {
            dispatcher,
            pending,
            metrics,
            listener,
            _request: PhantomData,
        })
    }

    /// Publish `request` and await the correlated reply.
    ///
    /// Fails with [`IpcError::RpcTimeout`] when no matching reply arrives
    /// within `timeout`. Dropping the returned future before resolution
    /// releases the pending slot; a reply arriving afterwards is discarded
    /// without error.
    pub async fn call(&self, request: &R, timeout: Duration) -> Result<RpcReply> {
        let correlation = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(correlation, tx);
        let _slot = PendingSlot {
            pending: Arc::clone(&self.pending),
            id: correlation,
        };

        let started = Instant::now();
        self.dispatcher.publish_correlated(request, correlation).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_closed)) => Err(IpcError::ClientClosed {
                request: R::TOPIC.as_str(),
            }),
            Err(_elapsed) => {
                if let Some(metrics) = &self.metrics {
                    metrics.observe_rpc_timeout();
                }
                Err(IpcError::RpcTimeout {
                    request: R::TOPIC.as_str(),
                    elapsed: started.elapsed(),
                })
            }
        }
    }
}

impl<R: Request> Drop for RpcClient<R> {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Server side of one RPC: decodes requests from `R`'s topic, runs the
/// procedure, and publishes the reply under the request's correlation id.
pub struct RpcServer<R: Request> {
    task: JoinHandle<()>,
    _request: PhantomData<fn() -> R>,
}

impl<R: Request> RpcServer<R> {
    /// Start serving requests with the given procedure.
    ///
    /// Requests are processed one at a time, in arrival order. A procedure
    /// error is not a server failure: it travels back to the caller as an
    /// error reply. The same holds for a procedure panic, which is
    /// contained by running each invocation on its own task.
    pub async fn serve<H, Fut>(dispatcher: Arc<Dispatcher>, handler: H) -> Result<Self>
    where
        H: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<JsonValue, String>> + Send + 'static,
    {
        let topic = R::TOPIC;
        let mut subscription = dispatcher.broker().subscribe(topic.as_str()).await?;

        let task = tokio::spawn(async move {
            while let Some(bytes) = subscription.recv().await {
                let (meta, request) = match decode::<R>(&bytes) {
                    Ok(decoded) => decoded,
                    Err(err) => {
                        warn!(topic = %topic, error = %err, "dropping malformed request");
                        continue;
                    }
                };
                let Some(correlation) = meta.correlation else {
                    warn!(topic = %topic, sender = %meta.sender, "request without correlation id; cannot reply");
                    continue;
                };

                let started = Instant::now();
                let reply = match tokio::spawn(handler(request)).await {
                    Ok(Ok(value)) => RpcReply::ok(value),
                    Ok(Err(err)) => RpcReply::err(err),
                    Err(join_err) => {
                        warn!(topic = %topic, %correlation, error = %join_err, "procedure panicked");
                        RpcReply::err(format!("procedure failed: {join_err}"))
                    }
                };
                if let Err(err) = dispatcher.respond::<R>(correlation, &reply).await {
                    warn!(topic = %topic, %correlation, error = %err, "failed to publish reply");
                    continue;
                }
                debug!(
                    topic = %topic,
                    %correlation,
                    errored = reply.is_err(),
                    elapsed = ?started.elapsed(),
                    "request served"
                );
            }
            debug!(topic = %topic, "request subscription ended");
        });

        Ok(Self {
            task,
            _request: PhantomData,
        })
    }

    /// Stop serving immediately.
    pub fn abort(&self) {
        self.task.abort();
    }
}

impl<R: Request> Drop for RpcServer<R> {
    fn drop(&mut self) {
        self.abort();
    }
}
