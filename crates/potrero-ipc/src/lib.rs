//! ---
//! ipc_section: "02-messaging-ipc-data-model"
//! ipc_subsection: "module"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Typed pub/sub dispatch and RPC correlation."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
//! Typed pub/sub dispatch and RPC correlation for Potrero nodes.
//!
//! The [`Dispatcher`] binds the codec to a broker adapter: it publishes
//! typed messages on their canonical topics and delivers decoded instances
//! to registered handlers. The [`rpc`] module layers request/response
//! correlation on top of plain pub/sub. Together with `respond`, these are
//! the entire surface node programs are built against.

#![warn(missing_docs)]

use std::time::Duration;

pub mod dispatch;
pub mod metrics;
pub mod rpc;

pub use dispatch::{Dispatcher, SubscriptionHandle};
pub use metrics::IpcMetricsExporter;
pub use rpc::{RpcClient, RpcServer};

use potrero_codec::CodecError;
use potrero_schema::ValidationError;
use potrero_transport::TransportError;

/// Shared result type for IPC operations.
pub type Result<T> = std::result::Result<T, IpcError>;

/// Errors surfaced to node code by the dispatch and RPC layers.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Message failed construction-time validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Encoding or decoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The broker connection is unavailable. Not retried here; retry
    /// policy belongs to the caller.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// No matching reply arrived within the caller's deadline.
    #[error("rpc `{request}` timed out after {elapsed:?}")]
    RpcTimeout {
        /// Topic of the request that went unanswered.
        request: &'static str,
        /// Time waited before giving up.
        elapsed: Duration,
    },
    /// The client's reply listener has shut down while a call was pending.
    #[error("rpc client for `{request}` is closed")]
    ClientClosed {
        /// Topic of the affected request type.
        request: &'static str,
    },
}
