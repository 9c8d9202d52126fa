//! ---
//! ipc_section: "02-messaging-ipc-data-model"
//! ipc_subsection: "module"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Shared schema definitions and validation logic."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
//! Schema definitions for the Potrero messaging layer.
//!
//! Every message type carries a fixed topic identity and is validated at
//! construction time; a value that fails its field constraints is never
//! observable by the rest of the system. The codec re-runs the same
//! validation when decoding off the wire, so publishers and subscribers
//! agree on what a well-formed message is.

#![warn(missing_docs)]

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub mod messages;

pub use messages::{
    Debug, DebugRequest, Direction, JoystickDeflection, JoystickType, NavigateRequest, Odometry,
    Position, RpcReply, UserInput,
};

/// Shared result type for schema validation routines.
pub type SchemaResult<T> = Result<T, ValidationError>;

/// Error raised when a message is constructed (or decoded) with field
/// values that violate its declared constraints.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A numeric field fell outside its closed interval.
    #[error("field `{field}` out of range: {value} not within [{min}, {max}]")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Rejected value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// A numeric field was NaN or infinite.
    #[error("field `{field}` must be finite, got {value}")]
    NotFinite {
        /// Name of the offending field.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// A numeric field required to be strictly positive was not.
    #[error("field `{field}` must be strictly positive, got {value}")]
    NotPositive {
        /// Name of the offending field.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },
}

/// Canonical name of the broker channel through which one message type's
/// instances flow. One topic per message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Topic(&'static str);

impl Topic {
    /// Wrap a static topic string.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The topic as a plain string identifier.
    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    /// Derive the reply topic for RPC traffic on this topic. Both caller
    /// and responder compute this independently, so the derivation must
    /// stay deterministic.
    pub fn reply(&self) -> String {
        format!("{}.reply", self.0)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Typed identifier for node names (clearer than passing plain strings).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Construct a node identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contract implemented by every message type: serializable field set,
/// canonical topic, and construction-time validation.
pub trait Schema:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Canonical topic this message type flows on.
    const TOPIC: Topic;

    /// Re-check field constraints. Constructors call this before handing
    /// out a value, and the codec calls it again after decoding.
    fn validate(&self) -> SchemaResult<()> {
        Ok(())
    }
}

/// Marker for RPC request message kinds. A request additionally maps to a
/// reply topic ([`Topic::reply`]) observed by the correlation layer.
pub trait Request: Schema {}

pub(crate) fn check_finite(field: &'static str, value: f64) -> SchemaResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NotFinite { field, value })
    }
}

pub(crate) fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> SchemaResult<()> {
    check_finite(field, value)?;
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
