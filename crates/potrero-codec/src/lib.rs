//! ---
//! ipc_section: "02-messaging-ipc-data-model"
//! ipc_subsection: "module"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Wire envelope and message codec."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
//! Wire codec for Potrero messages.
//!
//! Every payload exchanged with the broker is a JSON envelope: publisher
//! metadata (sender, timestamp, per-topic sequence number, optional RPC
//! correlation id) wrapped around the schema's field set. Decoding
//! reconstructs the exact type registered for the topic and re-runs the
//! same validation as direct construction, so a malformed or out-of-range
//! payload can never reach a handler.

#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use potrero_schema::{NodeId, RpcReply, Schema};

pub mod registry;

pub use registry::{decode_any, is_registered, registered_topics, AnyMessage};

/// Shared result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding wire payloads.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The bytes on a registered topic do not match the topic's schema:
    /// unparsable envelope, extra or missing fields, or field values that
    /// fail validation.
    #[error("malformed payload on topic `{topic}`: {reason}")]
    MalformedPayload {
        /// Topic the payload arrived on.
        topic: String,
        /// Human-readable mismatch description.
        reason: String,
    },
    /// Decode was requested for a topic with no registered schema. This is
    /// a programming error at the call site, not a wire problem.
    #[error("no schema registered for topic `{topic}`")]
    UnknownTopic {
        /// The unregistered topic.
        topic: String,
    },
    /// Serialization failed while encoding. Does not occur for validated
    /// messages; kept so encode is total over arbitrary payload values.
    #[error("serialization error: {0}")]
    Serialize(serde_json::Error),
}

/// Publisher metadata stamped onto every wire payload.
///
/// The sequence number is per publisher and per topic; subscribers use it
/// to flag gaps and reordering for diagnostics. The correlation id is only
/// present on RPC traffic and is envelope metadata, never a schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Node that published the message.
    pub sender: NodeId,
    /// Time-zone aware publish timestamp.
    pub sent_at: DateTime<Utc>,
    /// Per-publisher, per-topic sequence number.
    pub seq: u64,
    /// Correlation id linking an RPC request to its reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<Uuid>,
}

impl Meta {
    /// Metadata for an ordinary publish, timestamped now.
    pub fn new(sender: NodeId, seq: u64) -> Self {
        Self {
            sender,
            sent_at: Utc::now(),
            seq,
            correlation: None,
        }
    }

    /// Attach an RPC correlation id.
    pub fn with_correlation(mut self, correlation: Uuid) -> Self {
        self.correlation = Some(correlation);
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(flatten)]
    meta: Meta,
    payload: JsonValue,
}

fn malformed(topic: &str, reason: impl ToString) -> CodecError {
    CodecError::MalformedPayload {
        topic: topic.to_owned(),
        reason: reason.to_string(),
    }
}

/// Encode a validated message with its envelope metadata.
///
/// Encoding is deterministic for identical field values and metadata:
/// struct fields serialize in declaration order.
pub fn encode<M: Schema>(meta: &Meta, message: &M) -> CodecResult<Vec<u8>> {
    encode_value(meta, message)
}

/// Encode an [`RpcReply`] for a derived reply topic.
pub fn encode_reply(meta: &Meta, reply: &RpcReply) -> CodecResult<Vec<u8>> {
    encode_value(meta, reply)
}

fn encode_value<T: Serialize>(meta: &Meta, payload: &T) -> CodecResult<Vec<u8>> {
    let payload = serde_json::to_value(payload).map_err(CodecError::Serialize)?;
    let envelope = Envelope {
        meta: meta.clone(),
        payload,
    };
    serde_json::to_vec(&envelope).map_err(CodecError::Serialize)
}

/// Decode a payload from `M`'s canonical topic, re-running schema
/// validation. Extra fields, missing fields, and out-of-range values all
/// surface as [`CodecError::MalformedPayload`].
pub fn decode<M: Schema>(bytes: &[u8]) -> CodecResult<(Meta, M)> {
    let topic = M::TOPIC.as_str();
    let (meta, message): (Meta, M) = decode_value(topic, bytes)?;
    message.validate().map_err(|err| malformed(topic, err))?;
    Ok((meta, message))
}

/// Decode an [`RpcReply`] from the given reply topic.
pub fn decode_reply(topic: &str, bytes: &[u8]) -> CodecResult<(Meta, RpcReply)> {
    decode_value(topic, bytes)
}

fn decode_value<T: DeserializeOwned>(topic: &str, bytes: &[u8]) -> CodecResult<(Meta, T)> {
    let envelope: Envelope =
        serde_json::from_slice(bytes).map_err(|err| malformed(topic, err))?;
    let payload: T =
        serde_json::from_value(envelope.payload).map_err(|err| malformed(topic, err))?;
    Ok((envelope.meta, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use potrero_schema::{JoystickDeflection, JoystickType, NavigateRequest, Odometry, Position};

    fn meta() -> Meta {
        Meta::new(NodeId::new("codec-test"), 7)
    }

    #[test]
    fn round_trip_preserves_message_and_meta() {
        let msg = JoystickDeflection::new(JoystickType::CabSwing, -0.25).expect("valid");
        let meta = meta().with_correlation(Uuid::new_v4());
        let bytes = encode(&meta, &msg).expect("encode");
        let (decoded_meta, decoded): (Meta, JoystickDeflection) =
            decode(&bytes).expect("decode");
        assert_eq!(decoded, msg);
        assert_eq!(decoded_meta, meta);
    }

    #[test]
    fn encoding_is_deterministic() {
        let msg = Odometry::new(1.0, -2.0, 0.5).expect("valid");
        let meta = meta();
        let first = encode(&meta, &msg).expect("encode");
        let second = encode(&meta, &msg).expect("encode");
        assert_eq!(first, second);
    }

    #[test]
    fn decode_rejects_extra_fields() {
        let bytes = serde_json::to_vec(&serde_json::json!({
            "sender": "codec-test",
            "sent_at": Utc::now(),
            "seq": 0,
            "payload": {"direction": "left", "speed": 3.0},
        }))
        .expect("serialize");
        let result = decode::<potrero_schema::UserInput>(&bytes);
        assert!(matches!(
            result,
            Err(CodecError::MalformedPayload { topic, .. }) if topic == "user_input"
        ));
    }

    #[test]
    fn decode_rejects_missing_fields() {
        let bytes = serde_json::to_vec(&serde_json::json!({
            "sender": "codec-test",
            "sent_at": Utc::now(),
            "seq": 0,
            "payload": {"joystick": "boom"},
        }))
        .expect("serialize");
        assert!(decode::<JoystickDeflection>(&bytes).is_err());
    }

    #[test]
    fn decode_revalidates_field_constraints() {
        // A peer that skipped construction-time validation must still be
        // rejected at our boundary.
        let bytes = serde_json::to_vec(&serde_json::json!({
            "sender": "codec-test",
            "sent_at": Utc::now(),
            "seq": 0,
            "payload": {"joystick": "stick", "deflection": 4.2},
        }))
        .expect("serialize");
        let result = decode::<JoystickDeflection>(&bytes);
        match result {
            Err(CodecError::MalformedPayload { reason, .. }) => {
                assert!(reason.contains("deflection"), "reason: {reason}");
            }
            other => panic!("expected malformed payload, got {:?}", other),
        }
    }

    #[test]
    fn navigate_request_round_trips_with_defaulted_tolerance() {
        let request = NavigateRequest::new(Position { x: 4.0, y: 4.0 }).expect("valid");
        let bytes = encode(&meta(), &request).expect("encode");
        let (_, decoded): (Meta, NavigateRequest) = decode(&bytes).expect("decode");
        assert_eq!(decoded, request);
        assert_eq!(decoded.tolerance(), NavigateRequest::DEFAULT_TOLERANCE);
    }

    #[test]
    fn reply_round_trip() {
        let reply = RpcReply::ok(serde_json::json!({"x": 1.0, "y": 2.0}));
        let meta = meta().with_correlation(Uuid::new_v4());
        let bytes = encode_reply(&meta, &reply).expect("encode");
        let (decoded_meta, decoded) = decode_reply("rpc.navigate.reply", &bytes).expect("decode");
        assert_eq!(decoded, reply);
        assert_eq!(decoded_meta.correlation, meta.correlation);
    }
}
