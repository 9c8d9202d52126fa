//! ---
//! ipc_section: "02-messaging-ipc-data-model"
//! ipc_subsection: "module"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Topic registry and dynamic decode."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
//! Listing of every recognized topic and the schema registered for it.
//!
//! Keeps publishers and subscribers coordinated on the same topic/schema
//! pairing without runtime registration. Should be updated whenever a new
//! message type is added.

use potrero_schema::{
    Debug, DebugRequest, JoystickDeflection, NavigateRequest, Odometry, Schema, Topic, UserInput,
};

use crate::{decode, CodecError, CodecResult, Meta};

/// A decoded message of any registered type. Closed set: adding a topic is
/// a compile-time-visible change at every exhaustive match.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyMessage {
    /// Free-form diagnostic payload.
    Debug(Debug),
    /// Diagnostic RPC request.
    DebugRequest(DebugRequest),
    /// Joystick axis deflection sample.
    JoystickDeflection(JoystickDeflection),
    /// Discrete movement command.
    UserInput(UserInput),
    /// Robot pose estimate.
    Odometry(Odometry),
    /// Navigation RPC request.
    NavigateRequest(NavigateRequest),
}

impl AnyMessage {
    /// Canonical topic of the contained message.
    pub fn topic(&self) -> Topic {
        match self {
            AnyMessage::Debug(_) => Debug::TOPIC,
            AnyMessage::DebugRequest(_) => DebugRequest::TOPIC,
            AnyMessage::JoystickDeflection(_) => JoystickDeflection::TOPIC,
            AnyMessage::UserInput(_) => UserInput::TOPIC,
            AnyMessage::Odometry(_) => Odometry::TOPIC,
            AnyMessage::NavigateRequest(_) => NavigateRequest::TOPIC,
        }
    }
}

/// Every topic with a registered schema.
pub fn registered_topics() -> &'static [Topic] {
    const TOPICS: &[Topic] = &[
        Debug::TOPIC,
        DebugRequest::TOPIC,
        JoystickDeflection::TOPIC,
        UserInput::TOPIC,
        Odometry::TOPIC,
        NavigateRequest::TOPIC,
    ];
    TOPICS
}

/// Whether a schema is registered for the topic.
pub fn is_registered(topic: &str) -> bool {
    registered_topics().iter().any(|t| t.as_str() == topic)
}

/// Decode a payload from an arbitrary registered topic into the exact type
/// registered for it. Fails with [`CodecError::UnknownTopic`] when the
/// topic has no schema.
pub fn decode_any(topic: &str, bytes: &[u8]) -> CodecResult<(Meta, AnyMessage)> {
    match topic {
        t if t == Debug::TOPIC.as_str() => {
            decode::<Debug>(bytes).map(|(m, msg)| (m, AnyMessage::Debug(msg)))
        }
        t if t == DebugRequest::TOPIC.as_str() => {
            decode::<DebugRequest>(bytes).map(|(m, msg)| (m, AnyMessage::DebugRequest(msg)))
        }
        t if t == JoystickDeflection::TOPIC.as_str() => decode::<JoystickDeflection>(bytes)
            .map(|(m, msg)| (m, AnyMessage::JoystickDeflection(msg))),
        t if t == UserInput::TOPIC.as_str() => {
            decode::<UserInput>(bytes).map(|(m, msg)| (m, AnyMessage::UserInput(msg)))
        }
        t if t == Odometry::TOPIC.as_str() => {
            decode::<Odometry>(bytes).map(|(m, msg)| (m, AnyMessage::Odometry(msg)))
        }
        t if t == NavigateRequest::TOPIC.as_str() => {
            decode::<NavigateRequest>(bytes).map(|(m, msg)| (m, AnyMessage::NavigateRequest(msg)))
        }
        other => Err(CodecError::UnknownTopic {
            topic: other.to_owned(),
        }),
    }
}
