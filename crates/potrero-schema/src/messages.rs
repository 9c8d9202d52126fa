//! ---
//! ipc_section: "02-messaging-ipc-data-model"
//! ipc_subsection: "module"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Concrete message types exchanged between nodes."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
//! Concrete message types exchanged between nodes, including RPC requests.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{check_finite, check_range, Request, Schema, SchemaResult, Topic};

/// Free-form diagnostic payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Debug {
    /// Unconstrained diagnostic text.
    pub content: String,
}

impl Schema for Debug {
    const TOPIC: Topic = Topic::new("debug");
}

/// RPC request variant of [`Debug`]. Same shape, but the correlation layer
/// expects a reply on the derived reply topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebugRequest {
    /// Unconstrained diagnostic text.
    pub content: String,
}

impl Schema for DebugRequest {
    const TOPIC: Topic = Topic::new("rpc.debug");
}

impl Request for DebugRequest {}

/// Named control axes on the operator station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoystickType {
    // Track joysticks
    /// Left track drive.
    TrackLeft,
    /// Right track drive.
    TrackRight,

    // Left joystick
    /// Cab swing axis.
    CabSwing,
    /// Stick axis.
    Stick,

    // Right joystick
    /// Bucket axis.
    Bucket,
    /// Boom axis.
    Boom,
}

/// Deflection of a single joystick axis, normalized to [-1.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoystickDeflection {
    joystick: JoystickType,
    deflection: f64,
}

impl JoystickDeflection {
    /// Construct a deflection sample. Values outside the closed interval
    /// [-1.0, 1.0] are rejected here, before the message exists.
    pub fn new(joystick: JoystickType, deflection: f64) -> SchemaResult<Self> {
        let msg = Self {
            joystick,
            deflection,
        };
        msg.validate()?;
        Ok(msg)
    }

    /// Which axis was deflected.
    pub fn joystick(&self) -> JoystickType {
        self.joystick
    }

    /// Normalized deflection in [-1.0, 1.0].
    pub fn deflection(&self) -> f64 {
        self.deflection
    }
}

impl Schema for JoystickDeflection {
    const TOPIC: Topic = Topic::new("joystick_deflection");

    fn validate(&self) -> SchemaResult<()> {
        check_range("deflection", self.deflection, -1.0, 1.0)
    }
}

/// Discrete movement directions a user can command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Rotate counter-clockwise.
    Left,
    /// Rotate clockwise.
    Right,
    /// Advance along the current heading.
    Forward,
    /// Reverse along the current heading.
    Backward,
}

/// A discrete movement command from the input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserInput {
    /// Commanded direction. Membership in the closed set is enforced by
    /// the enum itself; unknown tags fail at decode time.
    pub direction: Direction,
}

impl Schema for UserInput {
    const TOPIC: Topic = Topic::new("user_input");
}

/// Robot pose estimate published by the simulator.
///
/// `heading` is an angle in radians, 0 pointing east (along positive x),
/// increasing counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Odometry {
    x_position: f64,
    y_position: f64,
    heading: f64,
}

impl Odometry {
    /// Construct a pose sample; all three fields must be finite.
    pub fn new(x_position: f64, y_position: f64, heading: f64) -> SchemaResult<Self> {
        let msg = Self {
            x_position,
            y_position,
            heading,
        };
        msg.validate()?;
        Ok(msg)
    }

    /// East-west coordinate.
    pub fn x_position(&self) -> f64 {
        self.x_position
    }

    /// North-south coordinate.
    pub fn y_position(&self) -> f64 {
        self.y_position
    }

    /// Heading angle in radians.
    pub fn heading(&self) -> f64 {
        self.heading
    }
}

impl Schema for Odometry {
    const TOPIC: Topic = Topic::new("odometry");

    fn validate(&self) -> SchemaResult<()> {
        check_finite("x_position", self.x_position)?;
        check_finite("y_position", self.y_position)?;
        check_finite("heading", self.heading)
    }
}

/// A 2-D world coordinate, embedded in navigation requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Position {
    /// East-west coordinate.
    pub x: f64,
    /// North-south coordinate.
    pub y: f64,
}

impl Position {
    fn validate(&self) -> SchemaResult<()> {
        check_finite("position.x", self.x)?;
        check_finite("position.y", self.y)
    }
}

fn default_tolerance() -> f64 {
    NavigateRequest::DEFAULT_TOLERANCE
}

/// RPC request to move the robot to a target position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NavigateRequest {
    position: Position,
    #[serde(default = "default_tolerance")]
    tolerance: f64,
}

impl NavigateRequest {
    /// Acceptance radius used when the caller does not specify one, in the
    /// same units as the position.
    pub const DEFAULT_TOLERANCE: f64 = 0.1;

    /// Request navigation to `position` with the default tolerance.
    pub fn new(position: Position) -> SchemaResult<Self> {
        Self::with_tolerance(position, Self::DEFAULT_TOLERANCE)
    }

    /// Request navigation with an explicit tolerance, which must be finite
    /// and strictly positive.
    pub fn with_tolerance(position: Position, tolerance: f64) -> SchemaResult<Self> {
        let msg = Self {
            position,
            tolerance,
        };
        msg.validate()?;
        Ok(msg)
    }

    /// Target position.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Acceptance radius around the target.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

impl Schema for NavigateRequest {
    const TOPIC: Topic = Topic::new("rpc.navigate");

    fn validate(&self) -> SchemaResult<()> {
        self.position.validate()?;
        check_finite("tolerance", self.tolerance)?;
        if self.tolerance <= 0.0 {
            return Err(crate::ValidationError::NotPositive {
                field: "tolerance",
                value: self.tolerance,
            });
        }
        Ok(())
    }
}

impl Request for NavigateRequest {}

/// Generic reply carried on derived reply topics for every RPC exchange.
///
/// Deliberately not a per-request type: a responder must be able to answer
/// even when the procedure fails, so the reply shape stays uniform and the
/// return value travels as an opaque JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcReply {
    /// Return value of the procedure, if it completed.
    #[serde(default)]
    pub value: JsonValue,
    /// Error description, if the procedure failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl RpcReply {
    /// A successful reply carrying the procedure's return value.
    pub fn ok(value: JsonValue) -> Self {
        Self { value, error: None }
    }

    /// A failed reply carrying an error description.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            value: JsonValue::Null,
            error: Some(error.into()),
        }
    }

    /// Whether the procedure failed.
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValidationError;

    #[test]
    fn joystick_deflection_rejects_out_of_range_values() {
        for bad in [1.5, -2.0, f64::NAN, f64::INFINITY] {
            let result = JoystickDeflection::new(JoystickType::TrackLeft, bad);
            match result {
                Err(ValidationError::OutOfRange { field, .. })
                | Err(ValidationError::NotFinite { field, .. }) => {
                    assert_eq!(field, "deflection");
                }
                other => panic!("expected validation failure, got {:?}", other),
            }
        }
    }

    #[test]
    fn joystick_deflection_accepts_interval_boundaries() {
        for ok in [1.0, -1.0, 0.0] {
            let msg = JoystickDeflection::new(JoystickType::Boom, ok).expect("in range");
            assert_eq!(msg.deflection(), ok);
        }
    }

    #[test]
    fn direction_tags_are_a_closed_set() {
        let parsed: Direction = serde_json::from_str("\"forward\"").expect("known tag");
        assert_eq!(parsed, Direction::Forward);
        assert!(serde_json::from_str::<Direction>("\"up\"").is_err());
    }

    #[test]
    fn navigate_request_defaults_tolerance() {
        let request = NavigateRequest::new(Position { x: 2.0, y: -3.0 }).expect("valid");
        assert_eq!(request.tolerance(), 0.1);

        // The default also applies when the field is absent on the wire.
        let parsed: NavigateRequest =
            serde_json::from_str(r#"{"position":{"x":2.0,"y":-3.0}}"#).expect("parses");
        assert_eq!(parsed.tolerance(), 0.1);
    }

    #[test]
    fn navigate_request_rejects_non_positive_tolerance() {
        let position = Position { x: 0.0, y: 0.0 };
        assert!(matches!(
            NavigateRequest::with_tolerance(position, 0.0),
            Err(ValidationError::NotPositive { field: "tolerance", .. })
        ));
        assert!(NavigateRequest::with_tolerance(position, -0.5).is_err());
    }

    #[test]
    fn odometry_rejects_non_finite_pose() {
        assert!(Odometry::new(f64::NAN, 0.0, 0.0).is_err());
        assert!(Odometry::new(0.0, f64::NEG_INFINITY, 0.0).is_err());
        assert!(Odometry::new(1.5, -2.5, std::f64::consts::FRAC_PI_2).is_ok());
    }

    #[test]
    fn rpc_reply_helpers() {
        let ok = RpcReply::ok(serde_json::json!({"x": 1.0}));
        assert!(!ok.is_err());
        let err = RpcReply::err("boom");
        assert!(err.is_err());
        assert_eq!(err.value, JsonValue::Null);
    }
}
