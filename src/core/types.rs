//! Core data types for device actions, move steps, and request lifecycle.
//!
//! Key types:
//! - [`Action`]: Atomic device-level instruction (button or axis)
//! - [`ActionStep`]: An action pinned to a frame offset within a move
//! - [`RequestStatus`]: Lifecycle of a move request submitted over the command channel
//! - [`RequestError`]: Typed errors returned to command channel callers

use serde::{Deserialize, Serialize};

/// Identifier assigned to every submitted move request
pub type RequestId = u64;

/// Gamepad buttons exposed by the virtual device.
///
/// Names follow positional layout (south = bottom face button) so they do not
/// depend on a vendor's labelling. Xbox-style aliases are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonId {
    #[serde(alias = "a")]
    South,
    #[serde(alias = "b")]
    East,
    #[serde(alias = "y")]
    North,
    #[serde(alias = "x")]
    West,
    #[serde(alias = "lb")]
    L1,
    #[serde(alias = "rb")]
    R1,
    L2,
    R2,
    #[serde(alias = "back")]
    Select,
    Start,
    #[serde(alias = "home")]
    Mode,
    ThumbL,
    ThumbR,
}

impl ButtonId {
    /// Every button, in a stable order
    pub const ALL: [ButtonId; 13] = [
        ButtonId::South,
        ButtonId::East,
        ButtonId::North,
        ButtonId::West,
        ButtonId::L1,
        ButtonId::R1,
        ButtonId::L2,
        ButtonId::R2,
        ButtonId::Select,
        ButtonId::Start,
        ButtonId::Mode,
        ButtonId::ThumbL,
        ButtonId::ThumbR,
    ];
}

/// Gamepad axes exposed by the virtual device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisId {
    LeftX,
    LeftY,
    RightX,
    RightY,
    LeftTrigger,
    RightTrigger,
    /// D-pad horizontal (negative = left)
    HatX,
    /// D-pad vertical (negative = up)
    HatY,
}

impl AxisId {
    /// Every axis, in a stable order
    pub const ALL: [AxisId; 8] = [
        AxisId::LeftX,
        AxisId::LeftY,
        AxisId::RightX,
        AxisId::RightY,
        AxisId::LeftTrigger,
        AxisId::RightTrigger,
        AxisId::HatX,
        AxisId::HatY,
    ];

    /// Triggers rest at 0.0 and only travel in the positive direction
    pub fn is_trigger(self) -> bool {
        matches!(self, AxisId::LeftTrigger | AxisId::RightTrigger)
    }

    /// D-pad hats only take the three discrete positions
    pub fn is_hat(self) -> bool {
        matches!(self, AxisId::HatX | AxisId::HatY)
    }

    /// Valid normalized range for this axis
    pub fn range(self) -> (f32, f32) {
        if self.is_trigger() {
            (0.0, 1.0)
        } else {
            (-1.0, 1.0)
        }
    }
}

/// Discrete axis position, used for d-pad hats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisStep {
    Negative,
    Center,
    Positive,
}

/// Value written to an axis: a normalized float or a discrete position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue {
    /// `-1.0..=1.0` for sticks and hats, `0.0..=1.0` for triggers
    Analog(f32),
    Step(AxisStep),
}

impl AxisValue {
    /// Normalized float for this value
    pub fn normalized(self) -> f32 {
        match self {
            AxisValue::Analog(v) => v,
            AxisValue::Step(AxisStep::Negative) => -1.0,
            AxisValue::Step(AxisStep::Center) => 0.0,
            AxisValue::Step(AxisStep::Positive) => 1.0,
        }
    }

    /// Nearest discrete position (hats round analog values)
    pub fn step(self) -> AxisStep {
        match self {
            AxisValue::Step(step) => step,
            AxisValue::Analog(v) if v <= -0.5 => AxisStep::Negative,
            AxisValue::Analog(v) if v >= 0.5 => AxisStep::Positive,
            AxisValue::Analog(_) => AxisStep::Center,
        }
    }

    /// True if this is the resting value of the axis
    pub fn is_neutral(self) -> bool {
        self.normalized() == 0.0
    }

    /// Check the value is finite and inside the axis range
    pub fn check(self, axis: AxisId) -> std::result::Result<(), String> {
        let v = self.normalized();
        let (min, max) = axis.range();
        if !v.is_finite() {
            return Err(format!("{:?} value is not finite", axis));
        }
        if v < min || v > max {
            return Err(format!(
                "{:?} value {} outside range {}..={}",
                axis, v, min, max
            ));
        }
        Ok(())
    }
}

/// Atomic device-level instruction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    SetButton { button: ButtonId, pressed: bool },
    SetAxis { axis: AxisId, value: AxisValue },
}

impl Action {
    pub fn press(button: ButtonId) -> Self {
        Action::SetButton {
            button,
            pressed: true,
        }
    }

    pub fn release(button: ButtonId) -> Self {
        Action::SetButton {
            button,
            pressed: false,
        }
    }

    pub fn axis(axis: AxisId, value: f32) -> Self {
        Action::SetAxis {
            axis,
            value: AxisValue::Analog(value),
        }
    }

    pub fn hat(axis: AxisId, step: AxisStep) -> Self {
        Action::SetAxis {
            axis,
            value: AxisValue::Step(step),
        }
    }

    /// Return the axis to rest
    pub fn center(axis: AxisId) -> Self {
        if axis.is_hat() {
            Action::hat(axis, AxisStep::Center)
        } else {
            Action::axis(axis, 0.0)
        }
    }
}

/// An action scheduled at a frame offset relative to move start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub frame: u32,
    pub action: Action,
}

impl ActionStep {
    pub fn new(frame: u32, action: Action) -> Self {
        Self { frame, action }
    }
}

/// Why a request ended in `Cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// `CancelCurrent` from a client
    Requested,
    /// Pre-empted by an `Interrupt` request
    Interrupted,
    /// A pending interrupt replaced by a newer one before it started
    Superseded,
    /// Dropped by `ClearQueue` before it started
    Cleared,
    /// Exceeded the maximum move duration
    Timeout,
    /// Virtual device failed mid-move
    DeviceError,
    /// Daemon shutting down
    Shutdown,
}

/// Lifecycle state of a move request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RequestStatus {
    Queued,
    Running,
    Completed,
    Cancelled { reason: CancelReason },
    Rejected { reason: String },
}

impl RequestStatus {
    /// Completed, Cancelled and Rejected never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Queued | RequestStatus::Running)
    }
}

/// Errors reported to command channel callers.
///
/// These never terminate the daemon; the caller is an external process that
/// may send malformed input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RequestError {
    #[error("unknown move: {name}")]
    UnknownMove { name: String },

    #[error("invalid params: {reason}")]
    InvalidParams { reason: String },

    #[error("unknown request id: {request_id}")]
    UnknownRequest { request_id: RequestId },

    #[error("request {request_id} has not finished")]
    StillActive { request_id: RequestId },

    #[error("planning queue is full ({capacity} pending)")]
    QueueFull { capacity: usize },

    #[error("malformed request: {reason}")]
    MalformedRequest { reason: String },

    #[error("daemon is shutting down")]
    ShuttingDown,
}
