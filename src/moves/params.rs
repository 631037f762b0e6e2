//! Request parameters that reshape a move's timeline
//!
//! | Key | Type | Range | Effect |
//! |-----|------|-------|--------|
//! | `repeat` | integer | 1..=16 | Timeline played N times back to back |
//! | `delay_frames` | integer | 0..=600 | Every step shifted later |

use super::Move;
use crate::core::types::{ActionStep, RequestError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_REPEAT: i64 = 16;
pub const MAX_DELAY_FRAMES: i64 = 600;

/// Scalar parameter value as sent by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Parameter map carried by `Enqueue` and `Interrupt`
pub type Params = BTreeMap<String, ParamValue>;

/// Validated parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveParams {
    pub repeat: u32,
    pub delay_frames: u32,
}

impl Default for MoveParams {
    fn default() -> Self {
        Self {
            repeat: 1,
            delay_frames: 0,
        }
    }
}

fn invalid(reason: String) -> RequestError {
    RequestError::InvalidParams { reason }
}

fn int_in_range(key: &str, value: &ParamValue, min: i64, max: i64) -> Result<u32, RequestError> {
    match value {
        ParamValue::Int(v) if (min..=max).contains(v) => Ok(*v as u32),
        ParamValue::Int(v) => Err(invalid(format!(
            "{} must be within {}..={}, got {}",
            key, min, max, v
        ))),
        other => Err(invalid(format!("{} must be an integer, got {:?}", key, other))),
    }
}

impl MoveParams {
    /// Validate a client parameter map. Unknown keys are rejected.
    pub fn parse(params: Option<&Params>) -> Result<Self, RequestError> {
        let mut parsed = Self::default();
        let Some(params) = params else {
            return Ok(parsed);
        };
        for (key, value) in params {
            match key.as_str() {
                "repeat" => parsed.repeat = int_in_range(key, value, 1, MAX_REPEAT)?,
                "delay_frames" => {
                    parsed.delay_frames = int_in_range(key, value, 0, MAX_DELAY_FRAMES)?
                }
                _ => return Err(invalid(format!("unknown parameter '{}'", key))),
            }
        }
        Ok(parsed)
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Timeline of `mv` reshaped by these parameters
    pub fn apply(&self, mv: &Move) -> Result<Move, RequestError> {
        if self.is_default() {
            return Ok(mv.clone());
        }
        let period = mv.frame_length();
        let mut steps = Vec::with_capacity(mv.steps().len() * self.repeat as usize);
        for repetition in 0..self.repeat {
            let offset = period
                .checked_mul(repetition)
                .and_then(|o| o.checked_add(self.delay_frames))
                .ok_or_else(|| invalid("timeline too long for requested repeat".to_string()))?;
            for step in mv.steps() {
                let frame = step
                    .frame
                    .checked_add(offset)
                    .ok_or_else(|| invalid("timeline too long for requested repeat".to_string()))?;
                steps.push(ActionStep::new(frame, step.action));
            }
        }
        Ok(Move::new(mv.name(), steps))
    }
}
