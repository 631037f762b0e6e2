//! Mapping between gamepad identifiers and Linux input event codes
//!
//! Raw value ranges advertised by the virtual device:
//!
//! | Axis kind | Codes | Range |
//! |-----------|-------|-------|
//! | Sticks | `ABS_X/Y`, `ABS_RX/RY` | -32768..=32767 |
//! | Triggers | `ABS_Z`, `ABS_RZ` | 0..=255 |
//! | D-pad | `ABS_HAT0X/Y` | -1..=1 |

use crate::core::types::{AxisId, AxisStep, AxisValue, ButtonId};
use evdev::{AbsoluteAxisType, Key};

pub const STICK_MIN: i32 = -32768;
pub const STICK_MAX: i32 = 32767;
pub const TRIGGER_MAX: i32 = 255;

pub fn button_key(button: ButtonId) -> Key {
    match button {
        ButtonId::South => Key::BTN_SOUTH,
        ButtonId::East => Key::BTN_EAST,
        ButtonId::North => Key::BTN_NORTH,
        ButtonId::West => Key::BTN_WEST,
        ButtonId::L1 => Key::BTN_TL,
        ButtonId::R1 => Key::BTN_TR,
        ButtonId::L2 => Key::BTN_TL2,
        ButtonId::R2 => Key::BTN_TR2,
        ButtonId::Select => Key::BTN_SELECT,
        ButtonId::Start => Key::BTN_START,
        ButtonId::Mode => Key::BTN_MODE,
        ButtonId::ThumbL => Key::BTN_THUMBL,
        ButtonId::ThumbR => Key::BTN_THUMBR,
    }
}

pub fn key_button(key: Key) -> Option<ButtonId> {
    ButtonId::ALL.into_iter().find(|b| button_key(*b) == key)
}

pub fn axis_code(axis: AxisId) -> AbsoluteAxisType {
    match axis {
        AxisId::LeftX => AbsoluteAxisType::ABS_X,
        AxisId::LeftY => AbsoluteAxisType::ABS_Y,
        AxisId::RightX => AbsoluteAxisType::ABS_RX,
        AxisId::RightY => AbsoluteAxisType::ABS_RY,
        AxisId::LeftTrigger => AbsoluteAxisType::ABS_Z,
        AxisId::RightTrigger => AbsoluteAxisType::ABS_RZ,
        AxisId::HatX => AbsoluteAxisType::ABS_HAT0X,
        AxisId::HatY => AbsoluteAxisType::ABS_HAT0Y,
    }
}

pub fn code_axis(code: AbsoluteAxisType) -> Option<AxisId> {
    AxisId::ALL.into_iter().find(|a| axis_code(*a) == code)
}

/// Raw (min, max) advertised for an axis
pub fn raw_range(axis: AxisId) -> (i32, i32) {
    if axis.is_hat() {
        (-1, 1)
    } else if axis.is_trigger() {
        (0, TRIGGER_MAX)
    } else {
        (STICK_MIN, STICK_MAX)
    }
}

/// Normalized value to the raw value written to the virtual device
pub fn to_raw(axis: AxisId, value: AxisValue) -> i32 {
    if axis.is_hat() {
        return match value.step() {
            AxisStep::Negative => -1,
            AxisStep::Center => 0,
            AxisStep::Positive => 1,
        };
    }
    let (min, max) = axis.range();
    let v = value.normalized().clamp(min, max);
    if axis.is_trigger() {
        (v * TRIGGER_MAX as f32).round() as i32
    } else if v >= 0.0 {
        (v * STICK_MAX as f32).round() as i32
    } else {
        (-v * STICK_MIN as f32).round() as i32
    }
}

/// Raw value read from a physical device (with its own advertised range) to
/// a normalized value
pub fn normalize(axis: AxisId, raw: i32, min: i32, max: i32) -> AxisValue {
    if axis.is_hat() {
        return AxisValue::Step(match raw.signum() {
            -1 => AxisStep::Negative,
            1 => AxisStep::Positive,
            _ => AxisStep::Center,
        });
    }
    if max <= min {
        return AxisValue::Analog(0.0);
    }
    // Advertised ranges can span the whole i32 domain
    let span = i64::from(max) - i64::from(min);
    let offset = i64::from(raw) - i64::from(min);
    let unit = (offset as f64 / span as f64).clamp(0.0, 1.0) as f32;
    if axis.is_trigger() {
        AxisValue::Analog(unit)
    } else {
        AxisValue::Analog(unit * 2.0 - 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_codes_round_trip() {
        for button in ButtonId::ALL {
            assert_eq!(key_button(button_key(button)), Some(button));
        }
        assert_eq!(key_button(Key::KEY_A), None);
    }

    #[test]
    fn test_stick_scaling() {
        assert_eq!(to_raw(AxisId::LeftX, AxisValue::Analog(1.0)), STICK_MAX);
        assert_eq!(to_raw(AxisId::LeftX, AxisValue::Analog(-1.0)), STICK_MIN);
        assert_eq!(to_raw(AxisId::LeftX, AxisValue::Analog(0.0)), 0);
        assert_eq!(to_raw(AxisId::RightTrigger, AxisValue::Analog(1.0)), 255);
        assert_eq!(
            to_raw(AxisId::HatY, AxisValue::Step(AxisStep::Negative)),
            -1
        );
    }

    #[test]
    fn test_full_i32_range_does_not_overflow() {
        assert_eq!(
            normalize(AxisId::LeftX, i32::MAX, i32::MIN, i32::MAX),
            AxisValue::Analog(1.0)
        );
        assert_eq!(
            normalize(AxisId::LeftX, i32::MIN, i32::MIN, i32::MAX),
            AxisValue::Analog(-1.0)
        );
        assert_eq!(
            normalize(AxisId::RightTrigger, i32::MAX, i32::MIN, i32::MAX),
            AxisValue::Analog(1.0)
        );
    }

    #[test]
    fn test_physical_normalization() {
        assert_eq!(
            normalize(AxisId::LeftX, 0, 0, 255),
            AxisValue::Analog(-1.0)
        );
        assert_eq!(
            normalize(AxisId::LeftTrigger, 255, 0, 255),
            AxisValue::Analog(1.0)
        );
        assert_eq!(
            normalize(AxisId::HatX, 1, -1, 1),
            AxisValue::Step(AxisStep::Positive)
        );
        assert_eq!(normalize(AxisId::LeftY, 5, 5, 5), AxisValue::Analog(0.0));
    }
}
