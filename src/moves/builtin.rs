//! Built-in moves
//!
//! Frame offsets assume a 60 Hz frame clock. Directions follow evdev
//! conventions: negative X is left, negative Y is up.

use super::Move;
use crate::core::types::{AxisId, AxisStep, ButtonId};

/// Every built-in move, registered before config-defined moves
pub fn moves() -> Vec<Move> {
    vec![
        Move::builder("jump").tap(0, ButtonId::South, 4).build(),
        Move::builder("short_hop").tap(0, ButtonId::South, 2).build(),
        Move::builder("crouch")
            .axis(0, AxisId::LeftY, 1.0)
            .center(12, AxisId::LeftY)
            .build(),
        Move::builder("dash_left")
            .axis(0, AxisId::LeftX, -1.0)
            .center(8, AxisId::LeftX)
            .build(),
        Move::builder("dash_right")
            .axis(0, AxisId::LeftX, 1.0)
            .center(8, AxisId::LeftX)
            .build(),
        Move::builder("attack").tap(0, ButtonId::West, 3).build(),
        Move::builder("special").tap(0, ButtonId::East, 3).build(),
        Move::builder("shield")
            .axis(0, AxisId::RightTrigger, 1.0)
            .axis(20, AxisId::RightTrigger, 0.0)
            .build(),
        Move::builder("grab")
            .press(0, ButtonId::R1)
            .press(0, ButtonId::West)
            .release(3, ButtonId::West)
            .release(3, ButtonId::R1)
            .build(),
        Move::builder("walk_left")
            .axis(0, AxisId::LeftX, -0.5)
            .center(30, AxisId::LeftX)
            .build(),
        Move::builder("walk_right")
            .axis(0, AxisId::LeftX, 0.5)
            .center(30, AxisId::LeftX)
            .build(),
        Move::builder("dpad_up")
            .hat(0, AxisId::HatY, AxisStep::Negative)
            .center(4, AxisId::HatY)
            .build(),
        Move::builder("dpad_down")
            .hat(0, AxisId::HatY, AxisStep::Positive)
            .center(4, AxisId::HatY)
            .build(),
        Move::builder("pause").tap(0, ButtonId::Start, 2).build(),
        neutral(),
    ]
}

/// Release every button and recenter every axis in a single frame
fn neutral() -> Move {
    let mut builder = Move::builder("neutral");
    for button in ButtonId::ALL {
        builder = builder.release(0, button);
    }
    for axis in AxisId::ALL {
        builder = builder.center(0, axis);
    }
    builder.build()
}
