//! One running move: timeline position and held-input bookkeeping
//!
//! The timeline is anchored on `start`: a step at offset `k` is due once
//! `floor((now - start) / Δ) >= k`. A late wake-up therefore emits the whole
//! backlog at once instead of shifting the rest of the move later.

use crate::core::types::{Action, AxisId, ButtonId, RequestId};
use crate::moves::Move;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct MoveExecution {
    request_id: RequestId,
    timeline: Arc<Move>,
    start: Instant,
    frame: Duration,
    next_step: usize,
    /// Buttons pressed by this move and not yet released
    held: BTreeSet<ButtonId>,
    /// Axes moved off center by this move
    moved: BTreeSet<AxisId>,
}

impl MoveExecution {
    pub fn start(request_id: RequestId, timeline: Arc<Move>, frame: Duration, now: Instant) -> Self {
        Self {
            request_id,
            timeline,
            start: now,
            frame,
            next_step: 0,
            held: BTreeSet::new(),
            moved: BTreeSet::new(),
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn move_name(&self) -> &str {
        self.timeline.name()
    }

    pub fn started_at(&self) -> Instant {
        self.start
    }

    /// Whole frames elapsed since start
    pub fn elapsed_frames(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.start).as_nanos();
        let frame = self.frame.as_nanos().max(1);
        (elapsed / frame) as u64
    }

    /// Consume every step due at `now`, in definition order
    pub fn advance(&mut self, now: Instant) -> Vec<Action> {
        let elapsed = self.elapsed_frames(now);
        let timeline = Arc::clone(&self.timeline);
        let mut due = Vec::new();
        while let Some(&step) = timeline.steps().get(self.next_step) {
            if u64::from(step.frame) > elapsed {
                break;
            }
            self.track(&step.action);
            due.push(step.action);
            self.next_step += 1;
        }
        due
    }

    fn track(&mut self, action: &Action) {
        match *action {
            Action::SetButton {
                button,
                pressed: true,
            } => {
                self.held.insert(button);
            }
            Action::SetButton {
                button,
                pressed: false,
            } => {
                self.held.remove(&button);
            }
            Action::SetAxis { axis, value } if value.is_neutral() => {
                self.moved.remove(&axis);
            }
            Action::SetAxis { axis, .. } => {
                self.moved.insert(axis);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.next_step >= self.timeline.steps().len()
    }

    /// When the next step becomes due, or `None` if the timeline is exhausted
    pub fn next_due_at(&self) -> Option<Instant> {
        let step = self.timeline.steps().get(self.next_step)?;
        Some(self.start + self.frame * step.frame)
    }

    /// Actions returning everything this move touched to rest
    pub fn release_actions(&self) -> Vec<Action> {
        self.held
            .iter()
            .map(|&button| Action::release(button))
            .chain(self.moved.iter().map(|&axis| Action::center(axis)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    fn timeline() -> Arc<Move> {
        Arc::new(
            Move::builder("abc")
                .press(0, ButtonId::South)
                .press(4, ButtonId::East)
                .press(8, ButtonId::North)
                .build(),
        )
    }

    #[test]
    fn test_elapsed_frames_floor() {
        let t0 = Instant::now();
        let exec = MoveExecution::start(1, timeline(), FRAME, t0);
        assert_eq!(exec.elapsed_frames(t0), 0);
        assert_eq!(exec.elapsed_frames(t0 + Duration::from_millis(15)), 0);
        assert_eq!(exec.elapsed_frames(t0 + Duration::from_millis(16)), 1);
        assert_eq!(exec.elapsed_frames(t0 + Duration::from_millis(63)), 3);
    }

    #[test]
    fn test_late_wakeups_catch_up_in_order() {
        let t0 = Instant::now();
        let mut exec = MoveExecution::start(1, timeline(), FRAME, t0);

        // First wake-up delayed 3 frames: only the frame-0 step is due
        assert_eq!(exec.advance(t0 + FRAME * 3), vec![Action::press(ButtonId::South)]);
        assert_eq!(exec.next_due_at(), Some(t0 + FRAME * 4));

        // Next wake-up past both remaining offsets: backlog emitted at once
        assert_eq!(
            exec.advance(t0 + FRAME * 9),
            vec![Action::press(ButtonId::East), Action::press(ButtonId::North)]
        );
        assert!(exec.is_finished());
        assert_eq!(exec.next_due_at(), None);
        assert!(exec.advance(t0 + FRAME * 20).is_empty());
    }

    #[test]
    fn test_same_frame_steps_keep_definition_order() {
        let mv = Arc::new(
            Move::builder("combo")
                .press(2, ButtonId::R1)
                .press(2, ButtonId::West)
                .axis(2, AxisId::LeftX, -1.0)
                .build(),
        );
        let t0 = Instant::now();
        let mut exec = MoveExecution::start(7, mv, FRAME, t0);
        assert!(exec.advance(t0 + FRAME).is_empty());
        assert_eq!(
            exec.advance(t0 + FRAME * 2),
            vec![
                Action::press(ButtonId::R1),
                Action::press(ButtonId::West),
                Action::axis(AxisId::LeftX, -1.0),
            ]
        );
    }

    #[test]
    fn test_release_actions_cover_held_inputs() {
        let mv = Arc::new(
            Move::builder("partial")
                .press(0, ButtonId::South)
                .press(0, ButtonId::R1)
                .axis(0, AxisId::LeftX, 1.0)
                .axis(0, AxisId::LeftY, 0.5)
                .release(1, ButtonId::R1)
                .center(1, AxisId::LeftY)
                .release(10, ButtonId::South)
                .build(),
        );
        let t0 = Instant::now();
        let mut exec = MoveExecution::start(1, mv, FRAME, t0);
        exec.advance(t0 + FRAME);

        assert_eq!(
            exec.release_actions(),
            vec![
                Action::release(ButtonId::South),
                Action::center(AxisId::LeftX),
            ]
        );
    }
}
