//! Write arbitration for the shared virtual device.
//!
//! The virtual device is the single shared mutable resource in the daemon.
//! Exactly one writer is authorized at a time:
//!
//! ```text
//! ┌────────────────────┐  move starts  ┌──────────────────┐
//! │ Owner: Passthrough │ ────────────▶ │ Owner: Scheduler │
//! │ (scheduler idle)   │ ◀──────────── │ (move running)   │
//! └────────────────────┘   move ends   └──────────────────┘
//! ```
//!
//! The owner flag lives behind the same lock that serializes device writes, so
//! an ownership change can never interleave with an in-progress write. Writes
//! from a non-owner are dropped, not queued.
//!
//! # Physical state mirror
//!
//! Passthrough writes always update the mirrored physical state, even while
//! suppressed. When the scheduler hands the device back, the next
//! [`SharedDevice::resync_passthrough`] emits whatever differs between that
//! state and what the virtual device currently shows, so inputs the human
//! changed during a move are not lost.

use crate::core::backend::{DeviceError, DeviceHandle};
use crate::core::types::{Action, AxisId, AxisValue, ButtonId};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Who is issuing a device write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Writer {
    Scheduler,
    Passthrough,
}

/// Result of an arbitrated emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Emitted,
    /// Writer does not currently own the device; action dropped
    Suppressed,
}

/// Button and axis positions. Missing entries are at rest.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InputState {
    buttons: BTreeMap<ButtonId, bool>,
    axes: BTreeMap<AxisId, AxisValue>,
}

impl InputState {
    pub fn apply(&mut self, action: &Action) {
        match *action {
            Action::SetButton { button, pressed } => {
                self.buttons.insert(button, pressed);
            }
            Action::SetAxis { axis, value } => {
                self.axes.insert(axis, value);
            }
        }
    }

    pub fn is_pressed(&self, button: ButtonId) -> bool {
        self.buttons.get(&button).copied().unwrap_or(false)
    }

    /// Normalized axis position (0.0 at rest)
    pub fn axis(&self, axis: AxisId) -> f32 {
        self.axes.get(&axis).map_or(0.0, |v| v.normalized())
    }

    pub fn clear(&mut self) {
        self.buttons.clear();
        self.axes.clear();
    }

    /// Actions that turn `current` into `self`
    pub fn diff_from(&self, current: &InputState) -> Vec<Action> {
        let mut actions = Vec::new();
        for button in ButtonId::ALL {
            let target = self.is_pressed(button);
            if target != current.is_pressed(button) {
                actions.push(Action::SetButton {
                    button,
                    pressed: target,
                });
            }
        }
        for axis in AxisId::ALL {
            if self.axis(axis) != current.axis(axis) {
                let action = match self.axes.get(&axis) {
                    Some(&value) => Action::SetAxis { axis, value },
                    None => Action::center(axis),
                };
                actions.push(action);
            }
        }
        actions
    }
}

struct ArbiterState {
    /// `None` once destroyed at shutdown
    handle: Option<DeviceHandle>,
    owner: Writer,
    /// Last device error while degraded
    degraded: Option<DeviceError>,
    /// Latest physical controller state, tracked while suppressed too
    physical: InputState,
    /// What the virtual device currently shows
    shown: InputState,
    /// Set when the scheduler hands the device back
    resync: bool,
}

/// Virtual device shared between the scheduler and passthrough threads
pub struct SharedDevice {
    state: Mutex<ArbiterState>,
}

impl SharedDevice {
    /// Wrap a live handle. Passthrough owns writes until a move starts.
    pub fn new(handle: DeviceHandle) -> Self {
        Self {
            state: Mutex::new(ArbiterState {
                handle: Some(handle),
                owner: Writer::Passthrough,
                degraded: None,
                physical: InputState::default(),
                shown: InputState::default(),
                resync: false,
            }),
        }
    }

    pub fn owner(&self) -> Writer {
        self.state.lock().owner
    }

    /// Transfer write ownership
    pub fn set_owner(&self, owner: Writer) {
        let mut state = self.state.lock();
        if state.owner != owner {
            log::debug!("Device owner: {:?} -> {:?}", state.owner, owner);
            state.owner = owner;
            state.resync = owner == Writer::Passthrough;
        }
    }

    /// Emit on behalf of `writer`, dropping the action if it is not the owner
    pub fn emit(&self, writer: Writer, action: &Action) -> Result<EmitOutcome, DeviceError> {
        let mut state = self.state.lock();
        if writer == Writer::Passthrough {
            state.physical.apply(action);
        }
        if state.owner != writer {
            log::trace!("Suppressed {:?} write: {:?}", writer, action);
            return Ok(EmitOutcome::Suppressed);
        }
        state.write(action)?;
        log::trace!("{:?} emitted {:?}", writer, action);
        Ok(EmitOutcome::Emitted)
    }

    /// Bring the virtual device back to the physical controller's state
    /// after a move. Returns the number of corrective actions emitted.
    pub fn resync_passthrough(&self) -> Result<usize, DeviceError> {
        let mut state = self.state.lock();
        if !state.resync || state.owner != Writer::Passthrough {
            return Ok(0);
        }
        let actions = state.physical.diff_from(&state.shown);
        for action in &actions {
            state.write(action)?;
        }
        state.resync = false;
        if !actions.is_empty() {
            log::debug!("Passthrough resync: {:?}", actions);
        }
        Ok(actions.len())
    }

    /// Forget the physical state (controller unplugged). Emits nothing.
    pub fn reset_physical(&self) {
        self.state.lock().physical.clear();
    }

    /// Snapshot of what the virtual device currently shows
    pub fn shown(&self) -> InputState {
        self.state.lock().shown.clone()
    }

    pub fn is_degraded(&self) -> bool {
        self.state.lock().degraded.is_some()
    }

    /// Last device error, if currently degraded
    pub fn last_error(&self) -> Option<DeviceError> {
        self.state.lock().degraded.clone()
    }

    /// Recreate the virtual device after a failure
    pub fn recover(&self) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        let Some(handle) = state.handle.as_mut() else {
            return Err(DeviceError::NotCreated);
        };
        match handle.recreate() {
            Ok(()) => {
                state.degraded = None;
                state.shown.clear();
                state.resync = true;
                log::info!("Virtual device recovered");
                Ok(())
            }
            Err(e) => {
                state.degraded = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Destroy the virtual device. Further emits return `NotCreated`.
    pub fn destroy(&self) {
        let handle = self.state.lock().handle.take();
        drop(handle);
    }
}

impl ArbiterState {
    fn write(&mut self, action: &Action) -> Result<(), DeviceError> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(DeviceError::NotCreated);
        };
        match handle.emit(action) {
            Ok(()) => {
                self.shown.apply(action);
                Ok(())
            }
            Err(e) => {
                if self.degraded.is_none() {
                    log::error!("Virtual device failed: {}", e);
                }
                self.degraded = Some(e.clone());
                Err(e)
            }
        }
    }
}
