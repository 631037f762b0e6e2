//! evdev reader for the physical controller
//!
//! evdev reads block with no timeout, so each opened device gets a detached
//! reader thread that forwards translated actions over a crossbeam channel.
//! The passthrough thread waits on the channel with a timeout and sees
//! `Disconnected` once the reader exits (device removed, read error).
//!
//! A reader blocked on an idle controller cannot be woken. Dropping the
//! controller detaches it; it exits on the next input event (its send fails)
//! or when the process exits, which closes the fd.

use super::codes;
use crate::core::physical::{PhysicalController, PhysicalError, PhysicalSource};
use crate::core::types::{Action, AxisId, ButtonId};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use evdev::{Device, InputEventKind};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Physical controller at a fixed `/dev/input/...` path
pub struct EvdevSource {
    path: PathBuf,
}

impl EvdevSource {
    pub fn new(path: &str) -> Self {
        Self {
            path: PathBuf::from(path),
        }
    }
}

impl PhysicalSource for EvdevSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&mut self) -> Result<Box<dyn PhysicalController>, PhysicalError> {
        let device = Device::open(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PhysicalError::NotFound(self.describe()),
            _ => PhysicalError::Io(e),
        })?;

        // Physical axes advertise their own ranges; capture them for normalization
        let abs_state = device.get_abs_state()?;
        let mut ranges = Vec::new();
        let mut initial = Vec::new();
        for axis in AxisId::ALL {
            let idx = codes::axis_code(axis).0 as usize;
            if let Some(info) = abs_state.get(idx) {
                ranges.push((axis, info.minimum, info.maximum));
                let value = codes::normalize(axis, info.value, info.minimum, info.maximum);
                if !value.is_neutral() {
                    initial.push(Action::SetAxis { axis, value });
                }
            }
        }

        // Inputs already held when the controller is opened
        let keys = device.get_key_state()?;
        for button in ButtonId::ALL {
            if keys.contains(codes::button_key(button)) {
                initial.push(Action::press(button));
            }
        }

        log::info!(
            "Opened physical controller '{}' at {}",
            device.name().unwrap_or("unnamed"),
            self.describe()
        );

        let (tx, rx) = unbounded();
        for action in initial {
            let _ = tx.send(action);
        }
        let reader = thread::Builder::new()
            .name("evdev-reader".to_string())
            .spawn(move || reader_loop(device, ranges, tx))?;

        Ok(Box::new(EvdevController {
            rx,
            reader: Some(reader),
        }))
    }
}

fn reader_loop(mut device: Device, ranges: Vec<(AxisId, i32, i32)>, tx: Sender<Action>) {
    loop {
        let events = match device.fetch_events() {
            Ok(events) => events,
            Err(e) => {
                log::debug!("evdev read ended: {}", e);
                return;
            }
        };
        for event in events {
            let action = match event.kind() {
                InputEventKind::Key(key) => codes::key_button(key).map(|button| {
                    Action::SetButton {
                        button,
                        pressed: event.value() != 0,
                    }
                }),
                InputEventKind::AbsAxis(code) => codes::code_axis(code).and_then(|axis| {
                    ranges
                        .iter()
                        .find(|(a, _, _)| *a == axis)
                        .map(|&(_, min, max)| Action::SetAxis {
                            axis,
                            value: codes::normalize(axis, event.value(), min, max),
                        })
                }),
                _ => None,
            };
            let Some(action) = action else {
                continue;
            };
            if tx.send(action).is_err() {
                // Passthrough dropped the controller
                return;
            }
        }
    }
}

struct EvdevController {
    rx: Receiver<Action>,
    reader: Option<JoinHandle<()>>,
}

impl Drop for EvdevController {
    fn drop(&mut self) {
        let Some(reader) = self.reader.take() else {
            return;
        };
        if reader.is_finished() {
            let _ = reader.join();
        } else {
            log::debug!("evdev reader still blocked, detaching");
        }
    }
}

impl PhysicalController for EvdevController {
    fn read_actions(&mut self, timeout: Duration) -> Result<Vec<Action>, PhysicalError> {
        let first = match self.rx.recv_timeout(timeout) {
            Ok(action) => action,
            Err(RecvTimeoutError::Timeout) => return Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => return Err(PhysicalError::Disconnected),
        };
        let mut actions = vec![first];
        actions.extend(self.rx.try_iter());
        Ok(actions)
    }
}
