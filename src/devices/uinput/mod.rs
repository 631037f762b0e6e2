//! Linux uinput virtual gamepad and evdev physical controller
//!
//! The virtual device advertises the standard gamepad layout (face buttons,
//! shoulders, triggers, two sticks, d-pad hat). To games and emulators it is
//! indistinguishable from a USB controller.
//!
//! Requires write access to `/dev/uinput` and read access to the physical
//! controller's `/dev/input/event*` node.

pub mod codes;
mod physical;

pub use physical::EvdevSource;

use crate::core::backend::{DeviceBackend, DeviceError};
use crate::core::types::{Action, AxisId, ButtonId};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AbsInfo, AttributeSet, BusType, EventType, InputEvent, InputId, Key, UinputAbsSetup};
use std::io;

/// USB ids reported by the virtual device (generic gamepad)
const VENDOR_ID: u16 = 0x1209;
const PRODUCT_ID: u16 = 0x5961;
const VERSION: u16 = 0x0100;

/// uinput-backed virtual gamepad
pub struct UinputBackend {
    name: String,
    device: Option<VirtualDevice>,
}

impl UinputBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            device: None,
        }
    }

    fn build(&self) -> io::Result<VirtualDevice> {
        let mut keys = AttributeSet::<Key>::new();
        for button in ButtonId::ALL {
            keys.insert(codes::button_key(button));
        }

        let mut builder = VirtualDeviceBuilder::new()?
            .name(&self.name)
            .input_id(InputId::new(BusType::BUS_USB, VENDOR_ID, PRODUCT_ID, VERSION))
            .with_keys(&keys)?;

        for axis in AxisId::ALL {
            let (min, max) = codes::raw_range(axis);
            let (fuzz, flat) = if axis.is_hat() || axis.is_trigger() {
                (0, 0)
            } else {
                (16, 128)
            };
            let setup = UinputAbsSetup::new(
                codes::axis_code(axis),
                AbsInfo::new(0, min, max, fuzz, flat, 0),
            );
            builder = builder.with_absolute_axis(&setup)?;
        }

        builder.build()
    }
}

impl DeviceBackend for UinputBackend {
    fn name(&self) -> &str {
        "uinput"
    }

    fn create(&mut self) -> Result<(), DeviceError> {
        let device = self
            .build()
            .map_err(|e| DeviceError::CreateFailed(e.to_string()))?;
        log::info!("uinput device '{}' created", self.name);
        self.device = Some(device);
        Ok(())
    }

    fn emit(&mut self, action: &Action) -> Result<(), DeviceError> {
        let device = self.device.as_mut().ok_or(DeviceError::NotCreated)?;
        let event = match *action {
            Action::SetButton { button, pressed } => InputEvent::new(
                EventType::KEY,
                codes::button_key(button).code(),
                i32::from(pressed),
            ),
            Action::SetAxis { axis, value } => InputEvent::new(
                EventType::ABSOLUTE,
                codes::axis_code(axis).0,
                codes::to_raw(axis, value),
            ),
        };
        // emit() appends SYN_REPORT so consumers see the change immediately
        device.emit(&[event]).map_err(|e| match e.raw_os_error() {
            Some(code) if code == ENODEV => DeviceError::Disconnected,
            _ => DeviceError::WriteFailed(e.to_string()),
        })
    }

    fn destroy(&mut self) {
        if self.device.take().is_some() {
            log::info!("uinput device '{}' removed", self.name);
        }
    }
}

/// "No such device" errno returned once a device node is gone
const ENODEV: i32 = 19;
