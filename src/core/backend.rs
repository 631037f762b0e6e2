//! Virtual device backend trait and the owning [`DeviceHandle`]

use crate::core::types::Action;

/// Errors raised by a virtual device backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The virtual device node was removed underneath us
    #[error("virtual device disconnected")]
    Disconnected,

    /// Device creation failed (permissions, missing uinput module, ...)
    #[error("device creation failed: {0}")]
    CreateFailed(String),

    /// A write to the device node failed
    #[error("device write failed: {0}")]
    WriteFailed(String),

    /// Emit attempted on a destroyed or never-created device
    #[error("virtual device not created")]
    NotCreated,
}

/// Host facility used to emulate an input device.
///
/// Implementations must keep `emit` non-blocking on the common path (a
/// buffered write to the device node).
pub trait DeviceBackend: Send {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Create the virtual gamepad
    fn create(&mut self) -> Result<(), DeviceError>;

    /// Emit one action and flush it to consumers
    fn emit(&mut self, action: &Action) -> Result<(), DeviceError>;

    /// Remove the virtual gamepad. Must be safe to call more than once.
    fn destroy(&mut self);
}

/// Owns the lifetime of the virtual device.
///
/// Created once at daemon startup; the device is destroyed when the handle is
/// dropped, so every exit path (including unwinding) releases it.
pub struct DeviceHandle {
    backend: Box<dyn DeviceBackend>,
    live: bool,
}

impl DeviceHandle {
    /// Create the virtual device and take ownership of it
    pub fn create(mut backend: Box<dyn DeviceBackend>) -> Result<Self, DeviceError> {
        backend.create()?;
        log::info!("Virtual device created ({})", backend.name());
        Ok(Self {
            backend,
            live: true,
        })
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Emit an action on the virtual device
    pub fn emit(&mut self, action: &Action) -> Result<(), DeviceError> {
        if !self.live {
            return Err(DeviceError::NotCreated);
        }
        self.backend.emit(action)
    }

    /// Tear down and create the virtual device again after a failure
    pub fn recreate(&mut self) -> Result<(), DeviceError> {
        self.backend.destroy();
        self.live = false;
        self.backend.create()?;
        self.live = true;
        log::info!("Virtual device recreated ({})", self.backend.name());
        Ok(())
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        if self.live {
            self.backend.destroy();
            self.live = false;
            log::info!("Virtual device destroyed ({})", self.backend.name());
        }
    }
}
