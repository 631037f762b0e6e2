//! Mock devices for hardware-free operation and testing
//!
//! | Component | Simulation |
//! |-----------|------------|
//! | Virtual gamepad | Records every emitted action with timestamp and emitting thread |
//! | Physical controller | Channel-fed action stream that can be unplugged and replugged |
//!
//! Selecting `backend = "mock"` in the config runs the daemon against
//! [`MockBackend`], which logs actions instead of touching `/dev/uinput`.
//!
//! Every recorded action carries the name of the thread that emitted it. The
//! daemon names its threads (`scheduler`, `passthrough`), which lets tests
//! check write provenance without widening the backend interface.

mod physical;

pub use physical::{MockPhysicalMonitor, MockPhysicalSource};

use crate::core::backend::{DeviceBackend, DeviceError};
use crate::core::types::Action;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// One action observed by the mock virtual device
#[derive(Debug, Clone)]
pub struct EmittedAction {
    pub action: Action,
    pub at: Instant,
    /// Name of the emitting thread
    pub thread: Option<String>,
}

impl EmittedAction {
    /// True if emitted from a thread with the given name
    pub fn from_thread(&self, name: &str) -> bool {
        self.thread.as_deref() == Some(name)
    }
}

#[derive(Default)]
struct MockShared {
    emitted: Mutex<Vec<EmittedAction>>,
    disconnected: AtomicBool,
    destroyed: AtomicBool,
    creates: AtomicU32,
    /// One-shot stall applied before the next emit (host starvation)
    stall: Mutex<Option<Duration>>,
}

/// Mock virtual gamepad
pub struct MockBackend {
    shared: Arc<MockShared>,
    created: bool,
}

/// Test-side view of a [`MockBackend`]
#[derive(Clone)]
pub struct MockDeviceMonitor {
    shared: Arc<MockShared>,
}

impl MockBackend {
    /// Create a mock backend and the monitor that observes it
    pub fn new() -> (Self, MockDeviceMonitor) {
        let shared = Arc::new(MockShared::default());
        (
            Self {
                shared: Arc::clone(&shared),
                created: false,
            },
            MockDeviceMonitor { shared },
        )
    }
}

impl DeviceBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn create(&mut self) -> Result<(), DeviceError> {
        if self.shared.disconnected.load(Ordering::Relaxed) {
            return Err(DeviceError::CreateFailed(
                "mock device node unavailable".to_string(),
            ));
        }
        self.created = true;
        self.shared.destroyed.store(false, Ordering::Relaxed);
        self.shared.creates.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn emit(&mut self, action: &Action) -> Result<(), DeviceError> {
        if !self.created {
            return Err(DeviceError::NotCreated);
        }
        if self.shared.disconnected.load(Ordering::Relaxed) {
            return Err(DeviceError::Disconnected);
        }
        if let Some(stall) = self.shared.stall.lock().take() {
            thread::sleep(stall);
        }
        log::debug!("mock emit: {:?}", action);
        self.shared.emitted.lock().push(EmittedAction {
            action: *action,
            at: Instant::now(),
            thread: thread::current().name().map(str::to_string),
        });
        Ok(())
    }

    fn destroy(&mut self) {
        if self.created {
            self.created = false;
            self.shared.destroyed.store(true, Ordering::Relaxed);
        }
    }
}

impl MockDeviceMonitor {
    /// Snapshot of every action emitted so far
    pub fn emitted(&self) -> Vec<EmittedAction> {
        self.shared.emitted.lock().clone()
    }

    /// Just the actions, in emission order
    pub fn actions(&self) -> Vec<Action> {
        self.shared.emitted.lock().iter().map(|e| e.action).collect()
    }

    pub fn clear(&self) {
        self.shared.emitted.lock().clear();
    }

    /// Simulate the virtual device node disappearing (or coming back)
    pub fn set_disconnected(&self, disconnected: bool) {
        self.shared
            .disconnected
            .store(disconnected, Ordering::Relaxed);
    }

    /// Stall the next emit call for `duration`
    pub fn stall_next_emit(&self, duration: Duration) {
        *self.shared.stall.lock() = Some(duration);
    }

    pub fn create_count(&self) -> u32 {
        self.shared.creates.load(Ordering::Relaxed)
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::Relaxed)
    }
}
