//! Mock physical controller with simulated hot-plug

use crate::core::physical::{PhysicalController, PhysicalError, PhysicalSource};
use crate::core::types::Action;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[derive(Default)]
struct PlugState {
    /// Sender of the currently plugged-in controller; `None` while unplugged
    tx: Option<Sender<Action>>,
    /// Receiver waiting to be handed out by the next `open`
    rx: Option<Receiver<Action>>,
}

#[derive(Default)]
struct MockPhysicalShared {
    plug: Mutex<PlugState>,
    opens: AtomicU32,
}

/// Mock source of a physical controller
pub struct MockPhysicalSource {
    shared: Arc<MockPhysicalShared>,
}

/// Test-side handle: press buttons, unplug, replug
#[derive(Clone)]
pub struct MockPhysicalMonitor {
    shared: Arc<MockPhysicalShared>,
}

impl MockPhysicalSource {
    /// Create a source whose controller starts plugged in
    pub fn new() -> (Self, MockPhysicalMonitor) {
        let shared = Arc::new(MockPhysicalShared::default());
        let monitor = MockPhysicalMonitor {
            shared: Arc::clone(&shared),
        };
        monitor.plug();
        (Self { shared }, monitor)
    }
}

impl PhysicalSource for MockPhysicalSource {
    fn describe(&self) -> String {
        "mock physical controller".to_string()
    }

    fn open(&mut self) -> Result<Box<dyn PhysicalController>, PhysicalError> {
        let rx = self
            .shared
            .plug
            .lock()
            .rx
            .take()
            .ok_or_else(|| PhysicalError::NotFound("mock controller unplugged".to_string()))?;
        self.shared.opens.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MockPhysicalController { rx }))
    }
}

struct MockPhysicalController {
    rx: Receiver<Action>,
}

impl PhysicalController for MockPhysicalController {
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

impl MockPhysicalMonitor {
    /// Send an input from the physical controller. Returns false if unplugged.
    pub fn send(&self, action: Action) -> bool {
        match &self.shared.plug.lock().tx {
            Some(tx) => tx.send(action).is_ok(),
            None => false,
        }
    }

    /// Pull the cable: the open controller reports `Disconnected` after
    /// draining what was already sent, and `open` fails until [`plug`](Self::plug).
    pub fn unplug(&self) {
        let mut plug = self.shared.plug.lock();
        plug.tx = None;
        plug.rx = None;
    }

    /// Insert a fresh controller
    pub fn plug(&self) {
        let (tx, rx) = unbounded();
        let mut plug = self.shared.plug.lock();
        plug.tx = Some(tx);
        plug.rx = Some(rx);
    }

    /// Number of successful opens (1 + reconnects)
    pub fn open_count(&self) -> u32 {
        self.shared.opens.load(Ordering::Relaxed)
    }
}
