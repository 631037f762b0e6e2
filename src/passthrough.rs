//! Physical controller passthrough
//!
//! Mirrors the physical controller onto the virtual device whenever the
//! scheduler is idle. While a move runs, the arbiter drops these writes but
//! keeps tracking the controller's state, which is replayed when the move
//! ends.
//!
//! # Hot-plug
//!
//! ```text
//!   open ok ──▶ forward until Disconnected ──▶ open again
//!      ▲                                          │ fails
//!      └──── sleep(backoff: 100ms, 200ms, ... max) ◀┘
//! ```
//!
//! Retries continue indefinitely. Nothing is emitted while the controller is
//! absent, and the backoff resets after every successful open.

use crate::config::PassthroughConfig;
use crate::core::arbiter::{EmitOutcome, SharedDevice, Writer};
use crate::core::physical::{PhysicalController, PhysicalSource};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Granularity of interruptible sleeps
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Exponential backoff with a ceiling
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn from_config(config: &PassthroughConfig) -> Self {
        Self::new(
            Duration::from_millis(config.backoff_initial_ms),
            Duration::from_millis(config.backoff_max_ms),
        )
    }

    /// Delay to wait now; the following one doubles up to the ceiling
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Passthrough counters, shared with `Health`
#[derive(Debug, Default)]
pub struct PassthroughStatus {
    connected: AtomicBool,
    connects: AtomicU64,
    forwarded: AtomicU64,
}

impl PassthroughStatus {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Successful opens since startup
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Actions that reached the virtual device
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }
}

pub struct Passthrough {
    source: Box<dyn PhysicalSource>,
    device: Arc<SharedDevice>,
    status: Arc<PassthroughStatus>,
    running: Arc<AtomicBool>,
    backoff: Backoff,
    read_timeout: Duration,
}

impl Passthrough {
    pub fn new(
        source: Box<dyn PhysicalSource>,
        device: Arc<SharedDevice>,
        config: &PassthroughConfig,
    ) -> Self {
        Self {
            source,
            device,
            status: Arc::new(PassthroughStatus::default()),
            running: Arc::new(AtomicBool::new(true)),
            backoff: Backoff::from_config(config),
            read_timeout: Duration::from_millis(config.read_timeout_ms),
        }
    }

    pub fn status(&self) -> Arc<PassthroughStatus> {
        Arc::clone(&self.status)
    }

    pub fn spawn(self) -> io::Result<PassthroughThread> {
        let running = Arc::clone(&self.running);
        let handle = thread::Builder::new()
            .name("passthrough".into())
            .spawn(move || self.run())?;
        Ok(PassthroughThread { handle, running })
    }

    fn run(mut self) {
        log::info!("Passthrough started ({})", self.source.describe());
        let mut reported_missing = false;

        while self.running.load(Ordering::Relaxed) {
            match self.source.open() {
                Ok(controller) => {
                    self.backoff.reset();
                    reported_missing = false;
                    self.status.connected.store(true, Ordering::Relaxed);
                    self.status.connects.fetch_add(1, Ordering::Relaxed);
                    log::info!("Physical controller connected");

                    self.forward(controller);

                    self.status.connected.store(false, Ordering::Relaxed);
                }
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    if reported_missing {
                        log::debug!("Physical controller unavailable: {} (retry in {:?})", e, delay);
                    } else {
                        log::warn!("Physical controller unavailable: {} (retrying)", e);
                        reported_missing = true;
                    }
                    self.sleep(delay);
                }
            }
        }
        log::info!("Passthrough stopped");
    }

    /// Mirror the controller until it disconnects or shutdown
    fn forward(&mut self, mut controller: Box<dyn PhysicalController>) {
        while self.running.load(Ordering::Relaxed) {
            let actions = match controller.read_actions(self.read_timeout) {
                Ok(actions) => actions,
                Err(e) => {
                    log::warn!("Physical controller lost: {}", e);
                    self.device.reset_physical();
                    return;
                }
            };
            for action in actions {
                match self.device.emit(Writer::Passthrough, &action) {
                    Ok(EmitOutcome::Emitted) => {
                        self.status.forwarded.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(EmitOutcome::Suppressed) => {}
                    // The scheduler thread drives device recovery
                    Err(e) => log::debug!("Passthrough write failed: {}", e),
                }
            }
            // Inputs changed during a move are replayed once the move ends
            match self.device.resync_passthrough() {
                Ok(0) => {}
                Ok(n) => {
                    self.status.forwarded.fetch_add(n as u64, Ordering::Relaxed);
                }
                Err(e) => log::debug!("Passthrough resync failed: {}", e),
            }
        }
    }

    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.running.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

/// Handle to the running passthrough thread
pub struct PassthroughThread {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl PassthroughThread {
    /// Signal the thread and wait for it to exit
    pub fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        if let Err(e) = self.handle.join() {
            log::error!("Passthrough thread panicked: {:?}", e);
        }
    }
}
