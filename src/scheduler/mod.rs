//! Action scheduler: frame-paced execution of queued moves
//!
//! # State machine
//!
//! ```text
//!         request taken               last step emitted
//!   Idle ───────────────▶ Running ─────────────────────▶ Completed
//!    ▲                       │                               │
//!    │                       │ cancel, interrupt,            │
//!    │                       │ timeout or device error       │
//!    │                       ▼                               │
//!    ├─────────────────── Cancelled                          │
//!    └───────────────────────────────────────────────────────┘
//! ```
//!
//! While Running the scheduler owns device writes and passthrough is
//! suppressed. Ownership is taken before the request is marked `Running` and
//! returned before it is marked terminal, so a client never observes
//! `Running` while passthrough may still write.
//!
//! # Timing
//!
//! Each iteration computes `floor((now - start) / Δ)`, emits every due step,
//! then sleeps on the queue's condvar until the next step is due. Cancels
//! notify the condvar, so they are observed without waiting out the sleep.

pub mod execution;
pub mod queue;

pub use execution::MoveExecution;
pub use queue::{
    NextRequest, PlanningQueue, QueueSnapshot, QueuedRequest, Rejection, RunningRequest,
};

use crate::config::TimingConfig;
use crate::core::arbiter::{SharedDevice, Writer};
use crate::core::backend::DeviceError;
use crate::core::types::{CancelReason, RequestStatus};
use crate::passthrough::Backoff;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long the idle scheduler waits for a request before re-checking the device
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Scheduler timing parameters
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Frame duration Δ
    pub frame: Duration,
    /// Force-cancel moves running longer than this
    pub max_move_duration: Option<Duration>,
    /// Delay between virtual device recovery attempts
    pub recovery: Backoff,
}

impl SchedulerConfig {
    pub fn from_timing(timing: &TimingConfig, recovery: Backoff) -> Self {
        Self {
            frame: timing.frame_duration(),
            max_move_duration: timing.max_move_duration(),
            recovery,
        }
    }
}

/// Executes requests from the planning queue one at a time
pub struct ActionScheduler {
    config: SchedulerConfig,
    queue: Arc<PlanningQueue>,
    device: Arc<SharedDevice>,
}

impl ActionScheduler {
    pub fn new(
        config: SchedulerConfig,
        queue: Arc<PlanningQueue>,
        device: Arc<SharedDevice>,
    ) -> Self {
        Self {
            config,
            queue,
            device,
        }
    }

    /// Run the scheduler on its own thread. It exits once the queue is closed.
    pub fn spawn(self) -> io::Result<SchedulerThread> {
        let handle = thread::Builder::new()
            .name("scheduler".into())
            .spawn(move || self.run())?;
        Ok(SchedulerThread { handle })
    }

    fn run(mut self) {
        log::info!(
            "Scheduler started (frame {:.2}ms)",
            self.config.frame.as_secs_f64() * 1000.0
        );

        loop {
            if self.device.is_degraded() {
                if self.recover_device() {
                    break;
                }
                continue;
            }

            match self.queue.wait_next(IDLE_POLL) {
                NextRequest::Start(request) => self.execute(request),
                NextRequest::Idle => {}
                NextRequest::Closed => break,
            }
        }

        self.device.set_owner(Writer::Passthrough);
        log::info!("Scheduler stopped");
    }

    /// One recovery attempt, then back off. Returns true if the queue closed
    /// while waiting.
    fn recover_device(&mut self) -> bool {
        match self.device.recover() {
            Ok(()) => {
                self.config.recovery.reset();
                false
            }
            Err(e) => {
                let delay = self.config.recovery.next_delay();
                log::warn!(
                    "Virtual device recovery failed: {} (retry in {:?})",
                    e,
                    delay
                );
                self.queue.wait_closed(Instant::now() + delay)
            }
        }
    }

    fn execute(&mut self, request: QueuedRequest) {
        let id = request.id;
        self.device.set_owner(Writer::Scheduler);
        self.queue.begin(id);

        let started = Instant::now();
        let mut execution = MoveExecution::start(id, request.timeline, self.config.frame, started);
        let timeout_at = self.config.max_move_duration.map(|limit| started + limit);
        log::info!("Request {} running '{}'", id, execution.move_name());

        let status = loop {
            if let Some(reason) = self.queue.take_cancel(id) {
                break self.cancel(&execution, reason);
            }

            let now = Instant::now();
            if timeout_at.is_some_and(|t| now >= t) {
                log::warn!(
                    "Request {} '{}' exceeded max move duration, cancelling",
                    id,
                    execution.move_name()
                );
                break self.cancel(&execution, CancelReason::Timeout);
            }

            if let Err(e) = self.emit_due(&mut execution, now) {
                log::error!("Request {} cancelled by device error: {}", id, e);
                break RequestStatus::Cancelled {
                    reason: CancelReason::DeviceError,
                };
            }

            let Some(next_due) = execution.next_due_at() else {
                break RequestStatus::Completed;
            };
            let wake_at = match timeout_at {
                Some(t) => next_due.min(t),
                None => next_due,
            };
            self.queue.wait_tick(id, wake_at);
        };

        log::info!(
            "Request {} '{}' finished after {:?}: {:?}",
            id,
            execution.move_name(),
            started.elapsed(),
            status
        );
        self.device.set_owner(Writer::Passthrough);
        self.queue.finish(id, status);
    }

    fn emit_due(&self, execution: &mut MoveExecution, now: Instant) -> Result<(), DeviceError> {
        for action in execution.advance(now) {
            self.device.emit(Writer::Scheduler, &action)?;
        }
        Ok(())
    }

    /// Return held inputs to rest and produce the cancelled status
    fn cancel(&self, execution: &MoveExecution, reason: CancelReason) -> RequestStatus {
        log::info!(
            "Request {} '{}' cancelled: {:?}",
            execution.request_id(),
            execution.move_name(),
            reason
        );
        for action in execution.release_actions() {
            if let Err(e) = self.device.emit(Writer::Scheduler, &action) {
                log::warn!("Failed to release {:?} after cancel: {}", action, e);
                break;
            }
        }
        RequestStatus::Cancelled { reason }
    }
}

/// Handle to the running scheduler thread
pub struct SchedulerThread {
    handle: JoinHandle<()>,
}

impl SchedulerThread {
    /// Wait for the scheduler to exit (after the queue is closed)
    pub fn join(self) {
        if let Err(e) = self.handle.join() {
            log::error!("Scheduler thread panicked: {:?}", e);
        }
    }
}
