//! Planning queue and request status table
//!
//! Client connections and the scheduler thread meet here. Every operation
//! holds the lock for O(1) work (plus the occasional drain on `clear`), and
//! never across device I/O.
//!
//! ```text
//!  Enqueue ──▶ pending FIFO ───────┐
//!                                  ├──▶ scheduler (one at a time)
//!  Interrupt ──▶ immediate slot ───┘    immediate slot wins
//! ```
//!
//! The FIFO is never reordered. An interrupt cancels the running request and
//! occupies the single immediate slot, which the scheduler drains first.

use crate::core::types::{CancelReason, RequestError, RequestId, RequestStatus};
use crate::moves::Move;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A request accepted into the queue, with its timeline already expanded
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub id: RequestId,
    pub timeline: Arc<Move>,
}

/// Request refused at submission.
///
/// Refusals after the daemon accepted the request body get an id, so the
/// caller can still see `Rejected` through `Status`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub request_id: Option<RequestId>,
    pub error: RequestError,
}

/// What the scheduler should do next
#[derive(Debug)]
pub enum NextRequest {
    Start(QueuedRequest),
    /// Nothing arrived before the timeout
    Idle,
    /// Queue closed for shutdown
    Closed,
}

/// The currently running request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningRequest {
    pub request_id: RequestId,
    pub move_name: String,
}

/// Point-in-time view of the queue for `Peek`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub running: Option<RunningRequest>,
    /// Pending interrupt, if any; starts before everything in `pending`
    pub immediate: Option<RequestId>,
    /// Pending requests in execution order
    pub pending: Vec<RequestId>,
}

struct QueueState {
    pending: VecDeque<QueuedRequest>,
    immediate: Option<QueuedRequest>,
    running: Option<RunningRequest>,
    /// Cancellation aimed at a specific running request
    cancel: Option<(RequestId, CancelReason)>,
    statuses: HashMap<RequestId, RequestStatus>,
    /// Terminal requests in completion order, for retention eviction
    finished: VecDeque<RequestId>,
    next_id: RequestId,
    closed: bool,
}

impl QueueState {
    fn allocate_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn set_terminal(&mut self, id: RequestId, status: RequestStatus, retention: usize) {
        self.statuses.insert(id, status);
        self.finished.push_back(id);
        while self.finished.len() > retention {
            if let Some(old) = self.finished.pop_front() {
                // Acknowledged ids are already gone
                if self.statuses.get(&old).is_some_and(RequestStatus::is_terminal) {
                    self.statuses.remove(&old);
                }
            }
        }
    }
}

/// FIFO of move requests shared by the command channel and the scheduler
pub struct PlanningQueue {
    state: Mutex<QueueState>,
    wake: Condvar,
    max_pending: usize,
    retention: usize,
}

impl PlanningQueue {
    pub fn new(max_pending: usize, retention: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                immediate: None,
                running: None,
                cancel: None,
                statuses: HashMap::new(),
                finished: VecDeque::new(),
                next_id: 1,
                closed: false,
            }),
            wake: Condvar::new(),
            max_pending,
            retention,
        }
    }

    // ------------------------------------------------------------------
    // Client side
    // ------------------------------------------------------------------

    /// Append a request to the FIFO
    pub fn enqueue(&self, timeline: Arc<Move>) -> Result<RequestId, Rejection> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Rejection {
                request_id: None,
                error: RequestError::ShuttingDown,
            });
        }
        let id = state.allocate_id();
        if state.pending.len() >= self.max_pending {
            let error = RequestError::QueueFull {
                capacity: self.max_pending,
            };
            let status = RequestStatus::Rejected {
                reason: error.to_string(),
            };
            state.set_terminal(id, status, self.retention);
            return Err(Rejection {
                request_id: Some(id),
                error,
            });
        }

        log::debug!("Request {} queued: '{}'", id, timeline.name());
        state.statuses.insert(id, RequestStatus::Queued);
        state.pending.push_back(QueuedRequest { id, timeline });
        self.wake.notify_all();
        Ok(id)
    }

    /// Cancel the running request and run `timeline` before anything queued
    pub fn interrupt(&self, timeline: Arc<Move>) -> Result<RequestId, Rejection> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Rejection {
                request_id: None,
                error: RequestError::ShuttingDown,
            });
        }
        let id = state.allocate_id();
        log::info!("Request {} interrupt: '{}'", id, timeline.name());

        if let Some(replaced) = state.immediate.take() {
            log::info!("Request {} superseded by {}", replaced.id, id);
            let status = RequestStatus::Cancelled {
                reason: CancelReason::Superseded,
            };
            state.set_terminal(replaced.id, status, self.retention);
        }
        if let Some(running_id) = state.running.as_ref().map(|r| r.request_id) {
            state.cancel = Some((running_id, CancelReason::Interrupted));
        }

        state.statuses.insert(id, RequestStatus::Queued);
        state.immediate = Some(QueuedRequest { id, timeline });
        self.wake.notify_all();
        Ok(id)
    }

    /// Record a request refused before it reached the queue
    pub fn reject(&self, error: &RequestError) -> Option<RequestId> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        let id = state.allocate_id();
        let status = RequestStatus::Rejected {
            reason: error.to_string(),
        };
        state.set_terminal(id, status, self.retention);
        Some(id)
    }

    pub fn status(&self, id: RequestId) -> Result<RequestStatus, RequestError> {
        self.state
            .lock()
            .statuses
            .get(&id)
            .cloned()
            .ok_or(RequestError::UnknownRequest { request_id: id })
    }

    /// Remove a finished request's status and return it
    pub fn acknowledge(&self, id: RequestId) -> Result<RequestStatus, RequestError> {
        let mut state = self.state.lock();
        let status = state
            .statuses
            .get(&id)
            .cloned()
            .ok_or(RequestError::UnknownRequest { request_id: id })?;
        if !status.is_terminal() {
            return Err(RequestError::StillActive { request_id: id });
        }
        state.statuses.remove(&id);
        Ok(status)
    }

    /// Cancel the running request. No-op (returns `None`) when idle.
    pub fn cancel_current(&self) -> Option<RequestId> {
        let mut state = self.state.lock();
        let id = state.running.as_ref()?.request_id;
        if state.cancel.is_none() {
            state.cancel = Some((id, CancelReason::Requested));
        }
        self.wake.notify_all();
        Some(id)
    }

    /// Drop every request that has not started. Returns the dropped ids.
    pub fn clear(&self) -> Vec<RequestId> {
        let mut state = self.state.lock();
        let mut dropped: Vec<RequestId> = state.immediate.take().map(|r| r.id).into_iter().collect();
        dropped.extend(state.pending.drain(..).map(|r| r.id));
        for &id in &dropped {
            let status = RequestStatus::Cancelled {
                reason: CancelReason::Cleared,
            };
            state.set_terminal(id, status, self.retention);
        }
        if !dropped.is_empty() {
            log::info!("Cleared {} pending requests", dropped.len());
        }
        dropped
    }

    pub fn peek(&self) -> QueueSnapshot {
        let state = self.state.lock();
        QueueSnapshot {
            running: state.running.clone(),
            immediate: state.immediate.as_ref().map(|r| r.id),
            pending: state.pending.iter().map(|r| r.id).collect(),
        }
    }

    /// Requests waiting to start
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.pending.len() + usize::from(state.immediate.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running.is_some()
    }

    /// Stop accepting requests. Pending requests are cancelled and the
    /// running one is told to stop.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;

        let mut dropped: Vec<RequestId> = state.immediate.take().map(|r| r.id).into_iter().collect();
        dropped.extend(state.pending.drain(..).map(|r| r.id));
        for id in dropped {
            let status = RequestStatus::Cancelled {
                reason: CancelReason::Shutdown,
            };
            state.set_terminal(id, status, self.retention);
        }
        if let Some(running_id) = state.running.as_ref().map(|r| r.request_id) {
            state.cancel = Some((running_id, CancelReason::Shutdown));
        }
        self.wake.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    // ------------------------------------------------------------------
    // Scheduler side
    // ------------------------------------------------------------------

    /// Take the next request, waiting up to `timeout` for one to arrive.
    ///
    /// The returned request is recorded as running but its status stays
    /// `Queued` until [`begin`](Self::begin).
    pub fn wait_next(&self, timeout: Duration) -> NextRequest {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return NextRequest::Closed;
            }
            let next = match state.immediate.take() {
                Some(request) => Some(request),
                None => state.pending.pop_front(),
            };
            if let Some(request) = next {
                state.running = Some(RunningRequest {
                    request_id: request.id,
                    move_name: request.timeline.name().to_string(),
                });
                return NextRequest::Start(request);
            }
            if self.wake.wait_until(&mut state, deadline).timed_out() {
                return NextRequest::Idle;
            }
        }
    }

    /// Mark a taken request as running
    pub fn begin(&self, id: RequestId) {
        self.state.lock().statuses.insert(id, RequestStatus::Running);
    }

    /// Sleep until `deadline`, returning early if `id` is cancelled
    pub fn wait_tick(&self, id: RequestId, deadline: Instant) {
        let mut state = self.state.lock();
        while !matches!(state.cancel, Some((cancel_id, _)) if cancel_id == id) {
            if self.wake.wait_until(&mut state, deadline).timed_out() {
                return;
            }
        }
    }

    /// Sleep until `deadline` or until the queue is closed.
    /// Returns true if closed.
    pub fn wait_closed(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        while !state.closed {
            if self.wake.wait_until(&mut state, deadline).timed_out() {
                return state.closed;
            }
        }
        true
    }

    /// Pending cancellation for the running request `id`
    pub fn take_cancel(&self, id: RequestId) -> Option<CancelReason> {
        let mut state = self.state.lock();
        match state.cancel {
            Some((cancel_id, reason)) if cancel_id == id => {
                state.cancel = None;
                Some(reason)
            }
            _ => None,
        }
    }

    /// Record the outcome of the running request
    pub fn finish(&self, id: RequestId, status: RequestStatus) {
        let mut state = self.state.lock();
        if state.running.as_ref().is_some_and(|r| r.request_id == id) {
            state.running = None;
        }
        // A cancel that raced with completion no longer applies
        if matches!(state.cancel, Some((cancel_id, _)) if cancel_id == id) {
            state.cancel = None;
        }
        state.set_terminal(id, status, self.retention);
        self.wake.notify_all();
    }
}
