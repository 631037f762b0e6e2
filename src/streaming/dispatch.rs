//! Request dispatch: turns decoded requests into queue operations
//!
//! Shared by every client connection. Holds no lock of its own; each
//! operation is a single call into the planning queue or device arbiter.

use crate::core::arbiter::SharedDevice;
use crate::core::types::{RequestError, RequestStatus};
use crate::moves::{Move, MoveParams, MoveVocabulary, Params};
use crate::passthrough::PassthroughStatus;
use crate::scheduler::PlanningQueue;
use crate::streaming::messages::{HealthReport, Request, Response, SchedulerState};
use crate::streaming::wire;
use std::sync::Arc;
use std::time::Duration;

/// Longest timeline a parameterized request may expand to
#[derive(Debug, Clone, Copy)]
struct DurationLimit {
    frame: Duration,
    max: Duration,
}

pub struct CommandService {
    vocabulary: Arc<MoveVocabulary>,
    queue: Arc<PlanningQueue>,
    device: Arc<SharedDevice>,
    passthrough: Option<Arc<PassthroughStatus>>,
    limit: Option<DurationLimit>,
}

impl CommandService {
    pub fn new(
        vocabulary: Arc<MoveVocabulary>,
        queue: Arc<PlanningQueue>,
        device: Arc<SharedDevice>,
        passthrough: Option<Arc<PassthroughStatus>>,
    ) -> Self {
        Self {
            vocabulary,
            queue,
            device,
            passthrough,
            limit: None,
        }
    }

    /// Reject parameterized requests whose expanded timeline would outlast
    /// the scheduler's max move duration
    pub fn with_duration_limit(mut self, frame: Duration, max: Option<Duration>) -> Self {
        self.limit = max.map(|max| DurationLimit { frame, max });
        self
    }

    /// Decode and handle one request payload
    pub fn handle_payload(&self, payload: &[u8]) -> Response {
        match wire::decode::<Request>(payload) {
            Ok(request) => self.handle(request),
            Err(e) => {
                log::warn!("Malformed request: {}", e);
                Response::error(RequestError::MalformedRequest {
                    reason: e.to_string(),
                })
            }
        }
    }

    pub fn handle(&self, request: Request) -> Response {
        log::debug!("Request: {:?}", request);
        match request {
            Request::Enqueue { move_name, params } => {
                self.submit(&move_name, params.as_ref(), false)
            }
            Request::Interrupt { move_name, params } => {
                self.submit(&move_name, params.as_ref(), true)
            }
            Request::Status { request_id } => match self.queue.status(request_id) {
                Ok(status) => Response::ok()
                    .with_request_id(Some(request_id))
                    .with_status(status),
                Err(e) => Response::error(e).with_request_id(Some(request_id)),
            },
            Request::Ack { request_id } => match self.queue.acknowledge(request_id) {
                Ok(status) => Response::ok()
                    .with_request_id(Some(request_id))
                    .with_status(status),
                Err(e) => Response::error(e).with_request_id(Some(request_id)),
            },
            Request::CancelCurrent => {
                let cancelled = self.queue.cancel_current();
                if cancelled.is_none() {
                    log::debug!("CancelCurrent with nothing running");
                }
                Response::ok().with_request_id(cancelled)
            }
            Request::ClearQueue => Response {
                cancelled: Some(self.queue.clear()),
                ..Response::ok()
            },
            Request::Peek => Response {
                queue: Some(self.queue.peek()),
                ..Response::ok()
            },
            Request::ListMoves => Response {
                moves: Some(self.vocabulary.infos()),
                ..Response::ok()
            },
            Request::Health => Response {
                health: Some(self.health()),
                ..Response::ok()
            },
        }
    }

    fn submit(&self, move_name: &str, params: Option<&Params>, interrupt: bool) -> Response {
        let timeline = match self.resolve(move_name, params) {
            Ok(timeline) => timeline,
            Err(error) => {
                log::info!("Rejected '{}': {}", move_name, error);
                let id = self.queue.reject(&error);
                return Response::error(error).with_request_id(id);
            }
        };

        let submitted = if interrupt {
            self.queue.interrupt(timeline)
        } else {
            self.queue.enqueue(timeline)
        };
        match submitted {
            Ok(id) => Response::ok()
                .with_request_id(Some(id))
                .with_status(RequestStatus::Queued),
            Err(rejection) => {
                log::info!("Rejected '{}': {}", move_name, rejection.error);
                Response::error(rejection.error).with_request_id(rejection.request_id)
            }
        }
    }

    /// Look up a move and apply request parameters to its timeline
    fn resolve(
        &self,
        move_name: &str,
        params: Option<&Params>,
    ) -> Result<Arc<Move>, RequestError> {
        let mv = self
            .vocabulary
            .lookup(move_name)
            .ok_or_else(|| RequestError::UnknownMove {
                name: move_name.to_string(),
            })?;
        let params = MoveParams::parse(params)?;
        if params.is_default() {
            return Ok(mv);
        }
        let expanded = params.apply(&mv)?;
        if let Some(limit) = self.limit {
            let span = limit.frame * expanded.frame_length();
            if span > limit.max {
                return Err(RequestError::InvalidParams {
                    reason: format!(
                        "expanded '{}' spans {:?}, over the {:?} move limit",
                        move_name, span, limit.max
                    ),
                });
            }
        }
        Ok(Arc::new(expanded))
    }

    pub fn health(&self) -> HealthReport {
        let scheduler = if self.queue.is_running() {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        };
        let device_error = self.device.last_error().map(|e| e.to_string());
        HealthReport {
            scheduler,
            degraded: device_error.is_some(),
            device_error,
            passthrough_enabled: self.passthrough.is_some(),
            passthrough_connected: self
                .passthrough
                .as_ref()
                .is_some_and(|p| p.is_connected()),
            queue_length: self.queue.len(),
        }
    }
}
