//! Command channel messages
//!
//! Requests are JSON objects tagged by `type`:
//!
//! ```json
//! {"type": "Enqueue", "move_name": "jump", "params": {"repeat": 2}}
//! {"type": "Status", "request_id": 7}
//! {"type": "CancelCurrent"}
//! ```
//!
//! Every request gets exactly one [`Response`]. Fields irrelevant to the
//! request are omitted:
//!
//! ```json
//! {"result": "Ok", "request_id": 7, "status": {"state": "queued"}}
//! {"result": "Error", "request_id": 8, "error": {"code": "unknown_move", "name": "moonwalk"}}
//! ```

use crate::core::types::{RequestError, RequestId, RequestStatus};
use crate::moves::{MoveInfo, Params};
use crate::scheduler::QueueSnapshot;
use serde::{Deserialize, Serialize};

/// Client request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Append a move to the planning queue
    Enqueue {
        move_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Params>,
    },
    /// Cancel the running move and run this one next
    Interrupt {
        move_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Params>,
    },
    /// Lifecycle status of a request
    Status { request_id: RequestId },
    /// Collect a finished request's status and forget it
    Ack { request_id: RequestId },
    CancelCurrent,
    ClearQueue,
    Peek,
    ListMoves,
    Health,
}

impl Request {
    pub fn enqueue(move_name: &str) -> Self {
        Request::Enqueue {
            move_name: move_name.to_string(),
            params: None,
        }
    }

    pub fn interrupt(move_name: &str) -> Self {
        Request::Interrupt {
            move_name: move_name.to_string(),
            params: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseResult {
    Ok,
    Error,
}

/// Scheduler activity reported by `Health`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Daemon health snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub scheduler: SchedulerState,
    /// Virtual device failed and has not been recreated yet
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_error: Option<String>,
    pub passthrough_enabled: bool,
    pub passthrough_connected: bool,
    /// Requests waiting to start
    pub queue_length: usize,
}

/// Response to a single request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub result: ResponseResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RequestError>,
    /// Requests dropped by `ClearQueue`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<Vec<RequestId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moves: Option<Vec<MoveInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthReport>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            result: ResponseResult::Ok,
            request_id: None,
            status: None,
            error: None,
            cancelled: None,
            queue: None,
            moves: None,
            health: None,
        }
    }

    pub fn error(error: RequestError) -> Self {
        Self {
            result: ResponseResult::Error,
            error: Some(error),
            ..Self::ok()
        }
    }

    pub fn with_request_id(mut self, request_id: Option<RequestId>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.result == ResponseResult::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::ParamValue;

    #[test]
    fn test_request_json_shape() {
        let req: Request = serde_json::from_str(
            r#"{"type":"Enqueue","move_name":"jump","params":{"repeat":2}}"#,
        )
        .unwrap();
        let Request::Enqueue { move_name, params } = req else {
            panic!("expected Enqueue");
        };
        assert_eq!(move_name, "jump");
        assert_eq!(params.unwrap()["repeat"], ParamValue::Int(2));

        let req: Request = serde_json::from_str(r#"{"type":"CancelCurrent"}"#).unwrap();
        assert_eq!(req, Request::CancelCurrent);

        let json = serde_json::to_string(&Request::enqueue("crouch")).unwrap();
        assert_eq!(json, r#"{"type":"Enqueue","move_name":"crouch"}"#);
    }

    #[test]
    fn test_response_omits_empty_fields() {
        let json = serde_json::to_string(
            &Response::ok()
                .with_request_id(Some(3))
                .with_status(RequestStatus::Queued),
        )
        .unwrap();
        assert_eq!(
            json,
            r#"{"result":"Ok","request_id":3,"status":{"state":"queued"}}"#
        );

        let json = serde_json::to_string(&Response::error(RequestError::ShuttingDown)).unwrap();
        assert_eq!(json, r#"{"result":"Error","error":{"code":"shutting_down"}}"#);
    }
}
