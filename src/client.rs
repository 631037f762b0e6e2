//! Blocking command channel client
//!
//! Used by `yantra-ctl` and the integration tests. One request in flight at
//! a time; each call writes a frame and blocks for the matching response.

use crate::core::types::RequestId;
use crate::error::{Error, Result};
use crate::moves::Params;
use crate::streaming::messages::{Request, Response};
use crate::streaming::wire::{self, FrameReader};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Default time to wait for a response
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CommandClient {
    stream: TcpStream,
    reader: FrameReader,
}

impl CommandClient {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(RESPONSE_TIMEOUT))?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            reader: FrameReader::new(),
        })
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// Send one request and wait for its response
    pub fn send(&mut self, request: &Request) -> Result<Response> {
        wire::write_frame(&mut self.stream, &wire::encode(request)?)?;
        self.read_response()
    }

    /// Send an arbitrary payload (for protocol testing)
    pub fn send_raw(&mut self, payload: &[u8]) -> Result<Response> {
        wire::write_frame(&mut self.stream, payload)?;
        self.read_response()
    }

    fn read_response(&mut self) -> Result<Response> {
        match self.reader.read_frame(&mut self.stream)? {
            Some(payload) => wire::decode(payload),
            None => Err(Error::Protocol("timed out waiting for response".to_string())),
        }
    }

    pub fn enqueue(&mut self, move_name: &str, params: Option<Params>) -> Result<Response> {
        self.send(&Request::Enqueue {
            move_name: move_name.to_string(),
            params,
        })
    }

    pub fn interrupt(&mut self, move_name: &str, params: Option<Params>) -> Result<Response> {
        self.send(&Request::Interrupt {
            move_name: move_name.to_string(),
            params,
        })
    }

    pub fn status(&mut self, request_id: RequestId) -> Result<Response> {
        self.send(&Request::Status { request_id })
    }

    pub fn ack(&mut self, request_id: RequestId) -> Result<Response> {
        self.send(&Request::Ack { request_id })
    }

    pub fn cancel_current(&mut self) -> Result<Response> {
        self.send(&Request::CancelCurrent)
    }

    pub fn clear_queue(&mut self) -> Result<Response> {
        self.send(&Request::ClearQueue)
    }

    pub fn peek(&mut self) -> Result<Response> {
        self.send(&Request::Peek)
    }

    pub fn list_moves(&mut self) -> Result<Response> {
        self.send(&Request::ListMoves)
    }

    pub fn health(&mut self) -> Result<Response> {
        self.send(&Request::Health)
    }
}
