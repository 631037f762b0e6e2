//! Per-connection request loop
//!
//! Each client connection gets its own thread running [`TcpReceiver::run`].
//! Clients are expected to be short-lived (connect, a few requests,
//! disconnect) but long-lived planner connections work the same way.
//!
//! # Connection lifecycle
//!
//! ```text
//! 1. Server accepts and spawns a receiver thread
//! 2. Loop: read frame → dispatch → write response
//! 3. Read timeouts re-check the shutdown flag
//! 4. EOF / reset ends the loop quietly, protocol errors close the socket
//! ```

use crate::error::{Error, Result};
use crate::streaming::dispatch::CommandService;
use crate::streaming::wire::{self, FrameReader};
use std::io::ErrorKind;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Serves requests from one connected client
pub struct TcpReceiver {
    service: Arc<CommandService>,
    /// Server running flag (cleared at shutdown)
    running: Arc<AtomicBool>,
    reader: FrameReader,
    read_timeout: Duration,
}

impl TcpReceiver {
    pub fn new(service: Arc<CommandService>, running: Arc<AtomicBool>, read_timeout: Duration) -> Self {
        Self {
            service,
            running,
            reader: FrameReader::new(),
            read_timeout,
        }
    }

    /// Run the request loop until the client disconnects or shutdown
    pub fn run(&mut self, mut stream: TcpStream) -> Result<()> {
        log::debug!("Receiver started for {:?}", stream.peer_addr());

        if let Err(e) = stream.set_read_timeout(Some(self.read_timeout)) {
            log::warn!("Failed to set read timeout: {}", e);
        }
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let result = self.serve(&mut stream);
        let _ = stream.shutdown(Shutdown::Both);

        match result {
            Err(Error::Io(ref e))
                if matches!(
                    e.kind(),
                    ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe
                ) =>
            {
                log::debug!("Client disconnected");
                Ok(())
            }
            other => other,
        }
    }

    fn serve(&mut self, stream: &mut TcpStream) -> Result<()> {
        while self.running.load(Ordering::Relaxed) {
            let Some(payload) = self.reader.read_frame(stream)? else {
                continue;
            };
            let response = self.service.handle_payload(payload);
            wire::write_frame(stream, &wire::encode(&response)?)?;
        }
        log::debug!("Server stopping, closing connection");
        Ok(())
    }
}
