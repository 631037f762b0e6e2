//! Command channel accept loop
//!
//! Non-blocking accept polled every 10ms so the loop observes shutdown. Each
//! accepted client is served on its own `cmd-client` thread, up to
//! `max_clients` at once; extra connections are closed immediately.

use crate::error::{Error, Result};
use crate::streaming::dispatch::CommandService;
use crate::streaming::tcp_receiver::TcpReceiver;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const ACCEPT_POLL: Duration = Duration::from_millis(10);

pub struct CommandServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    service: Arc<CommandService>,
    running: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    max_clients: usize,
    read_timeout: Duration,
}

impl CommandServer {
    /// Bind the listening socket. Binding failure is fatal at startup.
    pub fn bind(
        addr: SocketAddr,
        service: Arc<CommandService>,
        max_clients: usize,
        read_timeout: Duration,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| Error::Other(format!("Failed to bind to {}: {}", addr, e)))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        log::info!("Command channel listening on {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            service,
            running: Arc::new(AtomicBool::new(true)),
            active: Arc::new(AtomicUsize::new(0)),
            max_clients,
            read_timeout,
        })
    }

    /// Bound address (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn spawn(self) -> std::io::Result<ServerThread> {
        let running = Arc::clone(&self.running);
        let handle = thread::Builder::new()
            .name("cmd-server".into())
            .spawn(move || self.run())?;
        Ok(ServerThread { handle, running })
    }

    fn run(self) {
        let mut clients: Vec<JoinHandle<()>> = Vec::new();

        while self.running.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    clients.retain(|c| !c.is_finished());

                    if self.active.load(Ordering::Relaxed) >= self.max_clients {
                        log::warn!(
                            "Rejecting connection from {}: {} clients connected",
                            addr,
                            self.max_clients
                        );
                        let _ = stream.shutdown(Shutdown::Both);
                        continue;
                    }

                    // Accepted sockets inherit non-blocking mode on some platforms
                    if let Err(e) = stream.set_nonblocking(false) {
                        log::error!("Failed to set socket to blocking mode: {}", e);
                        continue;
                    }

                    let service = Arc::clone(&self.service);
                    let running = Arc::clone(&self.running);
                    let active = Arc::clone(&self.active);
                    let read_timeout = self.read_timeout;
                    active.fetch_add(1, Ordering::Relaxed);

                    let spawned = thread::Builder::new()
                        .name("cmd-client".into())
                        .spawn(move || {
                            log::info!("Client connected: {}", addr);
                            let mut receiver = TcpReceiver::new(service, running, read_timeout);
                            if let Err(e) = receiver.run(stream) {
                                log::warn!("Client {} error: {}", addr, e);
                            }
                            log::info!("Client disconnected: {}", addr);
                            active.fetch_sub(1, Ordering::Relaxed);
                        });
                    match spawned {
                        Ok(handle) => clients.push(handle),
                        Err(e) => {
                            log::error!("Failed to spawn client thread: {}", e);
                            self.active.fetch_sub(1, Ordering::Relaxed);
                        }
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => {
                    log::error!("Accept error: {}", e);
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }

        // Receivers observe the flag within one read timeout
        for client in clients {
            let _ = client.join();
        }
        log::info!("Command channel closed");
    }
}

/// Handle to the running accept loop
pub struct ServerThread {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl ServerThread {
    /// Stop accepting, wait for connected clients to close
    pub fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        if let Err(e) = self.handle.join() {
            log::error!("Command server thread panicked: {:?}", e);
        }
    }
}
