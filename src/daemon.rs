//! Daemon wiring and ordered shutdown
//!
//! ```text
//!              ┌──────────────┐  enqueue/status   ┌───────────────┐
//!  clients ───▶│ cmd-server   │──────────────────▶│ PlanningQueue │
//!              │ cmd-client×N │                   └───────┬───────┘
//!              └──────────────┘                           │ one at a time
//!                                                         ▼
//!  physical ──▶ passthrough ──┐                    ┌─────────────┐
//!  controller                 ├──▶ SharedDevice ◀──│  scheduler  │
//!                             │    (owner flag)    └─────────────┘
//!                             ▼
//!                       virtual gamepad
//! ```
//!
//! Shutdown runs in a fixed order on every exit path, including `Drop`:
//! stop accepting commands, cancel the in-flight move, stop passthrough,
//! destroy the virtual device.

use crate::config::Config;
use crate::core::arbiter::SharedDevice;
use crate::core::backend::{DeviceBackend, DeviceHandle};
use crate::core::physical::PhysicalSource;
use crate::devices;
use crate::error::Result;
use crate::moves::MoveVocabulary;
use crate::passthrough::{Backoff, Passthrough, PassthroughStatus, PassthroughThread};
use crate::scheduler::{ActionScheduler, PlanningQueue, SchedulerConfig, SchedulerThread};
use crate::streaming::{CommandServer, CommandService, ServerThread};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

pub struct Daemon {
    local_addr: SocketAddr,
    queue: Arc<PlanningQueue>,
    device: Arc<SharedDevice>,
    passthrough_status: Option<Arc<PassthroughStatus>>,
    server: Option<ServerThread>,
    scheduler: Option<SchedulerThread>,
    passthrough: Option<PassthroughThread>,
    stopped: bool,
}

impl Daemon {
    /// Start with the backends and moves named in the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let vocabulary = MoveVocabulary::from_definitions(&config.moves)?;
        log::info!("Move vocabulary: {} moves", vocabulary.len());
        let backend = devices::create_backend(config)?;
        let physical = devices::create_physical_source(config)?;
        Self::start(config, vocabulary, backend, physical)
    }

    /// Create the virtual device, bind the command channel and start every thread
    pub fn start(
        config: &Config,
        vocabulary: MoveVocabulary,
        backend: Box<dyn DeviceBackend>,
        physical: Option<Box<dyn PhysicalSource>>,
    ) -> Result<Self> {
        let device = Arc::new(SharedDevice::new(DeviceHandle::create(backend)?));
        let queue = Arc::new(PlanningQueue::new(
            config.queue.max_pending,
            config.queue.status_retention,
        ));

        let passthrough = physical
            .map(|source| Passthrough::new(source, Arc::clone(&device), &config.passthrough));
        let passthrough_status = passthrough.as_ref().map(Passthrough::status);

        let service = Arc::new(CommandService::new(
            Arc::new(vocabulary),
            Arc::clone(&queue),
            Arc::clone(&device),
            passthrough_status.clone(),
        )
        .with_duration_limit(
            config.timing.frame_duration(),
            config.timing.max_move_duration(),
        ));
        let server = CommandServer::bind(
            config.bind_addr()?,
            service,
            config.network.max_clients,
            Duration::from_millis(config.network.read_timeout_ms),
        )?;

        let mut daemon = Self {
            local_addr: server.local_addr(),
            queue: Arc::clone(&queue),
            device: Arc::clone(&device),
            passthrough_status,
            server: None,
            scheduler: None,
            passthrough: None,
            stopped: false,
        };

        // From here on, Drop cleans up whatever already started
        if let Some(passthrough) = passthrough {
            daemon.passthrough = Some(passthrough.spawn()?);
        }
        let scheduler_config =
            SchedulerConfig::from_timing(&config.timing, Backoff::from_config(&config.passthrough));
        daemon.scheduler = Some(ActionScheduler::new(scheduler_config, queue, device).spawn()?);
        daemon.server = Some(server.spawn()?);

        log::info!(
            "Daemon running: {:.1} fps, passthrough {}",
            config.timing.frame_rate,
            if daemon.passthrough.is_some() {
                "enabled"
            } else {
                "disabled"
            }
        );
        Ok(daemon)
    }

    /// Address the command channel is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn queue(&self) -> &Arc<PlanningQueue> {
        &self.queue
    }

    pub fn device(&self) -> &Arc<SharedDevice> {
        &self.device
    }

    pub fn passthrough_status(&self) -> Option<&Arc<PassthroughStatus>> {
        self.passthrough_status.as_ref()
    }

    /// Ordered shutdown. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        log::info!("Shutting down...");

        if let Some(server) = self.server.take() {
            server.stop();
        }

        self.queue.close();
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.join();
        }

        if let Some(passthrough) = self.passthrough.take() {
            passthrough.stop();
        }

        self.device.destroy();
        log::info!("Shutdown complete");
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.shutdown();
    }
}
