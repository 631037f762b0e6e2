//! Shared harness: a real daemon on an ephemeral loopback port with mock devices

#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};
use yantra_io::config::{Config, MoveDefinition};
use yantra_io::core::types::{Action, ActionStep, ButtonId, RequestId, RequestStatus};
use yantra_io::devices::mock::{
    MockBackend, MockDeviceMonitor, MockPhysicalMonitor, MockPhysicalSource,
};
use yantra_io::moves::MoveVocabulary;
use yantra_io::{CommandClient, Daemon};

pub struct TestDaemon {
    pub daemon: Daemon,
    pub device: MockDeviceMonitor,
    pub physical: Option<MockPhysicalMonitor>,
}

impl TestDaemon {
    pub fn client(&self) -> CommandClient {
        CommandClient::connect(self.daemon.local_addr()).expect("connect to daemon")
    }
}

/// Mock-backed config on an ephemeral port
pub fn config(frame_rate: f64) -> Config {
    let mut config = Config::default();
    config.device.backend = "mock".to_string();
    config.network.bind_address = "127.0.0.1:0".to_string();
    config.network.read_timeout_ms = 50;
    config.timing.frame_rate = frame_rate;
    config.passthrough.read_timeout_ms = 5;
    config
}

/// A move holding `button` for `frames` frames
pub fn hold(name: &str, button: ButtonId, frames: u32) -> MoveDefinition {
    MoveDefinition {
        name: name.to_string(),
        steps: vec![
            ActionStep::new(0, Action::press(button)),
            ActionStep::new(frames, Action::release(button)),
        ],
    }
}

pub fn start(config: Config, with_physical: bool) -> TestDaemon {
    let _ = env_logger::builder().is_test(true).try_init();

    let vocabulary = MoveVocabulary::from_definitions(&config.moves).expect("valid moves");
    let (backend, device) = MockBackend::new();
    let (source, physical) = if with_physical {
        let (source, monitor) = MockPhysicalSource::new();
        (
            Some(Box::new(source) as Box<dyn yantra_io::core::physical::PhysicalSource>),
            Some(monitor),
        )
    } else {
        (None, None)
    };
    let daemon =
        Daemon::start(&config, vocabulary, Box::new(backend), source).expect("daemon start");
    TestDaemon {
        daemon,
        device,
        physical,
    }
}

/// Enqueue and return the request id
pub fn enqueue(client: &mut CommandClient, name: &str) -> RequestId {
    let response = client.enqueue(name, None).expect("enqueue");
    assert!(response.is_ok(), "enqueue {} failed: {:?}", name, response);
    response.request_id.expect("request id")
}

pub fn status(client: &mut CommandClient, id: RequestId) -> RequestStatus {
    client
        .status(id)
        .expect("status")
        .status
        .expect("status field")
}

/// Poll until `pred` holds for the request's status or the timeout passes
pub fn wait_status(
    client: &mut CommandClient,
    id: RequestId,
    timeout: Duration,
    pred: impl Fn(&RequestStatus) -> bool,
) -> RequestStatus {
    let deadline = Instant::now() + timeout;
    loop {
        let current = status(client, id);
        if pred(&current) || Instant::now() >= deadline {
            return current;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

pub fn wait_terminal(client: &mut CommandClient, id: RequestId) -> RequestStatus {
    wait_status(client, id, Duration::from_secs(5), RequestStatus::is_terminal)
}
