//! Configuration for the YantraIO daemon
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or
//! no file at all) yields a working mock-free uinput setup on loopback.
//!
//! ```toml
//! [device]
//! backend = "uinput"              # or "mock"
//! name = "Yantra Virtual Gamepad"
//! physical_path = "/dev/input/by-id/usb-8BitDo_Pro_2-event-joystick"
//!
//! [timing]
//! frame_rate = 60.0
//! max_move_duration_ms = 10000    # 0 disables the safety valve
//!
//! [passthrough]
//! backoff_initial_ms = 100
//! backoff_max_ms = 5000
//!
//! [network]
//! bind_address = "127.0.0.1:5560"
//!
//! [[moves]]
//! name = "double_jump"
//! steps = [
//!   { frame = 0,  action = { type = "set_button", button = "south", pressed = true } },
//!   { frame = 4,  action = { type = "set_button", button = "south", pressed = false } },
//!   { frame = 10, action = { type = "set_button", button = "south", pressed = true } },
//!   { frame = 14, action = { type = "set_button", button = "south", pressed = false } },
//! ]
//! ```

use crate::core::types::ActionStep;
use crate::error::{Error, Result};
use crate::moves::Move;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub passthrough: PassthroughConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    /// Extra moves registered after the built-in vocabulary
    #[serde(default)]
    pub moves: Vec<MoveDefinition>,
}

/// Virtual and physical device settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Virtual device backend: "uinput" or "mock"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Name the virtual gamepad reports to the OS
    #[serde(default = "default_device_name")]
    pub name: String,

    /// evdev node of the physical controller; passthrough is off when unset
    #[serde(default)]
    pub physical_path: Option<String>,
}

/// Frame clock settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    /// Target frame rate the move timelines are authored against (Hz)
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,

    /// Force-cancel a move running longer than this; 0 disables
    #[serde(default = "default_max_move_duration_ms")]
    pub max_move_duration_ms: u64,
}

/// Physical passthrough settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PassthroughConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// First reconnect delay after the controller disappears
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    /// Reconnect delay ceiling
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// How long a read waits before re-checking the shutdown flag
    #[serde(default = "default_passthrough_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Command channel settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Loopback address for the command channel
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Concurrent client connections
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Socket read timeout so idle connections observe shutdown
    #[serde(default = "default_network_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Planning queue settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Requests waiting to start
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,

    /// Finished request statuses kept for `Status` queries
    #[serde(default = "default_status_retention")]
    pub status_retention: usize,
}

/// A move defined in the config file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MoveDefinition {
    pub name: String,
    pub steps: Vec<ActionStep>,
}

impl MoveDefinition {
    pub fn to_move(&self) -> Move {
        Move::new(&self.name, self.steps.clone())
    }
}

// Default value functions
fn default_backend() -> String {
    "uinput".to_string()
}
fn default_device_name() -> String {
    "Yantra Virtual Gamepad".to_string()
}
fn default_frame_rate() -> f64 {
    60.0
}
fn default_max_move_duration_ms() -> u64 {
    10_000
}
fn default_true() -> bool {
    true
}
fn default_backoff_initial_ms() -> u64 {
    100
}
fn default_backoff_max_ms() -> u64 {
    5_000
}
fn default_passthrough_read_timeout_ms() -> u64 {
    50
}
fn default_bind_address() -> String {
    "127.0.0.1:5560".to_string()
}
fn default_max_clients() -> usize {
    8
}
fn default_network_read_timeout_ms() -> u64 {
    500
}
fn default_max_pending() -> usize {
    64
}
fn default_status_retention() -> usize {
    256
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            name: default_device_name(),
            physical_path: None,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            max_move_duration_ms: default_max_move_duration_ms(),
        }
    }
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            read_timeout_ms: default_passthrough_read_timeout_ms(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            max_clients: default_max_clients(),
            read_timeout_ms: default_network_read_timeout_ms(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_pending: default_max_pending(),
            status_retention: default_status_retention(),
        }
    }
}

impl TimingConfig {
    /// Duration of one frame (Δ)
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate)
    }

    pub fn max_move_duration(&self) -> Option<Duration> {
        (self.max_move_duration_ms > 0).then(|| Duration::from_millis(self.max_move_duration_ms))
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed command channel address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.network.bind_address.parse().map_err(|e| {
            Error::Config(format!(
                "Invalid bind_address '{}': {}",
                self.network.bind_address, e
            ))
        })
    }

    /// Reject settings the daemon cannot run with
    pub fn validate(&self) -> Result<()> {
        let rate = self.timing.frame_rate;
        if !(rate.is_finite() && rate >= 1.0 && rate <= 1000.0) {
            return Err(Error::Config(format!(
                "frame_rate must be within 1..=1000 Hz, got {}",
                rate
            )));
        }

        let backoff = &self.passthrough;
        if backoff.backoff_initial_ms == 0 || backoff.backoff_initial_ms > backoff.backoff_max_ms {
            return Err(Error::Config(format!(
                "passthrough backoff must satisfy 0 < initial ({}) <= max ({})",
                backoff.backoff_initial_ms, backoff.backoff_max_ms
            )));
        }
        if backoff.read_timeout_ms == 0 {
            return Err(Error::Config(
                "passthrough read_timeout_ms must be > 0".to_string(),
            ));
        }

        // Device access is privileged; the command channel stays on loopback
        let addr = self.bind_addr()?;
        if !addr.ip().is_loopback() {
            return Err(Error::Config(format!(
                "bind_address must be a loopback address, got {}",
                addr
            )));
        }
        if self.network.max_clients == 0 || self.network.read_timeout_ms == 0 {
            return Err(Error::Config(
                "network max_clients and read_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.queue.max_pending == 0 || self.queue.status_retention == 0 {
            return Err(Error::Config(
                "queue max_pending and status_retention must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.device.backend, "uinput");
        assert_eq!(config.network.bind_address, "127.0.0.1:5560");
        assert_eq!(config.timing.frame_rate, 60.0);
        assert_eq!(
            config.timing.max_move_duration(),
            Some(Duration::from_secs(10))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.queue.max_pending, 64);
        assert!(config.passthrough.enabled);
        assert!(config.moves.is_empty());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[device]
backend = "mock"
physical_path = "/dev/input/event7"

[timing]
frame_rate = 30.0
max_move_duration_ms = 0

[network]
bind_address = "127.0.0.1:7000"

[[moves]]
name = "hop"
steps = [
  { frame = 0, action = { type = "set_button", button = "a", pressed = true } },
  { frame = 2, action = { type = "set_button", button = "a", pressed = false } },
]
"#;
        let config = Config::from_toml(toml_content).unwrap();
        assert_eq!(config.device.backend, "mock");
        assert_eq!(
            config.device.physical_path.as_deref(),
            Some("/dev/input/event7")
        );
        assert_eq!(config.timing.max_move_duration(), None);
        assert!((config.timing.frame_duration().as_secs_f64() - 1.0 / 30.0).abs() < 1e-9);
        assert_eq!(config.moves.len(), 1);
        assert_eq!(config.moves[0].to_move().steps().len(), 2);
    }

    #[test]
    fn test_shipped_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/yantra.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.device.backend, "uinput");
        let vocabulary = crate::moves::MoveVocabulary::from_definitions(&config.moves).unwrap();
        assert!(vocabulary.lookup("wavedash_right").is_some());
        assert!(vocabulary.lookup("jump").is_some());
    }

    #[test]
    fn test_rejects_non_loopback_bind() {
        let err = Config::from_toml("[network]\nbind_address = \"0.0.0.0:5560\"\n");
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_bad_timing_and_backoff() {
        assert!(Config::from_toml("[timing]\nframe_rate = 0.0\n").is_err());
        assert!(
            Config::from_toml(
                "[passthrough]\nbackoff_initial_ms = 9000\nbackoff_max_ms = 100\n"
            )
            .is_err()
        );
    }
}
