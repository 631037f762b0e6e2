//! YantraIO - Virtual gamepad daemon
//!
//! Shares one virtual gamepad between a human on a physical controller and
//! an automated planner that submits named, frame-indexed moves.
//!
//! ## Features
//!
//! - `uinput`: Linux uinput virtual device and evdev passthrough. Without it
//!   only the mock backend is available.

pub mod client;
pub mod config;
pub mod core;
pub mod daemon;
pub mod devices;
pub mod error;
pub mod moves;
pub mod passthrough;
pub mod scheduler;
pub mod streaming;

// Re-export commonly used types
pub use client::CommandClient;
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
