//! YantraIO daemon
//!
//! ## Threads
//!
//! - **scheduler**: frame-paced move execution
//! - **passthrough**: physical controller mirroring (when configured)
//! - **cmd-server / cmd-client**: command channel on loopback TCP (port 5560)

use std::env;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use yantra_io::{Config, Daemon, Error, Result};

const DEFAULT_CONFIG_PATH: &str = "/etc/yantra.toml";

/// Parse config path from command line arguments.
///
/// Supports:
/// - `yantra-io <path>` (positional)
/// - `yantra-io --config <path>` (flag-based)
/// - `yantra-io -c <path>` (short flag)
///
/// Returns `None` when no path was given.
fn parse_config_path() -> Option<String> {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return Some(args[1].clone());
    }

    None
}

fn load_config() -> Result<Config> {
    match parse_config_path() {
        Some(path) => {
            log::info!("Using config: {}", path);
            Config::load(&path)
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            log::info!("Using config: {}", DEFAULT_CONFIG_PATH);
            Config::load(DEFAULT_CONFIG_PATH)
        }
        None => {
            log::info!("No config file, using defaults");
            Ok(Config::default())
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("YantraIO v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    log::info!(
        "Device: {} ({})",
        config.device.name,
        config.device.backend
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut daemon = Daemon::from_config(&config)?;
    log::info!(
        "YantraIO running on {}. Press Ctrl-C to stop.",
        daemon.local_addr()
    );

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    daemon.shutdown();
    log::info!("YantraIO stopped");
    Ok(())
}
