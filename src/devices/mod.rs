//! Device implementations

pub mod mock;
#[cfg(feature = "uinput")]
pub mod uinput;

use crate::config::Config;
use crate::core::backend::DeviceBackend;
use crate::core::physical::PhysicalSource;
use crate::error::{Error, Result};

/// Create the virtual device backend named in the configuration
pub fn create_backend(config: &Config) -> Result<Box<dyn DeviceBackend>> {
    match config.device.backend.as_str() {
        #[cfg(feature = "uinput")]
        "uinput" => Ok(Box::new(uinput::UinputBackend::new(&config.device.name))),
        #[cfg(not(feature = "uinput"))]
        "uinput" => Err(Error::UnknownBackend(
            "uinput (built without the `uinput` feature)".to_string(),
        )),
        "mock" => {
            let (backend, _monitor) = mock::MockBackend::new();
            Ok(Box::new(backend))
        }
        other => Err(Error::UnknownBackend(other.to_string())),
    }
}

/// Create the physical controller source, if passthrough is configured
pub fn create_physical_source(config: &Config) -> Result<Option<Box<dyn PhysicalSource>>> {
    if !config.passthrough.enabled {
        return Ok(None);
    }
    let Some(path) = config.device.physical_path.as_deref() else {
        log::info!("No physical_path configured, passthrough disabled");
        return Ok(None);
    };
    match config.device.backend.as_str() {
        #[cfg(feature = "uinput")]
        "uinput" => Ok(Some(Box::new(uinput::EvdevSource::new(path)))),
        #[cfg(not(feature = "uinput"))]
        "uinput" => Err(Error::UnknownBackend(
            "uinput (built without the `uinput` feature)".to_string(),
        )),
        "mock" => {
            log::info!("Mock backend: ignoring physical_path {}", path);
            let (source, _monitor) = mock::MockPhysicalSource::new();
            Ok(Some(Box::new(source)))
        }
        other => Err(Error::UnknownBackend(other.to_string())),
    }
}
