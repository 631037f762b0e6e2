//! Core abstractions for the virtual controller.
//!
//! - [`backend::DeviceBackend`]: Trait to implement for a new virtual-device facility
//! - [`physical::PhysicalSource`]: Trait to implement for a new physical input source
//! - [`arbiter::SharedDevice`]: Single-writer arbitration of the virtual device
//! - [`types`]: Actions, steps, request lifecycle

pub mod arbiter;
pub mod backend;
pub mod physical;
pub mod types;
