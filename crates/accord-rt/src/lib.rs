//! A reference executor for translated target directives.
//!
//! Host memory is a flat table of integer cells per variable; the device
//! is a registry of storage associated with host sections. Opaque code is
//! supplied as closures bound by label, so end-to-end tests can run the
//! exact tree the translator produced.

pub mod device;
pub mod error;
mod executor;
mod kernel;
pub mod memory;
pub mod scheduler;

pub use device::{DeviceRegistry, Section};
pub use error::RuntimeError;
pub use executor::Executor;
pub use kernel::{Kernel, KernelContext};
