//! Driver plugin contract and registry.
//!
//! A driver is the backend that actually talks to a device. The broker
//! never touches transports itself: it resolves the device's driver name to
//! a [`DriverFactory`] through the [`DriverRegistry`], builds a fresh
//! [`Driver`] instance for the operation, and calls exactly one of the
//! contract methods on it.
//!
//! Conformance is enforced by the type system. Anything registered is a
//! `DriverFactory`, so a resolved driver always has the full contract —
//! there is no runtime duck-typing check to fail.

mod registry;
pub mod ssh;

pub use registry::DriverRegistry;

use async_trait::async_trait;

use crate::device::Device;
use crate::error::DriverError;

/// Driver used when a device does not name one explicitly.
pub const DEFAULT_DRIVER: &str = "ssh";

/// The operations every device backend must support.
///
/// Instances are single-use: the broker builds one per operation and drops
/// it afterwards, so implementations may hold per-call connection state
/// without worrying about reuse.
#[async_trait]
pub trait Driver: Send {
    /// Runs read-only commands, returning one `(command, output)` pair per
    /// command in request order.
    async fn run_commands(
        &mut self,
        commands: &[String],
    ) -> Result<Vec<(String, String)>, DriverError>;

    /// Applies configuration commands, optionally committing afterwards,
    /// and returns the device's combined response text.
    async fn send_config(
        &mut self,
        commands: &[String],
        commit: bool,
    ) -> Result<String, DriverError>;

    /// Probes reachability. `Ok(false)` means the probe completed and the
    /// device is down; `Err` is reserved for faults in the probe itself.
    async fn is_alive(&mut self) -> Result<bool, DriverError>;
}

/// Builds [`Driver`] instances for devices.
///
/// A factory is resolved once per broker operation and then used to build
/// one driver per device, so it must be shareable across tasks.
pub trait DriverFactory: Send + Sync {
    /// Builds a driver configured for the given device. Fails when the
    /// device's driver options cannot be interpreted.
    fn build(&self, device: &Device) -> Result<Box<dyn Driver>, DriverError>;

    /// Checks whether a driver could be built for the device, without
    /// keeping the instance. Used by inventory validation.
    fn validate(&self, device: &Device) -> Result<(), DriverError> {
        self.build(device).map(drop)
    }
}

impl std::fmt::Debug for dyn DriverFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DriverFactory")
    }
}
