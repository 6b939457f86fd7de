//! Per-device execution units.
//!
//! Each function here runs one operation against one device and is total:
//! whatever goes wrong (resolution, connection, timeout, a malformed
//! backend response) comes back as a failure-shaped result, never as an
//! `Err`. The broker relies on this to keep one device's failure from
//! touching its siblings.

use std::time::Duration;

use log::{debug, warn};

use super::response::{CommandResult, PingResult, Stamps, Timing};
use crate::device::Device;
use crate::driver::{Driver, DriverRegistry};
use crate::error::{DriverError, ErrorKind, RegistryError};
use crate::platforms;

/// Deadline applied when the caller does not pass one. Prevents a wedged
/// device from pinning a broker task forever.
pub(crate) const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Internal failure shape: the classification tag plus a message, ready to
/// stamp onto a result.
pub(crate) struct Failure {
    pub(crate) kind: ErrorKind,
    pub(crate) message: String,
}

impl Failure {
    fn timeout(limit: Duration) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            message: format!("operation timed out after {limit:?}"),
        }
    }

    fn contract(message: String) -> Self {
        Self {
            kind: ErrorKind::Contract,
            message,
        }
    }

    fn unsupported(message: String) -> Self {
        Self {
            kind: ErrorKind::Driver,
            message,
        }
    }
}

impl From<DriverError> for Failure {
    fn from(err: DriverError) -> Self {
        Self {
            kind: ErrorKind::from(&err),
            message: err.to_string(),
        }
    }
}

impl From<RegistryError> for Failure {
    fn from(err: RegistryError) -> Self {
        Self {
            kind: ErrorKind::Resolve,
            message: err.to_string(),
        }
    }
}

/// Resolves and builds a fresh driver for one operation. No pooling:
/// isolation between devices and between calls beats connection reuse
/// here.
fn build_driver(registry: &DriverRegistry, device: &Device) -> Result<Box<dyn Driver>, Failure> {
    let factory = registry.resolve(&device.driver)?;
    debug!("using driver '{}' for device '{}'", device.driver, device.name);
    Ok(factory.build(device)?)
}

/// Runs read-only commands on one device. Success yields one result per
/// command; any failure yields a single failure result for the device.
pub(crate) async fn run_commands(
    registry: &DriverRegistry,
    device: &Device,
    commands: &[String],
    timeout: Option<Duration>,
) -> Vec<CommandResult> {
    let timing = Timing::start();
    match attempt_commands(registry, device, commands, timeout).await {
        Ok(outputs) => {
            let stamps = timing.stamps();
            outputs
                .into_iter()
                .map(|(command, output)| CommandResult::ok(device, command, output, &stamps))
                .collect()
        }
        Err(failure) => {
            warn!(
                "commands failed on device '{}': {}",
                device.name, failure.message
            );
            vec![failure_result(device, failure, &timing)]
        }
    }
}

async fn attempt_commands(
    registry: &DriverRegistry,
    device: &Device,
    commands: &[String],
    timeout: Option<Duration>,
) -> Result<Vec<(String, String)>, Failure> {
    let mut driver = build_driver(registry, device)?;
    let limit = timeout.unwrap_or(DEFAULT_OPERATION_TIMEOUT);
    let outputs = tokio::time::timeout(limit, driver.run_commands(commands))
        .await
        .map_err(|_| Failure::timeout(limit))?
        .map_err(Failure::from)?;

    // Shape check: drivers must answer each command, in request order.
    if outputs.len() != commands.len() {
        return Err(Failure::contract(format!(
            "driver '{}' returned {} result(s) for {} command(s)",
            device.driver,
            outputs.len(),
            commands.len()
        )));
    }
    for (requested, (answered, _)) in commands.iter().zip(&outputs) {
        if requested != answered {
            return Err(Failure::contract(format!(
                "driver '{}' answered '{answered}' where '{requested}' was requested",
                device.driver
            )));
        }
    }
    Ok(outputs)
}

/// Retrieves a device's configuration: explicit commands when given,
/// otherwise the platform table's commands for the device's platform.
pub(crate) async fn get_config(
    registry: &DriverRegistry,
    device: &Device,
    commands: Option<&[String]>,
    timeout: Option<Duration>,
) -> Vec<CommandResult> {
    match commands {
        Some(commands) => run_commands(registry, device, commands, timeout).await,
        None => match platform_commands(device) {
            Ok(commands) => run_commands(registry, device, &commands, timeout).await,
            Err(failure) => {
                warn!(
                    "get_config failed on device '{}': {}",
                    device.name, failure.message
                );
                vec![CommandResult::failed(
                    &device.name,
                    &device.host,
                    failure.kind,
                    failure.message,
                    None,
                )]
            }
        },
    }
}

fn platform_commands(device: &Device) -> Result<Vec<String>, Failure> {
    let platform = device.platform.as_deref().ok_or_else(|| {
        Failure::unsupported(format!(
            "platform not specified for device '{}'; pass explicit commands instead",
            device.name
        ))
    })?;
    let entry = platforms::lookup(platform).ok_or_else(|| {
        Failure::unsupported(format!(
            "platform '{platform}' is not supported for get_config; pass explicit commands instead"
        ))
    })?;
    Ok(entry
        .get_config_commands
        .iter()
        .map(|command| command.to_string())
        .collect())
}

/// Pushes configuration to one device, yielding a single result either
/// way.
pub(crate) async fn send_config(
    registry: &DriverRegistry,
    device: &Device,
    commands: &[String],
    commit: bool,
    timeout: Option<Duration>,
) -> CommandResult {
    let timing = Timing::start();
    match attempt_config(registry, device, commands, commit, timeout).await {
        Ok(output) => CommandResult::config_ok(device, output, &timing.stamps()),
        Err(failure) => {
            warn!(
                "send_config failed on device '{}': {}",
                device.name, failure.message
            );
            failure_result(device, failure, &timing)
        }
    }
}

async fn attempt_config(
    registry: &DriverRegistry,
    device: &Device,
    commands: &[String],
    commit: bool,
    timeout: Option<Duration>,
) -> Result<String, Failure> {
    let mut driver = build_driver(registry, device)?;
    let limit = timeout.unwrap_or(DEFAULT_OPERATION_TIMEOUT);
    let output = tokio::time::timeout(limit, driver.send_config(commands, commit))
        .await
        .map_err(|_| Failure::timeout(limit))?
        .map_err(Failure::from)?;
    Ok(output)
}

/// Probes one device's liveness, yielding a single result either way.
pub(crate) async fn is_alive(
    registry: &DriverRegistry,
    device: &Device,
    timeout: Option<Duration>,
) -> PingResult {
    let timing = Timing::start();
    match attempt_probe(registry, device, timeout).await {
        Ok(alive) => PingResult::ok(device, alive, &timing.stamps()),
        Err(failure) => {
            warn!(
                "liveness probe failed on device '{}': {}",
                device.name, failure.message
            );
            PingResult::failed(
                &device.name,
                &device.host,
                failure.kind,
                failure.message,
                Some(&timing.stamps()),
            )
        }
    }
}

async fn attempt_probe(
    registry: &DriverRegistry,
    device: &Device,
    timeout: Option<Duration>,
) -> Result<bool, Failure> {
    let mut driver = build_driver(registry, device)?;
    let limit = timeout.unwrap_or(DEFAULT_OPERATION_TIMEOUT);
    let alive = tokio::time::timeout(limit, driver.is_alive())
        .await
        .map_err(|_| Failure::timeout(limit))?
        .map_err(Failure::from)?;
    Ok(alive)
}

fn failure_result(device: &Device, failure: Failure, timing: &Timing) -> CommandResult {
    let stamps: Stamps = timing.stamps();
    CommandResult::failed(
        &device.name,
        &device.host,
        failure.kind,
        failure.message,
        Some(&stamps),
    )
}
