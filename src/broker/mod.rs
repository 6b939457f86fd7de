//! Parallel fan-out execution of device operations.
//!
//! The [`Broker`] is the composition root: it owns a shared
//! [`DriverRegistry`] and turns "run this against these devices" into one
//! concurrent task per device, then collects the per-device results.
//!
//! Two consumption shapes are offered for every operation:
//!
//! - **batch**: wait for every device, results in inventory order
//! - **streaming**: a [`ResultStream`] yielding each device's result the
//!   moment it finishes, fastest device first
//!
//! Either way the accounting invariant holds: one result entry per device,
//! no matter which devices failed, timed out, or panicked.

mod handler;
mod response;
mod stream;

pub use response::{CommandResult, CommandResults, PingResult, PingResults};
pub use stream::{DeviceOutcome, ResultStream};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use self::stream::TaskSet;
use crate::device::{Device, Inventory};
use crate::driver::DriverRegistry;
use crate::error::{Error, Result};

/// Executes device operations across an inventory in parallel.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct Broker {
    registry: Arc<DriverRegistry>,
}

impl Broker {
    /// Creates a broker over a shared registry.
    pub fn new(registry: Arc<DriverRegistry>) -> Self {
        Self { registry }
    }

    /// Creates a broker with only the built-in drivers registered.
    pub fn with_builtin_drivers() -> Self {
        Self::new(Arc::new(DriverRegistry::with_builtin_drivers()))
    }

    /// The registry this broker resolves drivers from.
    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Runs read-only commands on every device, waiting for all of them.
    ///
    /// Results are flattened in inventory order: each successful device
    /// contributes one entry per command, each failed device contributes
    /// exactly one failure entry.
    pub async fn run_commands(
        &self,
        inventory: &Inventory,
        commands: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandResults> {
        let tasks = self.spawn_run_commands(inventory, commands, timeout)?;
        info!(
            "running {} command(s) on {} device(s)",
            commands.len(),
            inventory.len()
        );
        let per_device = collect_ordered(tasks).await;
        Ok(per_device.into_iter().flatten().collect::<Vec<_>>().into())
    }

    /// Like [`run_commands`](Broker::run_commands), but yields each
    /// device's results as that device finishes.
    pub fn run_commands_streaming(
        &self,
        inventory: &Inventory,
        commands: &[String],
        timeout: Option<Duration>,
    ) -> Result<ResultStream<Vec<CommandResult>>> {
        let tasks = self.spawn_run_commands(inventory, commands, timeout)?;
        Ok(ResultStream::new(tasks))
    }

    fn spawn_run_commands(
        &self,
        inventory: &Inventory,
        commands: &[String],
        timeout: Option<Duration>,
    ) -> Result<TaskSet<Vec<CommandResult>>> {
        ensure_commands(commands)?;
        ensure_devices(inventory)?;
        let commands: Arc<[String]> = commands.into();
        Ok(self.spawn_tasks(inventory, |registry, device| {
            let commands = Arc::clone(&commands);
            async move { handler::run_commands(&registry, &device, &commands, timeout).await }
        }))
    }

    /// Retrieves configuration from every device, waiting for all of them.
    ///
    /// With `commands: None`, each device's platform decides which
    /// commands run; a device with no platform (or an unknown one) yields
    /// a failure entry rather than failing the batch.
    pub async fn get_config(
        &self,
        inventory: &Inventory,
        commands: Option<&[String]>,
        timeout: Option<Duration>,
    ) -> Result<CommandResults> {
        let tasks = self.spawn_get_config(inventory, commands, timeout)?;
        info!("retrieving configuration from {} device(s)", inventory.len());
        let per_device = collect_ordered(tasks).await;
        Ok(per_device.into_iter().flatten().collect::<Vec<_>>().into())
    }

    /// Like [`get_config`](Broker::get_config), but yields each device's
    /// results as that device finishes.
    pub fn get_config_streaming(
        &self,
        inventory: &Inventory,
        commands: Option<&[String]>,
        timeout: Option<Duration>,
    ) -> Result<ResultStream<Vec<CommandResult>>> {
        let tasks = self.spawn_get_config(inventory, commands, timeout)?;
        Ok(ResultStream::new(tasks))
    }

    fn spawn_get_config(
        &self,
        inventory: &Inventory,
        commands: Option<&[String]>,
        timeout: Option<Duration>,
    ) -> Result<TaskSet<Vec<CommandResult>>> {
        if let Some(commands) = commands {
            ensure_commands(commands)?;
        }
        ensure_devices(inventory)?;
        let commands: Option<Arc<[String]>> = commands.map(Arc::from);
        Ok(self.spawn_tasks(inventory, |registry, device| {
            let commands = commands.clone();
            async move { handler::get_config(&registry, &device, commands.as_deref(), timeout).await }
        }))
    }

    /// Pushes configuration to every device, waiting for all of them.
    /// Exactly one result entry per device either way.
    pub async fn send_config(
        &self,
        inventory: &Inventory,
        commands: &[String],
        commit: bool,
        timeout: Option<Duration>,
    ) -> Result<CommandResults> {
        let tasks = self.spawn_send_config(inventory, commands, commit, timeout)?;
        info!(
            "pushing {} configuration line(s) to {} device(s)",
            commands.len(),
            inventory.len()
        );
        Ok(collect_ordered(tasks).await.into())
    }

    /// Like [`send_config`](Broker::send_config), but yields each device's
    /// result as that device finishes.
    pub fn send_config_streaming(
        &self,
        inventory: &Inventory,
        commands: &[String],
        commit: bool,
        timeout: Option<Duration>,
    ) -> Result<ResultStream<CommandResult>> {
        let tasks = self.spawn_send_config(inventory, commands, commit, timeout)?;
        Ok(ResultStream::new(tasks))
    }

    fn spawn_send_config(
        &self,
        inventory: &Inventory,
        commands: &[String],
        commit: bool,
        timeout: Option<Duration>,
    ) -> Result<TaskSet<CommandResult>> {
        ensure_commands(commands)?;
        ensure_devices(inventory)?;
        let commands: Arc<[String]> = commands.into();
        Ok(self.spawn_tasks(inventory, |registry, device| {
            let commands = Arc::clone(&commands);
            async move {
                handler::send_config(&registry, &device, &commands, commit, timeout).await
            }
        }))
    }

    /// Probes every device's liveness, waiting for all of them. Exactly
    /// one result entry per device.
    pub async fn is_alive(
        &self,
        inventory: &Inventory,
        timeout: Option<Duration>,
    ) -> Result<PingResults> {
        let tasks = self.spawn_is_alive(inventory, timeout)?;
        info!("probing liveness of {} device(s)", inventory.len());
        Ok(collect_ordered(tasks).await.into())
    }

    /// Like [`is_alive`](Broker::is_alive), but yields each device's
    /// result as that device finishes.
    pub fn is_alive_streaming(
        &self,
        inventory: &Inventory,
        timeout: Option<Duration>,
    ) -> Result<ResultStream<PingResult>> {
        let tasks = self.spawn_is_alive(inventory, timeout)?;
        Ok(ResultStream::new(tasks))
    }

    fn spawn_is_alive(
        &self,
        inventory: &Inventory,
        timeout: Option<Duration>,
    ) -> Result<TaskSet<PingResult>> {
        ensure_devices(inventory)?;
        Ok(self.spawn_tasks(inventory, |registry, device| async move {
            handler::is_alive(&registry, &device, timeout).await
        }))
    }

    /// Spawns one task per device. Tasks start immediately; collection
    /// strategy (ordered batch vs completion stream) is the caller's
    /// business.
    fn spawn_tasks<T, F, Fut>(&self, inventory: &Inventory, make: F) -> TaskSet<T>
    where
        T: DeviceOutcome,
        F: Fn(Arc<DriverRegistry>, Device) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut tasks = TaskSet::new(
            inventory
                .iter()
                .map(|device| (device.name.clone(), device.host.clone()))
                .collect(),
        );
        for (index, device) in inventory.iter().enumerate() {
            tasks.spawn(index, make(Arc::clone(&self.registry), device.clone()));
        }
        tasks
    }
}

/// Joins every task and reassembles payloads in inventory order.
async fn collect_ordered<T: DeviceOutcome>(mut tasks: TaskSet<T>) -> Vec<T> {
    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None)
        .take(tasks.device_count())
        .collect();
    while let Some((index, payload)) = tasks.join_next().await {
        slots[index] = Some(payload);
    }
    slots.into_iter().flatten().collect()
}

fn ensure_commands(commands: &[String]) -> Result<()> {
    if commands.is_empty() {
        return Err(Error::Precondition(
            "commands must contain at least one command".to_string(),
        ));
    }
    Ok(())
}

fn ensure_devices(inventory: &Inventory) -> Result<()> {
    if inventory.is_empty() {
        return Err(Error::Precondition(
            "inventory must contain at least one device".to_string(),
        ));
    }
    Ok(())
}
