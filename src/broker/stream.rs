//! Completion-order result streaming.

use std::collections::HashMap;

use log::warn;
use tokio::task::{self, JoinSet};

use super::response::{CommandResult, PingResult};
use crate::error::ErrorKind;

/// A per-device result payload produced by a broker task.
///
/// The broker promises one payload per device even when a task panics; the
/// `internal_failure` constructor builds the synthetic failure shape used
/// in that case.
pub trait DeviceOutcome: Send + 'static {
    /// Builds the failure payload reported when a device's task faulted
    /// instead of returning.
    fn internal_failure(name: &str, host: &str, message: &str) -> Self;
}

impl DeviceOutcome for CommandResult {
    fn internal_failure(name: &str, host: &str, message: &str) -> Self {
        CommandResult::failed(
            name,
            host,
            ErrorKind::Unexpected,
            message.to_string(),
            None,
        )
    }
}

impl DeviceOutcome for Vec<CommandResult> {
    fn internal_failure(name: &str, host: &str, message: &str) -> Self {
        vec![CommandResult::internal_failure(name, host, message)]
    }
}

impl DeviceOutcome for PingResult {
    fn internal_failure(name: &str, host: &str, message: &str) -> Self {
        PingResult::failed(name, host, ErrorKind::Unexpected, message.to_string(), None)
    }
}

/// One spawned task per device, joined in completion order.
///
/// Dropping the set aborts every task still running, which is how broker
/// cancellation propagates to in-flight device work.
pub(crate) struct TaskSet<T> {
    set: JoinSet<(usize, T)>,
    index_of: HashMap<task::Id, usize>,
    /// `(name, host)` per input index, for synthesizing failure payloads.
    devices: Vec<(String, String)>,
}

impl<T: DeviceOutcome> TaskSet<T> {
    pub(crate) fn new(devices: Vec<(String, String)>) -> Self {
        Self {
            set: JoinSet::new(),
            index_of: HashMap::with_capacity(devices.len()),
            devices,
        }
    }

    pub(crate) fn spawn<F>(&mut self, index: usize, fut: F)
    where
        F: std::future::Future<Output = T> + Send + 'static,
    {
        let handle = self.set.spawn(async move { (index, fut.await) });
        self.index_of.insert(handle.id(), index);
    }

    pub(crate) fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.set.len()
    }

    /// Joins the next finished task. A panicked task yields a synthetic
    /// failure payload for its device, so callers always see one payload
    /// per spawned device.
    pub(crate) async fn join_next(&mut self) -> Option<(usize, T)> {
        loop {
            match self.set.join_next_with_id().await? {
                Ok((id, (index, payload))) => {
                    self.index_of.remove(&id);
                    return Some((index, payload));
                }
                Err(err) => {
                    if err.is_cancelled() {
                        continue;
                    }
                    let Some(index) = self.index_of.remove(&err.id()) else {
                        continue;
                    };
                    let (name, host) = &self.devices[index];
                    warn!("task for device '{name}' panicked: {err}");
                    let message = format!("internal fault while operating on '{name}': {err}");
                    return Some((index, T::internal_failure(name, host, &message)));
                }
            }
        }
    }
}

/// Streams per-device results in completion order.
///
/// Produced by the broker's `*_streaming` entry points. Call
/// [`next`](ResultStream::next) until it returns `None`; exactly one item
/// is yielded per device in the inventory, fastest device first. Dropping
/// the stream early cancels all in-flight device tasks.
pub struct ResultStream<T> {
    tasks: TaskSet<T>,
}

impl<T: DeviceOutcome> ResultStream<T> {
    pub(crate) fn new(tasks: TaskSet<T>) -> Self {
        Self { tasks }
    }

    /// The next finished device's payload, or `None` when every device has
    /// reported.
    pub async fn next(&mut self) -> Option<T> {
        self.tasks.join_next().await.map(|(_, payload)| payload)
    }

    /// Number of devices that have not reported yet.
    pub fn remaining(&self) -> usize {
        self.tasks.remaining()
    }

    /// Total number of devices this stream covers.
    pub fn device_count(&self) -> usize {
        self.tasks.device_count()
    }
}
