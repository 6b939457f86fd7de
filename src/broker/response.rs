//! Typed, serializable operation results.
//!
//! Every broker operation resolves to one of these shapes, for every
//! device, whether the device succeeded, failed, timed out, or its task
//! panicked. Absent optional fields are omitted from serialized output, so
//! a success record carries no `error`/`error_type` noise and a failure
//! record carries no `output`.

use std::ops::Index;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::error::ErrorKind;

/// Wall-clock + monotonic capture around one device operation.
pub(crate) struct Timing {
    started: DateTime<Utc>,
    clock: Instant,
}

impl Timing {
    pub(crate) fn start() -> Self {
        Self {
            started: Utc::now(),
            clock: Instant::now(),
        }
    }

    /// Finalizes into serializable start/end/elapsed strings.
    pub(crate) fn stamps(&self) -> Stamps {
        let elapsed = self.clock.elapsed();
        let ended = self.started
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        Stamps {
            start: self.started.to_rfc3339_opts(SecondsFormat::Millis, true),
            end: ended.to_rfc3339_opts(SecondsFormat::Millis, true),
            elapsed: format!("{:.3}s", elapsed.as_secs_f64()),
        }
    }
}

/// Rendered timing fields for one result.
pub(crate) struct Stamps {
    pub(crate) start: String,
    pub(crate) end: String,
    pub(crate) elapsed: String,
}

/// Result of running one command on one device, or of a device-level
/// failure that prevented any command from running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Device name the result belongs to.
    pub name: String,

    /// Device network address.
    pub host: String,

    /// The command that produced this result. Absent on device-level
    /// failures and on configuration pushes, where no single command
    /// applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Raw output text. Absent on failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Whether the operation succeeded on this device.
    pub success: bool,

    /// Operation start time, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    /// Operation end time, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,

    /// Elapsed wall time, e.g. `"1.234s"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<String>,

    /// Human-readable failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Stable failure classification tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
}

impl CommandResult {
    pub(crate) fn ok(device: &Device, command: String, output: String, stamps: &Stamps) -> Self {
        Self {
            name: device.name.clone(),
            host: device.host.clone(),
            command: Some(command),
            output: Some(output),
            success: true,
            start: Some(stamps.start.clone()),
            end: Some(stamps.end.clone()),
            elapsed: Some(stamps.elapsed.clone()),
            error: None,
            error_type: None,
        }
    }

    /// Success shape for a configuration push: combined response text, no
    /// single command attribution.
    pub(crate) fn config_ok(device: &Device, output: String, stamps: &Stamps) -> Self {
        Self {
            name: device.name.clone(),
            host: device.host.clone(),
            command: None,
            output: Some(output),
            success: true,
            start: Some(stamps.start.clone()),
            end: Some(stamps.end.clone()),
            elapsed: Some(stamps.elapsed.clone()),
            error: None,
            error_type: None,
        }
    }

    pub(crate) fn failed(
        name: &str,
        host: &str,
        kind: ErrorKind,
        message: String,
        stamps: Option<&Stamps>,
    ) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            command: None,
            output: None,
            success: false,
            start: stamps.map(|s| s.start.clone()),
            end: stamps.map(|s| s.end.clone()),
            elapsed: stamps.map(|s| s.elapsed.clone()),
            error: Some(message),
            error_type: Some(kind),
        }
    }

    /// True when the operation succeeded on this device.
    pub fn is_success(&self) -> bool {
        self.success
    }
}

/// Result of a liveness probe against one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResult {
    /// Device name the result belongs to.
    pub name: String,

    /// Device network address.
    pub host: String,

    /// Whether the device answered the probe. A completed probe against a
    /// down device is `alive: false` with `success: true`.
    pub alive: bool,

    /// Whether the probe itself completed without faulting.
    pub success: bool,

    /// Probe start time, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    /// Probe end time, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,

    /// Elapsed wall time, e.g. `"1.234s"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<String>,

    /// Human-readable failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Stable failure classification tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
}

impl PingResult {
    pub(crate) fn ok(device: &Device, alive: bool, stamps: &Stamps) -> Self {
        Self {
            name: device.name.clone(),
            host: device.host.clone(),
            alive,
            success: true,
            start: Some(stamps.start.clone()),
            end: Some(stamps.end.clone()),
            elapsed: Some(stamps.elapsed.clone()),
            error: None,
            error_type: None,
        }
    }

    pub(crate) fn failed(
        name: &str,
        host: &str,
        kind: ErrorKind,
        message: String,
        stamps: Option<&Stamps>,
    ) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            alive: false,
            success: false,
            start: stamps.map(|s| s.start.clone()),
            end: stamps.map(|s| s.end.clone()),
            elapsed: stamps.map(|s| s.elapsed.clone()),
            error: Some(message),
            error_type: Some(kind),
        }
    }

    /// True when the probe completed without faulting.
    pub fn is_success(&self) -> bool {
        self.success
    }
}

macro_rules! result_collection {
    ($(#[$meta:meta])* $name:ident, $item:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Vec<$item>);

        impl $name {
            /// Number of results.
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// True when there are no results.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// The result at `index`, if present.
            pub fn get(&self, index: usize) -> Option<&$item> {
                self.0.get(index)
            }

            /// Iterates results in order.
            pub fn iter(&self) -> std::slice::Iter<'_, $item> {
                self.0.iter()
            }

            /// True when every result succeeded.
            pub fn all_succeeded(&self) -> bool {
                self.0.iter().all(|r| r.is_success())
            }

            /// Iterates only the failed results.
            pub fn failures(&self) -> impl Iterator<Item = &$item> {
                self.0.iter().filter(|r| !r.is_success())
            }

            /// Consumes the collection, yielding the inner vector.
            pub fn into_inner(self) -> Vec<$item> {
                self.0
            }
        }

        impl From<Vec<$item>> for $name {
            fn from(results: Vec<$item>) -> Self {
                Self(results)
            }
        }

        impl Index<usize> for $name {
            type Output = $item;

            fn index(&self, index: usize) -> &$item {
                &self.0[index]
            }
        }

        impl<'a> IntoIterator for &'a $name {
            type Item = &'a $item;
            type IntoIter = std::slice::Iter<'a, $item>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.iter()
            }
        }

        impl IntoIterator for $name {
            type Item = $item;
            type IntoIter = std::vec::IntoIter<$item>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.into_iter()
            }
        }
    };
}

result_collection!(
    /// Ordered command results across a whole batch.
    CommandResults,
    CommandResult
);

result_collection!(
    /// Ordered liveness results across a whole batch.
    PingResults,
    PingResult
);
