//! Error types for netbroker.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for netbroker operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Driver registry errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Driver-level errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Inventory errors
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Caller-side precondition violations. These indicate a bug in the
    /// calling code (empty command list, empty inventory) and are raised
    /// before any device work is started.
    #[error("Precondition violated: {0}")]
    Precondition(String),
}

/// Driver registry errors (name resolution).
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No factory registered under the requested name.
    #[error("unknown driver '{name}' (registered drivers: {})", registered.join(", "))]
    UnknownDriver {
        name: String,
        registered: Vec<String>,
    },

    /// A factory is already registered under this name.
    #[error("driver '{name}' is already registered")]
    AlreadyRegistered { name: String },
}

/// Driver layer errors (connection, authentication, execution).
#[derive(Error, Debug)]
pub enum DriverError {
    /// Failed to reach the device.
    #[error("connection failed to {host}:{port}: {message}")]
    ConnectionFailed {
        host: String,
        port: u16,
        message: String,
    },

    /// The device rejected the credentials.
    #[error("authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// The operation deadline elapsed.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Driver options could not be built for a device.
    #[error("invalid driver options: {message}")]
    InvalidOptions { message: String },

    /// The backend returned a response that violates the driver contract.
    #[error("driver contract violated: {message}")]
    Contract { message: String },

    /// Any other backend failure.
    #[error("{message}")]
    Backend { message: String },
}

/// Inventory errors (parsing, strict validation).
#[derive(Error, Debug)]
pub enum InventoryError {
    /// The inventory payload could not be parsed.
    #[error("invalid inventory payload: {message}")]
    Parse { message: String },

    /// The payload has no `inventory_nodes` array.
    #[error("inventory missing required field 'inventory_nodes'")]
    MissingNodes,

    /// Two devices share the same name.
    #[error("duplicate device name '{name}'")]
    DuplicateName { name: String },

    /// Strict construction found one or more invalid devices. All errors
    /// from the validation pass are reported together.
    #[error("inventory validation failed with {} error(s):\n  {}", errors.len(), errors.join("\n  "))]
    Validation { errors: Vec<String> },
}

/// Stable classification tag carried on failure results.
///
/// The serialized names are part of the result output format and must not
/// change: downstream consumers dispatch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The per-operation deadline elapsed.
    #[serde(rename = "TimeoutError")]
    Timeout,

    /// The device could not be reached.
    #[serde(rename = "ConnectionError")]
    Connection,

    /// The device rejected the credentials.
    #[serde(rename = "AuthenticationError")]
    Authentication,

    /// A backend/driver failure, including contract setup problems.
    #[serde(rename = "DriverError")]
    Driver,

    /// The backend returned a malformed response.
    #[serde(rename = "ContractError")]
    Contract,

    /// The device's driver name or options could not be resolved.
    #[serde(rename = "ResolveError")]
    Resolve,

    /// An internal fault (e.g. a panicked device task).
    #[serde(rename = "UnexpectedError")]
    Unexpected,
}

impl ErrorKind {
    /// The serialized tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Connection => "ConnectionError",
            ErrorKind::Authentication => "AuthenticationError",
            ErrorKind::Driver => "DriverError",
            ErrorKind::Contract => "ContractError",
            ErrorKind::Resolve => "ResolveError",
            ErrorKind::Unexpected => "UnexpectedError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&DriverError> for ErrorKind {
    fn from(err: &DriverError) -> Self {
        match err {
            DriverError::ConnectionFailed { .. } => ErrorKind::Connection,
            DriverError::AuthenticationFailed { .. } => ErrorKind::Authentication,
            DriverError::Timeout(_) => ErrorKind::Timeout,
            DriverError::InvalidOptions { .. } => ErrorKind::Resolve,
            DriverError::Contract { .. } => ErrorKind::Contract,
            DriverError::Backend { .. } => ErrorKind::Driver,
        }
    }
}

/// Result type alias using netbroker's Error.
pub type Result<T> = std::result::Result<T, Error>;
