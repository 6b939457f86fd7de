//! A single inventory device record.

use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;

use crate::driver::DEFAULT_DRIVER;

/// One device in an inventory.
///
/// The schema is closed: unknown attribute names are rejected at parse time
/// so typos surface as errors instead of silently-ignored fields. Secrets
/// are wrapped in [`SecretString`] and never appear in `Debug` output or in
/// serialized results.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Device {
    /// Unique device name within its inventory.
    #[serde(default)]
    pub name: String,

    /// Network address (hostname or IP).
    pub host: String,

    /// Management port. `None` lets the driver pick its own default.
    #[serde(default)]
    pub port: Option<u16>,

    /// Driver registry name used to resolve this device's backend.
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Platform identifier (e.g. `"juniper_junos"`), used to look up
    /// configuration-retrieval commands when the caller passes none.
    #[serde(default)]
    pub platform: Option<String>,

    /// Login username.
    #[serde(default)]
    pub user: Option<String>,

    /// Login password.
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Whether to escalate privileges after login.
    #[serde(default)]
    pub escalate: bool,

    /// Privilege escalation password.
    #[serde(default)]
    pub escalate_password: Option<SecretString>,

    /// Device-specific default command, if any.
    #[serde(default)]
    pub command: Option<String>,

    /// Per-driver option overrides, keyed by driver name. Only the entry
    /// matching [`Device::driver`] is consulted; the rest ride along so one
    /// inventory can serve several driver configurations.
    #[serde(default)]
    pub driver_options: serde_json::Map<String, Value>,
}

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

impl Device {
    /// Creates a device with the default driver and everything else unset.
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: None,
            driver: DEFAULT_DRIVER.to_string(),
            platform: None,
            user: None,
            password: None,
            escalate: false,
            escalate_password: None,
            command: None,
            driver_options: serde_json::Map::new(),
        }
    }

    /// Sets the driver name.
    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    /// Sets the management port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the platform identifier.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Sets the login username.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Sets the login password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Enables privilege escalation with the given password.
    pub fn with_escalation(mut self, password: impl Into<String>) -> Self {
        self.escalate = true;
        self.escalate_password = Some(SecretString::from(password.into()));
        self
    }

    /// Sets option overrides for the named driver.
    pub fn with_driver_options(mut self, driver: impl Into<String>, options: Value) -> Self {
        self.driver_options.insert(driver.into(), options);
        self
    }

    /// The option overrides for this device's own driver, if any.
    pub fn driver_overrides(&self) -> Option<&Value> {
        self.driver_options.get(&self.driver)
    }
}
