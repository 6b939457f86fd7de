//! Built-in SSH driver using exec channels.
//!
//! This backend opens one SSH session per operation and runs each command
//! on its own exec channel, reading output until the channel closes. It
//! does not allocate a PTY or scrape prompts, so it suits devices and
//! servers whose CLI behaves over `exec` (Linux boxes, JunOS, RouterOS,
//! and similar).
//!
//! Host keys are not verified: the driver targets automation against
//! managed inventories, matching the usual posture of network automation
//! backends.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg, Disconnect};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::device::Device;
use crate::driver::{Driver, DriverFactory};
use crate::error::DriverError;

/// Port used when neither the options nor the device specify one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Connect timeout when the options do not specify one.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection options for the SSH driver.
///
/// Every field is optional in the per-device override blob; fields left
/// unset are filled from the device record by [`SshOptions::from_device`].
/// The schema is closed, so a misspelled option name fails resolution
/// instead of being ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SshOptions {
    /// Target address. Falls back to the device's `host`.
    pub host: Option<String>,

    /// Target port. Falls back to the device's `port`, then 22.
    pub port: Option<u16>,

    /// Login username. Falls back to the device's `user`.
    pub username: Option<String>,

    /// Login password. Falls back to the device's `password`.
    pub password: Option<SecretString>,

    /// Privilege escalation password. Falls back to the device's
    /// `escalate_password`. Unused by the exec backend itself but kept so
    /// override blobs written for richer backends still parse.
    pub enable_password: Option<SecretString>,

    /// TCP connect + handshake deadline in seconds.
    pub connect_timeout: Option<u64>,

    /// Path to a private key used instead of password authentication.
    pub private_key: Option<PathBuf>,

    /// Passphrase for the private key.
    pub private_key_passphrase: Option<SecretString>,
}

impl SshOptions {
    /// Builds options for a device: the device's own override blob first,
    /// then unset fields filled from the device record.
    ///
    /// Precedence per field is override > device attribute > driver
    /// default, so an inventory can share credentials at the device level
    /// and still pin e.g. a non-standard port for one driver.
    pub fn from_device(device: &Device) -> Result<Self, DriverError> {
        let mut options = match device.driver_overrides() {
            Some(overrides) => serde_json::from_value(overrides.clone()).map_err(|err| {
                DriverError::InvalidOptions {
                    message: format!("device '{}': {err}", device.name),
                }
            })?,
            None => Self::default(),
        };

        if options.host.is_none() {
            options.host = Some(device.host.clone());
        }
        if options.port.is_none() {
            options.port = device.port;
        }
        if options.username.is_none() {
            options.username = device.user.clone();
        }
        if options.password.is_none() {
            options.password = device.password.clone();
        }
        if options.enable_password.is_none() {
            options.enable_password = device.escalate_password.clone();
        }
        Ok(options)
    }

    fn connect_timeout(&self) -> Duration {
        self.connect_timeout
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT)
    }
}

/// Exec-mode SSH driver. One instance serves one broker operation.
pub struct SshDriver {
    options: SshOptions,
}

impl SshDriver {
    /// Creates a driver from resolved options.
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    fn target(&self) -> Result<(String, u16), DriverError> {
        let host = self
            .options
            .host
            .clone()
            .ok_or_else(|| DriverError::InvalidOptions {
                message: "host is required".to_string(),
            })?;
        Ok((host, self.options.port.unwrap_or(DEFAULT_SSH_PORT)))
    }

    /// Connect to the server and authenticate.
    async fn connect(&self) -> Result<Handle<SshHandler>, DriverError> {
        let (host, port) = self.target()?;
        let timeout = self.options.connect_timeout();

        let config = Arc::new(client::Config {
            inactivity_timeout: Some(timeout),
            ..Default::default()
        });

        debug!("connecting to {host}:{port}");
        let mut session = tokio::time::timeout(
            timeout,
            client::connect(config, (host.as_str(), port), SshHandler),
        )
        .await
        .map_err(|_| DriverError::ConnectionFailed {
            host: host.clone(),
            port,
            message: format!("connect timed out after {timeout:?}"),
        })?
        .map_err(|e| DriverError::ConnectionFailed {
            host: host.clone(),
            port,
            message: e.to_string(),
        })?;

        self.authenticate(&mut session).await?;
        Ok(session)
    }

    /// Authenticate with the server: private key if configured, password
    /// otherwise, `none` as a last resort.
    async fn authenticate(&self, session: &mut Handle<SshHandler>) -> Result<(), DriverError> {
        let username = self
            .options
            .username
            .clone()
            .ok_or_else(|| DriverError::InvalidOptions {
                message: "username is required".to_string(),
            })?;

        let success = if let Some(path) = &self.options.private_key {
            let passphrase = self
                .options
                .private_key_passphrase
                .as_ref()
                .map(|p| p.expose_secret());
            let key = load_secret_key(path, passphrase).map_err(|e| DriverError::Backend {
                message: format!("failed to load private key: {e}"),
            })?;

            let hash_alg = session
                .best_supported_rsa_hash()
                .await
                .map_err(|e| DriverError::Backend {
                    message: e.to_string(),
                })?
                .flatten();

            session
                .authenticate_publickey(
                    &username,
                    PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                )
                .await
                .map_err(|e| DriverError::Backend {
                    message: e.to_string(),
                })?
                .success()
        } else if let Some(password) = &self.options.password {
            session
                .authenticate_password(&username, password.expose_secret())
                .await
                .map_err(|e| DriverError::Backend {
                    message: e.to_string(),
                })?
                .success()
        } else {
            session
                .authenticate_none(&username)
                .await
                .map_err(|e| DriverError::Backend {
                    message: e.to_string(),
                })?
                .success()
        };

        if !success {
            return Err(DriverError::AuthenticationFailed { user: username });
        }
        Ok(())
    }

    /// Run one command on a fresh exec channel and collect its output.
    async fn exec(
        &self,
        session: &Handle<SshHandler>,
        command: &str,
    ) -> Result<String, DriverError> {
        let channel: Channel<Msg> =
            session
                .channel_open_session()
                .await
                .map_err(|e| DriverError::Backend {
                    message: e.to_string(),
                })?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| DriverError::Backend {
                message: e.to_string(),
            })?;

        let mut channel = channel;
        let mut output = Vec::new();
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => output.extend_from_slice(&data),
                ChannelMsg::ExtendedData { data, .. } => output.extend_from_slice(&data),
                _ => {}
            }
        }
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn close(&self, session: Handle<SshHandler>) {
        // Disconnect failures are uninteresting; the session is gone
        // either way.
        let _ = session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await;
    }
}

#[async_trait]
impl Driver for SshDriver {
    async fn run_commands(
        &mut self,
        commands: &[String],
    ) -> Result<Vec<(String, String)>, DriverError> {
        let session = self.connect().await?;
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            let output = self.exec(&session, command).await?;
            results.push((command.clone(), output));
        }
        self.close(session).await;
        Ok(results)
    }

    async fn send_config(
        &mut self,
        commands: &[String],
        commit: bool,
    ) -> Result<String, DriverError> {
        let session = self.connect().await?;
        let mut output = String::new();
        for command in commands {
            output.push_str(&self.exec(&session, command).await?);
        }
        // Exec-mode commit: issue a trailing `commit`, which covers
        // candidate-config platforms reachable over exec (e.g. JunOS
        // `configure ...; commit` one-liners are also common).
        if commit {
            output.push_str(&self.exec(&session, "commit").await?);
        }
        self.close(session).await;
        Ok(output)
    }

    async fn is_alive(&mut self) -> Result<bool, DriverError> {
        match self.connect().await {
            Ok(session) => {
                self.close(session).await;
                Ok(true)
            }
            Err(DriverError::ConnectionFailed { host, port, message }) => {
                debug!("liveness probe failed for {host}:{port}: {message}");
                Ok(false)
            }
            Err(DriverError::AuthenticationFailed { user }) => {
                debug!("liveness probe rejected for user '{user}'");
                Ok(false)
            }
            Err(other) => Err(other),
        }
    }
}

/// Factory for the built-in SSH driver.
pub struct SshFactory;

impl DriverFactory for SshFactory {
    fn build(&self, device: &Device) -> Result<Box<dyn Driver>, DriverError> {
        let options = SshOptions::from_device(device)?;
        Ok(Box::new(SshDriver::new(options)))
    }
}

/// Client handler accepting any host key.
struct SshHandler;

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_options_fall_back_to_device() {
        let device = Device::new("r1", "10.0.0.1")
            .with_port(830)
            .with_user("admin")
            .with_password("secret")
            .with_escalation("enable");
        let options = SshOptions::from_device(&device).unwrap();
        assert_eq!(options.host.as_deref(), Some("10.0.0.1"));
        assert_eq!(options.port, Some(830));
        assert_eq!(options.username.as_deref(), Some("admin"));
        assert_eq!(options.password.unwrap().expose_secret(), "secret");
        assert_eq!(options.enable_password.unwrap().expose_secret(), "enable");
    }

    #[test]
    fn test_overrides_win_over_device() {
        let device = Device::new("r1", "10.0.0.1")
            .with_port(22)
            .with_user("admin")
            .with_driver_options(
                "ssh",
                serde_json::json!({"port": 2222, "username": "automation"}),
            );
        let options = SshOptions::from_device(&device).unwrap();
        assert_eq!(options.port, Some(2222));
        assert_eq!(options.username.as_deref(), Some("automation"));
        // Unset override fields still come from the device.
        assert_eq!(options.host.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let device = Device::new("r1", "10.0.0.1")
            .with_driver_options("ssh", serde_json::json!({"prot": 2222}));
        let err = SshOptions::from_device(&device).unwrap_err();
        assert!(matches!(err, DriverError::InvalidOptions { .. }));
        assert!(err.to_string().contains("r1"));
    }

    #[test]
    fn test_other_drivers_overrides_ignored() {
        let device = Device::new("r1", "10.0.0.1")
            .with_driver_options("telnet", serde_json::json!({"no_such_field": true}));
        let options = SshOptions::from_device(&device).unwrap();
        assert_eq!(options.port, None);
    }

    #[test]
    fn test_default_port_applied_at_connect() {
        let device = Device::new("r1", "10.0.0.1");
        let options = SshOptions::from_device(&device).unwrap();
        let driver = SshDriver::new(options);
        let (host, port) = driver.target().unwrap();
        assert_eq!(host, "10.0.0.1");
        assert_eq!(port, DEFAULT_SSH_PORT);
    }
}
