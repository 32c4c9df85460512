use std::time::Duration;

use crate::error::{Result, SupernetError};
use crate::types::Network;

/// Default Supernet API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.sogni.ai";

/// Client configuration.
///
/// Immutable after construction; defaults are applied once by the builder and
/// never re-validated later. Use [`ClientConfig::builder()`].
///
/// # Example
/// ```
/// use supernet_rs::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::builder("artist", "hunter2")
///     .with_reconnect_interval(Duration::from_secs(10))
///     .build();
/// assert!(config.auto_connect);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Supernet account username.
    pub username: String,

    /// Supernet account password.
    pub password: String,

    /// Application id sent with every session. Generated when not supplied.
    pub app_id: String,

    /// Which Supernet to submit work to.
    pub network: Network,

    /// Connect during [`SupernetClient::new`](crate::SupernetClient::new).
    pub auto_connect: bool,

    /// Schedule reconnection after a failed or lost connection.
    pub reconnect: bool,

    /// Fixed delay between reconnection attempts.
    pub reconnect_interval: Duration,

    /// Default per-project completion timeout.
    pub timeout: Duration,

    /// Enable verbose connection diagnostics.
    pub debug: bool,

    /// Base URL of the Supernet API.
    pub endpoint: String,
}

impl ClientConfig {
    /// Start building a config for the given credentials.
    pub fn builder(username: impl Into<String>, password: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: ClientConfig {
                username: username.into(),
                password: password.into(),
                app_id: uuid::Uuid::new_v4().to_string(),
                network: Network::default(),
                auto_connect: true,
                reconnect: true,
                reconnect_interval: Duration::from_secs(5),
                timeout: Duration::from_secs(300),
                debug: false,
                endpoint: DEFAULT_ENDPOINT.to_string(),
            },
        }
    }

    /// Check every field constraint, failing on the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(SupernetError::Validation {
                field: "username",
                message: "username is required".into(),
            });
        }
        if self.password.is_empty() {
            return Err(SupernetError::Validation {
                field: "password",
                message: "password is required".into(),
            });
        }
        if self.reconnect_interval.is_zero() {
            return Err(SupernetError::Validation {
                field: "reconnect_interval",
                message: "reconnect interval must be greater than zero".into(),
            });
        }
        if self.timeout.is_zero() {
            return Err(SupernetError::Validation {
                field: "timeout",
                message: "timeout must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Use a specific application id instead of a generated one.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.config.app_id = app_id.into();
        self
    }

    /// Select the Supernet to submit work to.
    pub fn with_network(mut self, network: Network) -> Self {
        self.config.network = network;
        self
    }

    /// Connect immediately during client construction (default true).
    pub fn with_auto_connect(mut self, enabled: bool) -> Self {
        self.config.auto_connect = enabled;
        self
    }

    /// Enable or disable automatic reconnection (default true).
    pub fn with_reconnect(mut self, enabled: bool) -> Self {
        self.config.reconnect = enabled;
        self
    }

    /// Set the fixed delay between reconnection attempts (default 5 s).
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect_interval = interval;
        self
    }

    /// Set the default project completion timeout (default 300 s).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Enable verbose connection diagnostics (default false).
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Point the client at a different API endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the final [`ClientConfig`].
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
