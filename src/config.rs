// MIT License - Copyright (c) 2026 Peter Wright
// Connection configuration

use crate::error::{PulsonError, Result};

/// Default MQTT-over-TLS port of the Pulson cloud broker.
pub const DEFAULT_PORT: u16 = 8883;

/// Factory default user code accepted by the panel firmware.
pub const DEFAULT_USER_CODE: &str = "8888";

/// Configuration for connecting to the MQTT broker that relays a panel.
///
/// Built once at startup and never mutated afterwards; the panel and the
/// connection only ever hold clones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Broker host name
    pub host: String,
    /// Broker port (default: 8883)
    pub port: u16,
    /// Broker user name
    pub username: String,
    /// Broker password
    pub password: String,
    /// Panel serial number, the root of the topic namespace
    pub serial_number: String,
    /// Default user code for authorized commands (default: 8888)
    pub user_code: String,
    /// MQTT client identifier. Empty means `pulson-alarm-{serial}`.
    pub client_id: String,
    /// Whether to use TLS (default: true)
    pub tls: bool,
    /// MQTT keep-alive in seconds (default: 60)
    pub keep_alive_secs: u64,
    /// How long `start` waits for the broker to accept the session
    pub connect_timeout_ms: u64,
    /// Base delay for exponential backoff between start attempts
    pub reconnect_delay_ms: u64,
    /// Maximum number of retries on transient start errors (0 = no retries)
    pub max_connect_retries: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: String::new(),
            password: String::new(),
            serial_number: String::new(),
            user_code: DEFAULT_USER_CODE.to_string(),
            client_id: String::new(),
            tls: true,
            keep_alive_secs: 60,
            connect_timeout_ms: 5000,
            reconnect_delay_ms: 5000,
            max_connect_retries: 3,
        }
    }
}

impl ConnectionConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Effective MQTT client identifier.
    pub fn effective_client_id(&self) -> String {
        if self.client_id.is_empty() {
            format!("pulson-alarm-{}", self.serial_number)
        } else {
            self.client_id.clone()
        }
    }

    /// Check the fields a session cannot work without.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(PulsonError::InvalidConfig {
                field: "host",
                reason: "must not be empty".to_string(),
            });
        }
        if self.serial_number.trim().is_empty() {
            return Err(PulsonError::InvalidConfig {
                field: "serial_number",
                reason: "must not be empty".to_string(),
            });
        }
        if self.serial_number.contains(['/', '#', '+']) {
            return Err(PulsonError::InvalidConfig {
                field: "serial_number",
                reason: "must not contain MQTT topic separators or wildcards".to_string(),
            });
        }
        if self.keep_alive_secs == 0 {
            return Err(PulsonError::InvalidConfig {
                field: "keep_alive_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for ConnectionConfig.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn serial_number(mut self, serial: impl Into<String>) -> Self {
        self.config.serial_number = serial.into();
        self
    }

    pub fn user_code(mut self, code: impl Into<String>) -> Self {
        self.config.user_code = code.into();
        self
    }

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.config.client_id = id.into();
        self
    }

    pub fn tls(mut self, tls: bool) -> Self {
        self.config.tls = tls;
        self
    }

    pub fn keep_alive_secs(mut self, secs: u64) -> Self {
        self.config.keep_alive_secs = secs;
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    pub fn reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.reconnect_delay_ms = ms;
        self
    }

    pub fn max_connect_retries(mut self, retries: u32) -> Self {
        self.config.max_connect_retries = retries;
        self
    }

    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}
