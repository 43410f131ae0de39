//! Configuration types for the Wake-on-LAN bridge
//!
//! This module defines all configuration structures used throughout the crate.
//! Configuration is read once at startup and is immutable afterwards.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted heartbeat interval (one day)
pub const MAX_HEARTBEAT_INTERVAL_SECS: u64 = 86_400;

/// Main bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Broker connection settings
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Base topic; commands arrive on `<base>/command`, status goes to `<base>/status`
    #[serde(default = "default_base_topic")]
    pub base_topic: String,

    /// Heartbeat settings
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Wake sequence settings
    #[serde(default)]
    pub wake: WakeConfig,

    /// Session and supervisor timing
    #[serde(default)]
    pub session: SessionConfig,
}

impl BridgeConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            broker: BrokerConfig::default(),
            base_topic: default_base_topic(),
            heartbeat: HeartbeatConfig::default(),
            wake: WakeConfig::default(),
            session: SessionConfig::default(),
        }
    }

    /// Topic the bridge subscribes to for wake commands
    pub fn command_topic(&self) -> String {
        format!("{}/command", self.base_topic)
    }

    /// Topic the bridge publishes `online` / `offline` to
    pub fn status_topic(&self) -> String {
        format!("{}/status", self.base_topic)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.base_topic.is_empty() {
            return Err(crate::Error::config("Base topic cannot be empty"));
        }
        if self.base_topic.contains(['#', '+']) {
            return Err(crate::Error::config(format!(
                "Base topic '{}' cannot contain MQTT wildcards",
                self.base_topic
            )));
        }

        self.broker.validate()?;

        if self.heartbeat.interval_secs == 0 {
            return Err(crate::Error::config("Heartbeat interval must be > 0"));
        }
        if self.heartbeat.interval_secs > MAX_HEARTBEAT_INTERVAL_SECS {
            return Err(crate::Error::config(format!(
                "Heartbeat interval must be at most {} seconds",
                MAX_HEARTBEAT_INTERVAL_SECS
            )));
        }

        self.wake.validate()?;

        if self.session.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Broker connection configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname or address
    #[serde(default = "default_host")]
    pub host: String,

    /// Broker port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username used to authenticate
    #[serde(default = "default_username")]
    pub username: String,

    /// Password used to authenticate
    #[serde(default = "default_password")]
    pub password: String,

    /// MQTT client identifier
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Keep-alive interval negotiated with the broker (in seconds)
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Capacity of the client's outgoing request queue
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,
}

impl BrokerConfig {
    /// Validate the broker configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.host.is_empty() {
            return Err(crate::Error::config("Broker host cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::config("Broker port must be > 0"));
        }
        if self.client_id.is_empty() {
            return Err(crate::Error::config("Client id cannot be empty"));
        }
        if self.request_capacity == 0 {
            return Err(crate::Error::config("Request capacity must be > 0"));
        }
        Ok(())
    }

    /// `host:port` form used in log lines
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: default_username(),
            password: default_password(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive_secs(),
            request_capacity: default_request_capacity(),
        }
    }
}

// Keeps the password out of logs
impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("keep_alive_secs", &self.keep_alive_secs)
            .field("request_capacity", &self.request_capacity)
            .finish()
    }
}

/// Heartbeat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Seconds between `online` publishes while connected
    #[serde(default = "default_heartbeat_interval_secs")]
    pub interval_secs: u64,
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

/// Wake sequence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeConfig {
    /// Pause between two sends of the same sequence (in milliseconds)
    #[serde(default = "default_pause_millis")]
    pub pause_millis: u64,

    /// External helper program that emits the magic packet
    #[serde(default = "default_helper")]
    pub helper: String,

    /// Phrase the helper prints on stdout when a packet went out
    #[serde(default = "default_confirmation_phrase")]
    pub confirmation_phrase: String,
}

impl WakeConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_millis)
    }

    /// Validate the wake configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.helper.is_empty() {
            return Err(crate::Error::config("Wake helper program cannot be empty"));
        }
        if self.confirmation_phrase.is_empty() {
            return Err(crate::Error::config(
                "Wake helper confirmation phrase cannot be empty",
            ));
        }
        Ok(())
    }
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            pause_millis: default_pause_millis(),
            helper: default_helper(),
            confirmation_phrase: default_confirmation_phrase(),
        }
    }
}

/// Session and supervisor timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Pause after the broker rejected our login (in seconds)
    #[serde(default = "default_login_retry_secs")]
    pub login_retry_secs: u64,

    /// Pause after the broker refused the TCP connection (in seconds)
    #[serde(default = "default_refused_retry_secs")]
    pub refused_retry_secs: u64,

    /// Pause after an established connection was lost (in seconds)
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Time given to the `offline` publish before disconnecting (in seconds)
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Capacity of the monitoring event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_retry_secs: default_login_retry_secs(),
            refused_retry_secs: default_refused_retry_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_base_topic() -> String {
    "wol".to_string()
}

fn default_host() -> String {
    "mqtt.local".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_username() -> String {
    "mqtt".to_string()
}

fn default_password() -> String {
    "password".to_string()
}

fn default_client_id() -> String {
    "wol-mqtt".to_string()
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_request_capacity() -> usize {
    10
}

fn default_heartbeat_interval_secs() -> u64 {
    60
}

fn default_pause_millis() -> u64 {
    1000
}

fn default_helper() -> String {
    "wakeonlan".to_string()
}

fn default_confirmation_phrase() -> String {
    "magic packet".to_string()
}

fn default_login_retry_secs() -> u64 {
    5
}

fn default_refused_retry_secs() -> u64 {
    30
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_shutdown_grace_secs() -> u64 {
    3
}

fn default_event_channel_capacity() -> usize {
    1000
}
