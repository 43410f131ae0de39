//! Wake command decoding
//!
//! Commands arrive as JSON objects:
//!
//! ```text
//! { "mac": "AA:BB:CC:DD:EE:FF", "ip": "10.0.0.5", "repeat": 3 }
//! ```
//!
//! Only `mac` is required. A missing `ip` means a broadcast on the local
//! segment, a missing `repeat` means [`DEFAULT_REPEAT`] sends. The MAC text is
//! not validated here; the packet sender reports bad addresses itself.

use crate::error::{Error, Result};
use serde::Deserialize;
use tracing::error;

/// Number of packets sent when a command carries no `repeat`
pub const DEFAULT_REPEAT: i64 = 2;

/// A decoded wake command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeRequest {
    /// Target link-layer address, never empty
    pub mac: String,
    /// Target IP address or hostname for a directed send
    pub ip: Option<String>,
    /// Number of packets to send; zero or negative sends nothing
    pub repeat: i64,
}

/// Wire shape of a command, before the `mac` check
#[derive(Debug, Deserialize)]
struct RawCommand {
    #[serde(default)]
    mac: Option<serde_json::Value>,
    #[serde(default)]
    ip: Option<String>,
    #[serde(default)]
    repeat: Option<i64>,
}

impl WakeRequest {
    /// Create a broadcast request with the default repeat count
    pub fn new(mac: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            ip: None,
            repeat: DEFAULT_REPEAT,
        }
    }

    /// Target a specific IP address or hostname
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Override the repeat count
    pub fn with_repeat(mut self, repeat: i64) -> Self {
        self.repeat = repeat;
        self
    }

    /// Parse a raw payload
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedCommand`]: not JSON, not an object, or a field of the wrong type
    /// - [`Error::MissingMac`]: no `mac`, or `mac` is not a non-empty string
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| Error::malformed(e.to_string()))?;

        // Structs also deserialize from sequences; only objects are commands.
        if !value.is_object() {
            return Err(Error::malformed("payload is not a JSON object"));
        }

        let raw: RawCommand =
            serde_json::from_value(value).map_err(|e| Error::malformed(e.to_string()))?;

        let mac = match raw.mac {
            Some(serde_json::Value::String(mac)) if !mac.is_empty() => mac,
            _ => return Err(Error::MissingMac),
        };

        Ok(Self {
            mac,
            ip: raw.ip,
            repeat: raw.repeat.unwrap_or(DEFAULT_REPEAT),
        })
    }
}

/// Turns inbound payloads into wake requests
///
/// Rejections are logged with the raw payload and swallowed; callers only see
/// `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandDecoder;

impl CommandDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a payload, logging any rejection
    pub fn decode(&self, payload: &[u8]) -> Option<WakeRequest> {
        self.try_decode(payload).ok()
    }

    /// Like [`decode`](Self::decode) but hands the rejection back after logging it
    pub fn try_decode(&self, payload: &[u8]) -> Result<WakeRequest> {
        WakeRequest::parse(payload).inspect_err(|e| match e {
            Error::MissingMac => error!(
                "No 'mac' provided in payload: '{}'",
                String::from_utf8_lossy(payload)
            ),
            other => error!(
                "Malformed JSON payload: '{}' ({})",
                String::from_utf8_lossy(payload),
                other
            ),
        })
    }
}
