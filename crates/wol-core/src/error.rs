//! Error types for the Wake-on-LAN bridge
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the bridge
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Command payload is not a usable JSON object
    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    /// Command payload has no usable `mac` field
    #[error("No 'mac' provided in command")]
    MissingMac,

    /// Broker transport errors (publish, subscribe, disconnect)
    #[error("Broker error: {0}")]
    Broker(String),

    /// Packet sender errors
    #[error("Sender error: {0}")]
    Sender(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a malformed command error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedCommand(msg.into())
    }

    /// Create a broker error
    pub fn broker(msg: impl Into<String>) -> Self {
        Self::Broker(msg.into())
    }

    /// Create a sender error
    pub fn sender(msg: impl Into<String>) -> Self {
        Self::Sender(msg.into())
    }
}
