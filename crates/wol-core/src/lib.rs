// # wol-core
//
// Core library for the Wake-on-LAN MQTT bridge.
//
// ## Architecture Overview
//
// The bridge listens on a broker for wake commands and turns each one into a
// short burst of magic packets:
// - **PacketSender**: Trait for emitting a single magic packet
// - **BrokerClient** / **BrokerLink**: Traits for the broker handle and its network loop
// - **CommandDecoder**: Turns a raw payload into a `WakeRequest`
// - **WakeupOrchestrator**: Repeats sends with pacing, fail-fast
// - **BrokerSession**: Connect, subscribe, heartbeat, graceful offline
// - **WolBridge**: Supervisor loop that retries sessions until shutdown
//
// ## Design Principles
//
// 1. **Core owns policy**: Retry delays, pacing and heartbeat live here, never in transports
// 2. **Transports are thin**: MQTT and the wake helper are plugged in through traits
// 3. **One command at a time**: Inbound messages are queued and handled by a single consumer
// 4. **Nothing escapes**: Every failure is logged and recovered locally

pub mod traits;
pub mod command;
pub mod wakeup;
pub mod session;
pub mod bridge;
pub mod config;
pub mod error;

#[cfg(test)]
mod test_log;

// Re-export core types for convenience
pub use traits::{BrokerClient, BrokerLink, InboundMessage, LinkEvent, PacketSender};
pub use command::{CommandDecoder, WakeRequest};
pub use wakeup::{WakeReport, WakeupOrchestrator};
pub use session::{BrokerSession, SessionState, Status};
pub use bridge::{BridgeEvent, WolBridge};
pub use config::{BridgeConfig, BrokerConfig};
pub use error::{Error, Result};
