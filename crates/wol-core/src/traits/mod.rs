//! Core traits for the Wake-on-LAN bridge
//!
//! This module defines the abstract interfaces that transports must follow.
//!
//! - [`PacketSender`]: Emit one magic packet for a target
//! - [`BrokerClient`]: Publish, subscribe and disconnect on a shared broker handle
//! - [`BrokerLink`]: The broker's network loop, reporting lifecycle events and messages

pub mod packet_sender;
pub mod broker;

pub use packet_sender::PacketSender;
pub use broker::{BrokerClient, BrokerLink, InboundMessage, LinkEvent};
