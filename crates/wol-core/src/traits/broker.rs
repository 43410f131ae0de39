// # Broker Traits
//
// Defines the two halves of a broker connection:
//
// - [`BrokerClient`]: a cheap, shareable handle used to publish, subscribe and
//   disconnect. Safe to call concurrently from several tasks.
// - [`BrokerLink`]: the network loop. Exactly one task drives it at a time and
//   turns transport activity into [`LinkEvent`]s.
//
// ## Implementations
//
// - MQTT (rumqttc): `wol-broker-mqtt` crate
//
// ## Lifecycle
//
// ```text
// next_event() ─► Connected ─► Message ─► Message ─► ... ─► Lost
//            └──► Rejected / Refused
// ```
//
// After a terminal event (`Rejected`, `Refused`, `Lost`) the next call to
// `next_event()` starts a fresh connection attempt. The link never sleeps
// between attempts; retry pacing is owned by `WolBridge`.

use async_trait::async_trait;

/// A message received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published on
    pub topic: String,
    /// Raw payload bytes
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload rendered for log lines
    pub fn payload_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Events reported by a [`BrokerLink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Broker accepted the connection
    Connected,

    /// Broker answered the connect with a non-zero result code
    Rejected {
        /// Result code as reported by the transport
        code: String,
    },

    /// TCP connection was refused before any broker negotiation
    Refused {
        reason: String,
    },

    /// A message arrived on a subscribed topic
    Message(InboundMessage),

    /// An established connection went away
    Lost {
        reason: String,
    },
}

impl LinkEvent {
    /// Whether this event ends the current connection attempt
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LinkEvent::Rejected { .. } | LinkEvent::Refused { .. } | LinkEvent::Lost { .. }
        )
    }
}

/// Shared broker handle
///
/// Calls only enqueue work for the network loop; they must not block waiting
/// for the broker. Errors mean the request could not be queued.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Subscribe to `topic`
    async fn subscribe(&self, topic: &str) -> crate::Result<()>;

    /// Publish a text payload to `topic`
    async fn publish(&self, topic: &str, payload: &str) -> crate::Result<()>;

    /// Request a clean disconnect
    async fn disconnect(&self) -> crate::Result<()>;
}

/// Broker network loop
///
/// # Cancellation
///
/// `next_event()` must be cancellation-safe: dropping the future between
/// events loses no inbound messages that were already reported.
#[async_trait]
pub trait BrokerLink: Send {
    /// Drive the connection until the next reportable event
    async fn next_event(&mut self) -> LinkEvent;
}
