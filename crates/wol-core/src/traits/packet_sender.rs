// # Packet Sender Trait
//
// Defines the interface for emitting a single Wake-on-LAN magic packet.
//
// ## Implementations
//
// - External helper (`wakeonlan`): `wol-sender-helper` crate
//
// ## Usage
//
// ```rust,ignore
// use wol_core::PacketSender;
//
// let sender = /* PacketSender implementation */;
//
// // Broadcast on the local segment
// sender.send("AA:BB:CC:DD:EE:FF", None).await;
//
// // Directed send
// sender.send("AA:BB:CC:DD:EE:FF", Some("10.0.0.5")).await;
// ```

use async_trait::async_trait;

/// Trait for packet sender implementations
///
/// A sender performs exactly one transmission per call and reports whether it
/// went out. It owns its own failure logging: a `false` return has already
/// been logged at error severity with whatever diagnostic text was available.
///
/// Senders never repeat or pause. Repetition and pacing belong to
/// [`crate::WakeupOrchestrator`].
#[async_trait]
pub trait PacketSender: Send + Sync {
    /// Send one magic packet to `mac`
    ///
    /// # Parameters
    ///
    /// - `mac`: Link-layer address in text form, passed through unvalidated
    /// - `ip`: Optional IP address or hostname for a directed send
    ///
    /// # Returns
    ///
    /// `true` if the packet was confirmed sent, `false` otherwise
    async fn send(&self, mac: &str, ip: Option<&str>) -> bool;

    /// Name used in log lines
    fn sender_name(&self) -> &str;
}
