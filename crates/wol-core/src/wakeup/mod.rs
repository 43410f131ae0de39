//! Wakeup orchestration
//!
//! Repeats a [`PacketSender`] for one target:
//!
//! ```text
//! send ─ pause ─ send ─ pause ─ send        (repeat = 3, all succeed)
//! send ─ pause ─ send ✗                     (repeat = 3, second send fails)
//! ```
//!
//! There is never a pause after the last attempt, and the first failed send
//! ends the sequence.

use crate::command::WakeRequest;
use crate::traits::PacketSender;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of one wake sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeReport {
    /// Target link-layer address
    pub mac: String,
    /// Repeat count carried by the request
    pub requested: i64,
    /// Number of packets confirmed sent
    pub sent: u32,
    /// Whether a failed send cut the sequence short
    pub aborted: bool,
}

impl WakeReport {
    /// True when every requested packet went out
    pub fn completed(&self) -> bool {
        !self.aborted
    }
}

/// Sends a paced burst of magic packets for one request
#[derive(Clone)]
pub struct WakeupOrchestrator {
    /// Sender used for each attempt
    sender: Arc<dyn PacketSender>,

    /// Pause between attempts
    pause: Duration,
}

impl WakeupOrchestrator {
    /// Create a new orchestrator
    ///
    /// # Parameters
    ///
    /// - `sender`: Packet sender implementation
    /// - `pause`: Delay between two attempts of the same sequence
    pub fn new(sender: Arc<dyn PacketSender>, pause: Duration) -> Self {
        Self { sender, pause }
    }

    /// Run the wake sequence for `request`
    ///
    /// A repeat count of zero or less sends nothing.
    pub async fn wake(&self, request: &WakeRequest) -> WakeReport {
        let count = request.repeat;

        match request.ip.as_deref() {
            Some(ip) => info!("Sending WoL (x{}) to {} via {}", count, request.mac, ip),
            None => info!("Sending WoL (x{}) to {}", count, request.mac),
        }

        let mut report = WakeReport {
            mac: request.mac.clone(),
            requested: count,
            sent: 0,
            aborted: false,
        };

        for attempt in 0..count {
            if !self.sender.send(&request.mac, request.ip.as_deref()).await {
                debug!(
                    "Aborting WoL sequence for {} after {} of {} packet(s) via {}",
                    request.mac,
                    report.sent,
                    count,
                    self.sender.sender_name()
                );
                report.aborted = true;
                break;
            }
            report.sent += 1;

            // Pause only if another attempt follows
            if attempt < count - 1 {
                tokio::time::sleep(self.pause).await;
            }
        }

        report
    }
}
