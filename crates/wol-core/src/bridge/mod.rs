//! Wake-on-LAN bridge supervisor
//!
//! The WolBridge is responsible for:
//! - Keeping a broker session alive, with per-cause retry pacing
//! - Feeding command-topic messages to the dispatcher in arrival order
//! - Publishing `offline` and disconnecting on shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   LinkEvent    ┌───────────────┐
//! │ BrokerLink  │───────────────►│ BrokerSession │─── subscribe / online ──► BrokerClient
//! └─────────────┘                └───────────────┘
//!        │ InboundMessage                │ SessionEnd
//!        ▼                               ▼
//! ┌───────────────────┐          ┌───────────────┐
//! │ CommandDispatcher │          │   WolBridge   │── retry pacing
//! └───────────────────┘          └───────────────┘
//!        │ WakeRequest
//!        ▼
//! ┌────────────────────┐
//! │ WakeupOrchestrator │──► PacketSender
//! └────────────────────┘
//! ```
//!
//! ## Retry Pacing
//!
//! | Session ended with | Pause before the next attempt |
//! |--------------------|-------------------------------|
//! | `Rejected`         | `login_retry_secs` (5s)       |
//! | `Refused`          | `refused_retry_secs` (30s)    |
//! | `Lost`             | `reconnect_delay_secs` (5s)   |

use crate::config::{BridgeConfig, SessionConfig};
use crate::error::{Error, Result};
use crate::session::{BrokerSession, CommandDispatcher, SessionEnd, SessionState, Status};
use crate::traits::{BrokerClient, BrokerLink, InboundMessage, PacketSender};
use crate::wakeup::{WakeReport, WakeupOrchestrator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Events emitted by the WolBridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Session state changed
    StateChanged(SessionState),

    /// Subscribed to the command topic
    Subscribed { topic: String },

    /// Status payload handed to the broker
    StatusPublished(Status),

    /// Inbound command could not be decoded
    CommandRejected { reason: String },

    /// Wake sequence finished
    WakeFinished(WakeReport),

    /// Next connection attempt is scheduled after `delay`
    RetryScheduled { delay: Duration },

    /// Bridge stopped
    Stopped,
}

/// Non-blocking sender for [`BridgeEvent`]s
///
/// When the channel is full, events are dropped with a warning.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<BridgeEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<BridgeEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: BridgeEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening; events are optional
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Supervises the broker session and the command dispatcher
pub struct WolBridge {
    /// Broker session
    session: BrokerSession,

    /// Command dispatcher, handed to its own task on `run()`
    dispatcher: CommandDispatcher,

    /// Queue between the link driver and the dispatcher
    inbound_rx: mpsc::UnboundedReceiver<InboundMessage>,

    /// Broker address for log lines
    broker_address: String,

    /// Retry pacing
    timing: SessionConfig,

    events: EventSink,
}

impl WolBridge {
    /// Create a new bridge
    ///
    /// # Parameters
    ///
    /// - `client`: Shared broker handle
    /// - `link`: Broker network loop
    /// - `sender`: Packet sender used for every wake sequence
    /// - `config`: Bridge configuration
    ///
    /// # Returns
    ///
    /// A tuple of (bridge, event_receiver) where event_receiver yields bridge events
    pub fn new(
        client: Arc<dyn BrokerClient>,
        link: Box<dyn BrokerLink>,
        sender: Arc<dyn PacketSender>,
        config: BridgeConfig,
    ) -> Result<(Self, mpsc::Receiver<BridgeEvent>)> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(config.session.event_channel_capacity);
        let events = EventSink::new(event_tx);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let session = BrokerSession::new(client, link, inbound_tx, &config, events.clone());
        let orchestrator = WakeupOrchestrator::new(sender, config.wake.pause());
        let dispatcher =
            CommandDispatcher::new(config.command_topic(), orchestrator, events.clone());

        let bridge = Self {
            session,
            dispatcher,
            inbound_rx,
            broker_address: config.broker.address(),
            timing: config.session,
            events,
        };

        Ok((bridge, event_rx))
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Run until `shutdown` is cancelled
    ///
    /// Connection failures never end the loop. On shutdown the bridge
    /// publishes `offline`, waits the grace period and disconnects, in that
    /// order, whatever the session state was.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: The dispatcher task failed
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let Self {
            mut session,
            dispatcher,
            inbound_rx,
            broker_address,
            timing,
            events,
        } = self;

        info!("Starting up...");

        let dispatch_task = tokio::spawn(dispatcher.run(inbound_rx, shutdown.clone()));

        loop {
            let delay = match session.run_once(&shutdown).await {
                SessionEnd::Shutdown => break,
                SessionEnd::Rejected { .. } => Duration::from_secs(timing.login_retry_secs),
                SessionEnd::Refused { reason } => {
                    error!(
                        "Failed to connect to broker on {}: {}",
                        broker_address, reason
                    );
                    Duration::from_secs(timing.refused_retry_secs)
                }
                SessionEnd::Lost { .. } => Duration::from_secs(timing.reconnect_delay_secs),
            };

            debug!("Next connection attempt in {:?}", delay);
            events.emit(BridgeEvent::RetryScheduled { delay });

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Interrupted... shutting down");
        session.shutdown().await;

        let result = dispatch_task
            .await
            .map_err(|e| Error::Other(format!("Command dispatcher failed: {}", e)));

        events.emit(BridgeEvent::Stopped);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_channel_drops_events() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);

        sink.emit(BridgeEvent::Stopped);
        sink.emit(BridgeEvent::StateChanged(SessionState::Connected));

        assert_eq!(rx.recv().await, Some(BridgeEvent::Stopped));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        EventSink::new(tx).emit(BridgeEvent::Stopped);
    }
}
