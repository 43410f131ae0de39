//! Command dispatch
//!
//! Drains the inbound queue one message at a time. A wake sequence runs to
//! completion before the next message is looked at, so commands are handled
//! strictly in arrival order.

use crate::bridge::{BridgeEvent, EventSink};
use crate::command::CommandDecoder;
use crate::traits::InboundMessage;
use crate::wakeup::{WakeReport, WakeupOrchestrator};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Routes command-topic messages to the wakeup orchestrator
pub struct CommandDispatcher {
    command_topic: String,
    decoder: CommandDecoder,
    orchestrator: WakeupOrchestrator,
    events: EventSink,
}

impl CommandDispatcher {
    pub fn new(
        command_topic: impl Into<String>,
        orchestrator: WakeupOrchestrator,
        events: EventSink,
    ) -> Self {
        Self {
            command_topic: command_topic.into(),
            decoder: CommandDecoder::new(),
            orchestrator,
            events,
        }
    }

    /// Handle messages until the queue closes or shutdown is requested
    ///
    /// A wake sequence already in progress is finished before shutdown is
    /// noticed.
    pub async fn run(
        self,
        mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
        shutdown: CancellationToken,
    ) {
        loop {
            let message = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                message = inbound.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            self.handle(message).await;
        }

        info!("Command dispatcher stopped");
    }

    /// Handle one inbound message
    ///
    /// Returns the wake report when the message produced a wake sequence.
    pub async fn handle(&self, message: InboundMessage) -> Option<WakeReport> {
        debug!("MQTT: Message {} = {}", message.topic, message.payload_text());

        if message.topic != self.command_topic {
            debug!("Ignoring message on unexpected topic {}", message.topic);
            return None;
        }

        match self.decoder.try_decode(&message.payload) {
            Ok(request) => {
                let report = self.orchestrator.wake(&request).await;
                self.events.emit(BridgeEvent::WakeFinished(report.clone()));
                Some(report)
            }
            Err(e) => {
                self.events.emit(BridgeEvent::CommandRejected {
                    reason: e.to_string(),
                });
                None
            }
        }
    }
}
