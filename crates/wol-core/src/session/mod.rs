//! Broker session
//!
//! The session owns one broker connection at a time:
//!
//! ```text
//! ┌──────────────┐  run_once()  ┌────────────┐  Connected  ┌───────────┐
//! │ Disconnected │─────────────►│ Connecting │────────────►│ Connected │
//! └──────────────┘              └────────────┘             └───────────┘
//!        ▲                        │ Rejected / Refused        │ Lost
//!        └────────────────────────┴───────────────────────────┘
//! ```
//!
//! Each attempt spawns a link driver that owns the [`BrokerLink`]. The driver
//! routes inbound messages straight to the command queue and lifecycle events
//! to the session, then hands the link back after the first terminal event.
//!
//! While connected the session publishes `online` on every heartbeat tick.
//! Retry pacing between attempts belongs to [`crate::WolBridge`].

pub mod dispatch;

pub use dispatch::CommandDispatcher;

use crate::bridge::{BridgeEvent, EventSink};
use crate::config::BridgeConfig;
use crate::traits::{BrokerClient, BrokerLink, InboundMessage, LinkEvent};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long the link driver gets to wind down after a disconnect request
const DRIVER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection state of the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Availability published on the status topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Online,
    Offline,
}

impl Status {
    /// Literal payload sent to the broker
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Online => "online",
            Status::Offline => "offline",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Broker answered the connect with a non-zero result code
    Rejected { code: String },
    /// TCP connection refused
    Refused { reason: String },
    /// Established (or pending) connection went away
    Lost { reason: String },
    /// Shutdown was requested; the link driver is left running for [`BrokerSession::shutdown`]
    Shutdown,
}

/// One broker connection and its heartbeat
pub struct BrokerSession {
    /// Shared broker handle
    client: Arc<dyn BrokerClient>,

    /// Network loop, present while no driver owns it
    link: Option<Box<dyn BrokerLink>>,

    /// Running link driver, if any
    driver: Option<JoinHandle<Box<dyn BrokerLink>>>,

    /// Queue feeding the command dispatcher
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,

    command_topic: String,
    status_topic: String,
    heartbeat_interval: Duration,
    shutdown_grace: Duration,

    state: SessionState,
    events: EventSink,
}

impl BrokerSession {
    /// Create a new session
    ///
    /// # Parameters
    ///
    /// - `client`: Shared broker handle
    /// - `link`: Broker network loop
    /// - `inbound_tx`: Queue consumed by the [`CommandDispatcher`]
    /// - `config`: Bridge configuration (topics and timing)
    /// - `events`: Monitoring event sink
    pub fn new(
        client: Arc<dyn BrokerClient>,
        link: Box<dyn BrokerLink>,
        inbound_tx: mpsc::UnboundedSender<InboundMessage>,
        config: &BridgeConfig,
        events: EventSink,
    ) -> Self {
        Self {
            client,
            link: Some(link),
            driver: None,
            inbound_tx,
            command_topic: config.command_topic(),
            status_topic: config.status_topic(),
            heartbeat_interval: config.heartbeat.interval(),
            shutdown_grace: Duration::from_secs(config.session.shutdown_grace_secs),
            state: SessionState::Disconnected,
            events,
        }
    }

    /// Current connection state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run one connection attempt until it ends or shutdown is requested
    pub async fn run_once(&mut self, shutdown: &CancellationToken) -> SessionEnd {
        let Some(link) = self.link.take() else {
            error!("MQTT: broker link is unavailable");
            return SessionEnd::Lost {
                reason: "broker link unavailable".to_string(),
            };
        };

        info!("MQTT: connecting to broker...");
        self.set_state(SessionState::Connecting);

        let (status_tx, mut status_rx) = mpsc::unbounded_channel();
        self.driver = Some(tokio::spawn(drive_link(
            link,
            status_tx,
            self.inbound_tx.clone(),
        )));

        let end = self.track(&mut status_rx, shutdown).await;

        if end != SessionEnd::Shutdown {
            self.reclaim_link().await;
            self.set_state(SessionState::Disconnected);
        }

        end
    }

    /// Publish `offline`, give it time to leave, then disconnect
    ///
    /// Safe to call in any state. Publish and disconnect failures are logged
    /// and otherwise ignored.
    pub async fn shutdown(&mut self) {
        info!("MQTT: Publishing offline status");
        publish_status(&*self.client, &self.status_topic, &self.events, Status::Offline).await;

        tokio::time::sleep(self.shutdown_grace).await;

        info!("MQTT: disconnecting");
        if let Err(e) = self.client.disconnect().await {
            warn!("MQTT: disconnect failed: {}", e);
        }

        if let Some(mut driver) = self.driver.take() {
            match tokio::time::timeout(DRIVER_STOP_TIMEOUT, &mut driver).await {
                Ok(Ok(link)) => self.link = Some(link),
                Ok(Err(e)) => warn!("Broker link driver failed: {}", e),
                Err(_) => {
                    debug!("Broker link driver still busy after disconnect, aborting it");
                    driver.abort();
                }
            }
        }

        self.set_state(SessionState::Disconnected);
    }

    /// Follow link events and heartbeat ticks until the attempt ends
    async fn track(
        &mut self,
        status_rx: &mut mpsc::UnboundedReceiver<LinkEvent>,
        shutdown: &CancellationToken,
    ) -> SessionEnd {
        let mut heartbeat: Option<Interval> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    return SessionEnd::Shutdown;
                }

                event = status_rx.recv() => match event {
                    Some(LinkEvent::Connected) => {
                        self.on_connect().await;
                        heartbeat = Some(self.heartbeat_timer());
                    }
                    Some(LinkEvent::Rejected { code }) => {
                        info!("MQTT: connected to broker with result code {}", code);
                        error!("Failed to correctly login to MQTT broker");
                        return SessionEnd::Rejected { code };
                    }
                    Some(LinkEvent::Refused { reason }) => {
                        return SessionEnd::Refused { reason };
                    }
                    Some(LinkEvent::Lost { reason }) => {
                        warn!("MQTT: connection to broker lost: {}", reason);
                        return SessionEnd::Lost { reason };
                    }
                    Some(LinkEvent::Message(message)) => {
                        // The driver routes messages to the dispatcher
                        debug!("Ignoring message on status channel: {}", message.topic);
                    }
                    None => {
                        return SessionEnd::Lost {
                            reason: "broker link driver stopped".to_string(),
                        };
                    }
                },

                _ = next_heartbeat(&mut heartbeat) => {
                    debug!("MQTT: publishing online Status update");
                    publish_status(
                        &*self.client,
                        &self.status_topic,
                        &self.events,
                        Status::Online,
                    )
                    .await;
                }
            }
        }
    }

    /// Subscribe to the command topic and announce ourselves
    async fn on_connect(&mut self) {
        info!("MQTT: connected to broker");
        self.set_state(SessionState::Connected);

        match self.client.subscribe(&self.command_topic).await {
            Ok(()) => self.events.emit(BridgeEvent::Subscribed {
                topic: self.command_topic.clone(),
            }),
            Err(e) => error!("MQTT: failed to subscribe to {}: {}", self.command_topic, e),
        }

        publish_status(&*self.client, &self.status_topic, &self.events, Status::Online).await;
    }

    fn heartbeat_timer(&self) -> Interval {
        let mut timer = tokio::time::interval_at(
            Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }

    /// Take the link back from a finished driver
    async fn reclaim_link(&mut self) {
        if let Some(driver) = self.driver.take() {
            match driver.await {
                Ok(link) => self.link = Some(link),
                Err(e) => error!("Broker link driver failed: {}", e),
            }
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("Session state {:?} -> {:?}", self.state, state);
            self.state = state;
            self.events.emit(BridgeEvent::StateChanged(state));
        }
    }
}

/// Takes fields instead of `&BrokerSession`, which is not `Sync`
async fn publish_status(
    client: &dyn BrokerClient,
    topic: &str,
    events: &EventSink,
    status: Status,
) {
    match client.publish(topic, status.as_str()).await {
        Ok(()) => events.emit(BridgeEvent::StatusPublished(status)),
        Err(e) => warn!("MQTT: failed to publish {} status: {}", status, e),
    }
}

/// Resolves on the next heartbeat tick, or never while disconnected
async fn next_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Drive the link until its first terminal event, then return it
async fn drive_link(
    mut link: Box<dyn BrokerLink>,
    status_tx: mpsc::UnboundedSender<LinkEvent>,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
) -> Box<dyn BrokerLink> {
    loop {
        match link.next_event().await {
            LinkEvent::Message(message) => {
                if inbound_tx.send(message).is_err() {
                    warn!("Command dispatcher is gone, dropping inbound message");
                }
            }
            event => {
                let terminal = event.is_terminal();
                // The session may already have stopped listening during shutdown
                let _ = status_tx.send(event);
                if terminal {
                    break;
                }
            }
        }
    }

    link
}
