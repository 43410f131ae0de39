//! Test doubles and common utilities for architecture contract tests
//!
//! These doubles stand in for the broker and the packet helper. They record
//! what the bridge asked for, with timestamps from the (paused) tokio clock.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wol_core::config::BridgeConfig;
use wol_core::error::{Error, Result};
use wol_core::traits::{BrokerClient, BrokerLink, InboundMessage, LinkEvent, PacketSender};
use wol_core::{BridgeEvent, WolBridge};

/// One call the bridge made on the broker handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerOp {
    Subscribe(String),
    Publish { topic: String, payload: String },
    Disconnect,
}

/// Broker handle that records every call
///
/// `disconnect()` pushes `Lost` into the paired link, like a real network
/// loop noticing its own clean disconnect.
pub struct FakeBrokerClient {
    ops: Mutex<Vec<(BrokerOp, Instant)>>,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
    fail_publish: AtomicBool,
}

impl FakeBrokerClient {
    pub fn ops(&self) -> Vec<BrokerOp> {
        self.ops.lock().unwrap().iter().map(|(op, _)| op.clone()).collect()
    }

    pub fn timed_ops(&self) -> Vec<(BrokerOp, Instant)> {
        self.ops.lock().unwrap().clone()
    }

    /// Payloads published on `topic`, in order
    pub fn published_on(&self, topic: &str) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                BrokerOp::Publish { topic: t, payload } if t == topic => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn subscribe_count(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, BrokerOp::Subscribe(_)))
            .count()
    }

    pub fn disconnect_count(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, BrokerOp::Disconnect))
            .count()
    }

    /// Make every later publish fail
    pub fn fail_publishes(&self) {
        self.fail_publish.store(true, Ordering::SeqCst);
    }

    fn record(&self, op: BrokerOp) {
        self.ops.lock().unwrap().push((op, Instant::now()));
    }
}

#[async_trait]
impl BrokerClient for FakeBrokerClient {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.record(BrokerOp::Subscribe(topic.to_string()));
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(Error::broker("request queue closed"));
        }
        self.record(BrokerOp::Publish {
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.record(BrokerOp::Disconnect);
        let _ = self.link_tx.send(LinkEvent::Lost {
            reason: "disconnected".to_string(),
        });
        Ok(())
    }
}

/// Network loop that replays events pushed by the test
///
/// Stays pending while nothing is queued, like an idle connection.
pub struct ScriptedLink {
    rx: mpsc::UnboundedReceiver<LinkEvent>,
}

#[async_trait]
impl BrokerLink for ScriptedLink {
    async fn next_event(&mut self) -> LinkEvent {
        match self.rx.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }
}

/// Test-side handle for driving a [`ScriptedLink`]
#[derive(Clone)]
pub struct LinkScript {
    tx: mpsc::UnboundedSender<LinkEvent>,
}

impl LinkScript {
    pub fn connect(&self) {
        self.push(LinkEvent::Connected);
    }

    pub fn reject(&self, code: &str) {
        self.push(LinkEvent::Rejected {
            code: code.to_string(),
        });
    }

    pub fn refuse(&self) {
        self.push(LinkEvent::Refused {
            reason: "Connection refused (os error 111)".to_string(),
        });
    }

    pub fn lose(&self) {
        self.push(LinkEvent::Lost {
            reason: "connection reset".to_string(),
        });
    }

    pub fn message(&self, topic: &str, payload: &str) {
        self.push(LinkEvent::Message(InboundMessage::new(topic, payload)));
    }

    pub fn push(&self, event: LinkEvent) {
        let _ = self.tx.send(event);
    }
}

/// Create a paired broker handle, link and script
pub fn fake_broker() -> (Arc<FakeBrokerClient>, Box<ScriptedLink>, LinkScript) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = Arc::new(FakeBrokerClient {
        ops: Mutex::new(Vec::new()),
        link_tx: tx.clone(),
        fail_publish: AtomicBool::new(false),
    });
    (client, Box::new(ScriptedLink { rx }), LinkScript { tx })
}

/// Sender that records every call and succeeds unless told otherwise
pub struct RecordingSender {
    calls: Mutex<Vec<(String, Option<String>, Instant)>>,
    succeed: AtomicBool,
}

impl RecordingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            succeed: AtomicBool::new(true),
        })
    }

    pub fn failing() -> Arc<Self> {
        let sender = Self::new();
        sender.succeed.store(false, Ordering::SeqCst);
        sender
    }

    pub fn calls(&self) -> Vec<(String, Option<String>, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PacketSender for RecordingSender {
    async fn send(&self, mac: &str, ip: Option<&str>) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push((mac.to_string(), ip.map(str::to_string), Instant::now()));
        self.succeed.load(Ordering::SeqCst)
    }

    fn sender_name(&self) -> &str {
        "recording"
    }
}

/// Deployment defaults with a small event channel
pub fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.session.event_channel_capacity = 256;
    config
}

/// A bridge running on its own task
pub struct RunningBridge {
    pub client: Arc<FakeBrokerClient>,
    pub sender: Arc<RecordingSender>,
    pub link: LinkScript,
    pub events: mpsc::Receiver<BridgeEvent>,
    pub shutdown: CancellationToken,
    pub handle: tokio::task::JoinHandle<Result<()>>,
}

impl RunningBridge {
    /// Cancel and wait for `run()` to return
    pub async fn stop(self) -> (Result<()>, Arc<FakeBrokerClient>, Arc<RecordingSender>) {
        self.shutdown.cancel();
        let result = tokio::time::timeout(Duration::from_secs(30), self.handle)
            .await
            .expect("bridge stops within 30 seconds")
            .expect("bridge task does not panic");
        (result, self.client, self.sender)
    }
}

/// Start a bridge with fresh doubles
pub fn start_bridge(config: BridgeConfig, sender: Arc<RecordingSender>) -> RunningBridge {
    let (client, link, script) = fake_broker();
    let (bridge, events) = WolBridge::new(client.clone(), link, sender.clone(), config)
        .expect("bridge construction succeeds");

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(bridge.run(shutdown.clone()));

    RunningBridge {
        client,
        sender,
        link: script,
        events,
        shutdown,
        handle,
    }
}

/// Wait for the first event matching `pred`, skipping the rest
pub async fn wait_for<F>(events: &mut mpsc::Receiver<BridgeEvent>, pred: F) -> BridgeEvent
where
    F: Fn(&BridgeEvent) -> bool,
{
    let deadline = Duration::from_secs(600);
    loop {
        let event = tokio::time::timeout(deadline, events.recv())
            .await
            .expect("event arrives in time")
            .expect("event channel open");
        if pred(&event) {
            return event;
        }
    }
}

/// Wait until the bridge announced itself online after a connect
pub async fn wait_connected(events: &mut mpsc::Receiver<BridgeEvent>) {
    wait_for(events, |e| {
        matches!(e, BridgeEvent::StatusPublished(wol_core::Status::Online))
    })
    .await;
}
