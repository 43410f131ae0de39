//! Architectural Contract Test: Session Lifecycle
//!
//! This test verifies how the bridge drives its broker session.
//!
//! Constraints verified:
//! - Every successful connect subscribes exactly once, then publishes `online`
//! - Heartbeats go out every interval, only while connected
//! - Each connection failure is paced by its own retry delay
//! - A lost connection is re-established and re-subscribed
//! - Heartbeat intervals beyond one day are refused before anything runs
//!
//! If this test fails, someone has:
//! - Moved retry pacing into a transport
//! - Left the heartbeat running across reconnects
//! - Subscribed before (or without) a confirmed connect

mod common;

use common::*;
use std::time::Duration;
use tokio::time::Instant;
use wol_core::{BridgeEvent, SessionState};

#[tokio::test(start_paused = true)]
async fn connect_subscribes_once_then_announces_online() {
    let mut bridge = start_bridge(test_config(), RecordingSender::new());

    bridge.link.connect();
    wait_connected(&mut bridge.events).await;

    assert_eq!(
        bridge.client.ops(),
        vec![
            BrokerOp::Subscribe("wol/command".to_string()),
            BrokerOp::Publish {
                topic: "wol/status".to_string(),
                payload: "online".to_string(),
            },
        ],
        "subscribe comes first, then a single online"
    );

    let (result, _, _) = bridge.stop().await;
    assert!(result.is_ok());
}

#[tokio::test(start_paused = true)]
async fn state_changes_are_reported() {
    let mut bridge = start_bridge(test_config(), RecordingSender::new());

    wait_for(&mut bridge.events, |e| {
        *e == BridgeEvent::StateChanged(SessionState::Connecting)
    })
    .await;

    bridge.link.connect();
    wait_for(&mut bridge.events, |e| {
        *e == BridgeEvent::StateChanged(SessionState::Connected)
    })
    .await;

    bridge.link.lose();
    wait_for(&mut bridge.events, |e| {
        *e == BridgeEvent::StateChanged(SessionState::Disconnected)
    })
    .await;

    bridge.stop().await;
}

#[tokio::test(start_paused = true)]
async fn heartbeat_publishes_online_every_interval() {
    let mut bridge = start_bridge(test_config(), RecordingSender::new());

    bridge.link.connect();
    wait_connected(&mut bridge.events).await;

    tokio::time::sleep(Duration::from_secs(185)).await;

    let onlines: Vec<Instant> = bridge
        .client
        .timed_ops()
        .into_iter()
        .filter_map(|(op, at)| match op {
            BrokerOp::Publish { payload, .. } if payload == "online" => Some(at),
            _ => None,
        })
        .collect();

    // Initial announce plus ticks at 60s, 120s and 180s
    assert_eq!(onlines.len(), 4);
    for pair in onlines.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_secs(60));
    }
    assert_eq!(bridge.client.subscribe_count(), 1);

    bridge.stop().await;
}

#[tokio::test(start_paused = true)]
async fn no_heartbeat_while_disconnected() {
    let mut bridge = start_bridge(test_config(), RecordingSender::new());

    bridge.link.refuse();
    wait_for(&mut bridge.events, |e| {
        matches!(e, BridgeEvent::RetryScheduled { .. })
    })
    .await;

    // Several heartbeat intervals with no broker answering
    tokio::time::sleep(Duration::from_secs(300)).await;

    assert!(
        bridge.client.ops().is_empty(),
        "nothing is published without a connection: {:?}",
        bridge.client.ops()
    );

    bridge.stop().await;
}

#[tokio::test(start_paused = true)]
async fn rejected_login_retries_after_five_seconds() {
    let mut bridge = start_bridge(test_config(), RecordingSender::new());

    bridge.link.reject("5");
    let rejected_at = Instant::now();

    let event = wait_for(&mut bridge.events, |e| {
        matches!(e, BridgeEvent::RetryScheduled { .. })
    })
    .await;
    assert_eq!(
        event,
        BridgeEvent::RetryScheduled {
            delay: Duration::from_secs(5)
        }
    );
    assert_eq!(bridge.client.subscribe_count(), 0, "no subscribe on a rejected login");

    bridge.link.connect();
    wait_connected(&mut bridge.events).await;

    let (op, at) = bridge.client.timed_ops()[0].clone();
    assert_eq!(op, BrokerOp::Subscribe("wol/command".to_string()));
    assert!(at - rejected_at >= Duration::from_secs(5));

    bridge.stop().await;
}

#[tokio::test(start_paused = true)]
async fn refused_connection_retries_after_thirty_seconds() {
    let mut bridge = start_bridge(test_config(), RecordingSender::new());

    bridge.link.refuse();
    let refused_at = Instant::now();

    let event = wait_for(&mut bridge.events, |e| {
        matches!(e, BridgeEvent::RetryScheduled { .. })
    })
    .await;
    assert_eq!(
        event,
        BridgeEvent::RetryScheduled {
            delay: Duration::from_secs(30)
        }
    );

    bridge.link.connect();
    wait_connected(&mut bridge.events).await;

    let (_, subscribed_at) = bridge.client.timed_ops()[0].clone();
    assert!(subscribed_at - refused_at >= Duration::from_secs(30));

    bridge.stop().await;
}

#[tokio::test(start_paused = true)]
async fn lost_connection_reconnects_and_resubscribes() {
    let mut bridge = start_bridge(test_config(), RecordingSender::new());

    bridge.link.connect();
    wait_connected(&mut bridge.events).await;

    bridge.link.lose();
    let event = wait_for(&mut bridge.events, |e| {
        matches!(e, BridgeEvent::RetryScheduled { .. })
    })
    .await;
    assert_eq!(
        event,
        BridgeEvent::RetryScheduled {
            delay: Duration::from_secs(5)
        }
    );

    bridge.link.connect();
    wait_connected(&mut bridge.events).await;

    assert_eq!(bridge.client.subscribe_count(), 2);
    assert_eq!(
        bridge.client.published_on("wol/status"),
        vec!["online".to_string(), "online".to_string()]
    );

    bridge.stop().await;
}

#[tokio::test(start_paused = true)]
async fn custom_base_topic_is_used_for_both_topics() {
    let mut config = test_config();
    config.base_topic = "lab/wol".to_string();
    let mut bridge = start_bridge(config, RecordingSender::new());

    bridge.link.connect();
    wait_connected(&mut bridge.events).await;

    assert_eq!(
        bridge.client.ops()[0],
        BrokerOp::Subscribe("lab/wol/command".to_string())
    );
    assert_eq!(bridge.client.published_on("lab/wol/status"), vec!["online"]);

    bridge.stop().await;
}

#[tokio::test(start_paused = true)]
async fn oversized_heartbeat_interval_is_refused_at_construction() {
    let mut config = test_config();
    config.heartbeat.interval_secs = u64::MAX;

    let (client, link, _script) = fake_broker();
    let result = wol_core::WolBridge::new(client, link, RecordingSender::new(), config);

    assert!(matches!(result, Err(wol_core::Error::Config(_))));
}

#[tokio::test(start_paused = true)]
async fn longest_heartbeat_interval_still_connects() {
    let mut config = test_config();
    config.heartbeat.interval_secs = wol_core::config::MAX_HEARTBEAT_INTERVAL_SECS;
    let mut bridge = start_bridge(config, RecordingSender::new());

    bridge.link.connect();
    wait_connected(&mut bridge.events).await;
    tokio::time::sleep(Duration::from_secs(86_400 + 1)).await;

    let onlines = bridge
        .client
        .published_on("wol/status")
        .iter()
        .filter(|p| *p == "online")
        .count();
    assert_eq!(onlines, 2);

    bridge.stop().await;
}
