// # MQTT Broker Transport
//
// This crate connects the bridge to an MQTT 3.1.1 broker using rumqttc.
//
// ## Split
//
// rumqttc hands out two halves, which map directly onto the core traits:
//
// - `AsyncClient` → [`MqttClient`] ([`BrokerClient`]): requests are queued
//   with the non-blocking `try_*` calls, so a slow network loop never stalls
//   the session
// - `EventLoop` → [`MqttLink`] ([`BrokerLink`]): each `poll()` drives the
//   connection and is translated into a [`LinkEvent`]
//
// ## Session Options
//
// - Clean session, client id from configuration (`wol-mqtt` by default)
// - Username/password credentials
// - Last will: `offline` on the status topic, so the broker announces us
//   gone if the process dies without a clean disconnect
// - All publishes and subscriptions use QoS 0, never retained
//
// ## Reconnects
//
// After an error, the next `poll()` starts a fresh connection attempt right
// away. The link never sleeps; pacing is done by the bridge, which simply
// does not poll again until its retry delay has passed.

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, Incoming, LastWill,
    MqttOptions, Outgoing, QoS,
};
use std::io;
use std::time::Duration;
use tracing::{debug, trace};
use wol_core::config::BridgeConfig;
use wol_core::traits::{BrokerClient, BrokerLink, InboundMessage, LinkEvent};
use wol_core::{Error, Result, Status};

/// Build the rumqttc options for `config`
pub fn mqtt_options(config: &BridgeConfig) -> MqttOptions {
    let broker = &config.broker;

    let mut options = MqttOptions::new(broker.client_id.clone(), broker.host.clone(), broker.port);
    options.set_keep_alive(Duration::from_secs(broker.keep_alive_secs));
    options.set_clean_session(true);
    options.set_credentials(broker.username.clone(), broker.password.clone());
    options.set_last_will(LastWill::new(
        config.status_topic(),
        Status::Offline.as_str(),
        QoS::AtMostOnce,
        false,
    ));

    options
}

/// Create the broker handle and network loop for `config`
///
/// Nothing touches the network until the link is first polled.
pub fn connect(config: &BridgeConfig) -> (MqttClient, MqttLink) {
    let (client, eventloop) =
        AsyncClient::new(mqtt_options(config), config.broker.request_capacity);

    debug!(
        "MQTT transport ready for {} as '{}'",
        config.broker.address(),
        config.broker.client_id
    );

    (MqttClient { client }, MqttLink { eventloop })
}

/// Shared MQTT handle
#[derive(Clone)]
pub struct MqttClient {
    client: AsyncClient,
}

#[async_trait]
impl BrokerClient for MqttClient {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| Error::broker(format!("subscribe to {} failed: {}", topic, e)))
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| Error::broker(format!("publish to {} failed: {}", topic, e)))
    }

    async fn disconnect(&self) -> Result<()> {
        self.client
            .try_disconnect()
            .map_err(|e| Error::broker(format!("disconnect failed: {}", e)))
    }
}

/// MQTT network loop
pub struct MqttLink {
    eventloop: EventLoop,
}

#[async_trait]
impl BrokerLink for MqttLink {
    async fn next_event(&mut self) -> LinkEvent {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                    debug!("MQTT: ConnAck {:?}", ack.code);
                    if ack.code != ConnectReturnCode::Success {
                        return LinkEvent::Rejected {
                            code: format!("{:?}", ack.code),
                        };
                    }
                    return LinkEvent::Connected;
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    return LinkEvent::Message(InboundMessage::new(
                        publish.topic,
                        publish.payload.to_vec(),
                    ));
                }
                Ok(Event::Incoming(Incoming::Disconnect)) => {
                    return LinkEvent::Lost {
                        reason: "broker sent disconnect".to_string(),
                    };
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    return LinkEvent::Lost {
                        reason: "disconnected by client".to_string(),
                    };
                }
                Ok(Event::Incoming(Incoming::SubAck(ack))) => {
                    debug!("MQTT: SubAck {:?}", ack.return_codes);
                }
                Ok(event) => trace!("MQTT: {:?}", event),
                Err(e) => return classify_error(&e),
            }
        }
    }
}

/// Map a connection error onto the bridge's failure kinds
///
/// | rumqttc error                      | Link event |
/// |------------------------------------|------------|
/// | `ConnectionRefused(code)` (ConnAck)| `Rejected` |
/// | I/O `ConnectionRefused` (TCP)      | `Refused`  |
/// | anything else                      | `Lost`     |
pub fn classify_error(error: &ConnectionError) -> LinkEvent {
    match error {
        ConnectionError::ConnectionRefused(code) => LinkEvent::Rejected {
            code: format!("{:?}", code),
        },
        ConnectionError::Io(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
            LinkEvent::Refused {
                reason: e.to_string(),
            }
        }
        other => LinkEvent::Lost {
            reason: other.to_string(),
        },
    }
}
