//! MQTT broker transport over `rumqttc`.
//!
//! `connect` drives the event loop until the broker answers CONNACK, then
//! hands it to a forwarding task. The task pushes inbound PUBLISH packets
//! into a channel read by [`BrokerTransport::recv`] and logs broker
//! acknowledgements. Messages nobody waited for stay queued until the
//! engine calls [`BrokerTransport::discard_pending`] before its next entry. A connection error ends the task and surfaces on the
//! next `recv`.

use std::time::Duration;

use async_trait::async_trait;
use rtpusher_core::{BrokerTransport, InboundMessage, QoS, TransportError};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet,
    SubscribeFilter,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::BrokerConfig;

/// How long `disconnect` waits for queued publishes to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

type Inbound = Result<InboundMessage, TransportError>;

/// A live MQTT session.
pub struct MqttTransport {
    client: AsyncClient,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    forwarder: JoinHandle<()>,
}

impl MqttTransport {
    /// Connect to the configured broker.
    ///
    /// Fails if the broker refuses the session or does not answer within
    /// the connect timeout.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, TransportError> {
        let mut options = MqttOptions::new(
            config.client_id.clone(),
            config.address.host.clone(),
            config.address.port,
        );
        options.set_keep_alive(config.keep_alive);

        let (client, mut eventloop) = AsyncClient::new(options, config.request_capacity);
        tracing::debug!("MQTT connect to {}", config.address);

        tokio::time::timeout(config.connect_timeout, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                address: config.address.to_string(),
            })??;
        tracing::info!(client_id = %config.client_id, "Connected to {}", config.address);

        let (tx, inbound) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward_events(eventloop, tx));
        Ok(Self {
            client,
            inbound,
            forwarder,
        })
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), TransportError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(TransportError::Connection {
                        message: format!("broker refused connection: {:?}", ack.code),
                    })
                };
            }
            Ok(_) => continue,
            Err(e) => {
                return Err(TransportError::Connection {
                    message: e.to_string(),
                });
            }
        }
    }
}

async fn forward_events(mut eventloop: EventLoop, tx: mpsc::UnboundedSender<Inbound>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                if tx.send(Ok(message)).is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                tracing::debug!(pkid = ack.pkid, "Publish acknowledged");
            }
            Ok(Event::Incoming(Packet::PubComp(ack))) => {
                tracing::debug!(pkid = ack.pkid, "Publish completed");
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                tracing::debug!(pkid = ack.pkid, codes = ?ack.return_codes, "Subscribe acknowledged");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("MQTT disconnect sent");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("MQTT event loop stopped: {}", e);
                let _ = tx.send(Err(TransportError::Connection {
                    message: e.to_string(),
                }));
                break;
            }
        }
    }
}

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

#[async_trait(?Send)]
impl BrokerTransport for MqttTransport {
    async fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
    ) -> Result<(), TransportError> {
        self.client
            .publish(topic, to_mqtt_qos(qos), false, payload)
            .await
            .map_err(|e| TransportError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    async fn subscribe(&mut self, subscriptions: &[(String, QoS)]) -> Result<(), TransportError> {
        let filters = subscriptions
            .iter()
            .map(|(topic, qos)| SubscribeFilter::new(topic.clone(), to_mqtt_qos(*qos)));
        self.client
            .subscribe_many(filters)
            .await
            .map_err(|e| TransportError::Subscribe {
                message: e.to_string(),
            })
    }

    async fn recv(&mut self) -> Result<InboundMessage, TransportError> {
        match self.inbound.recv().await {
            Some(message) => message,
            None => Err(TransportError::Closed),
        }
    }

    fn discard_pending(&mut self) -> Result<usize, TransportError> {
        let mut discarded = 0;
        loop {
            match self.inbound.try_recv() {
                Ok(Ok(_)) => discarded += 1,
                Ok(Err(e)) => return Err(e),
                Err(mpsc::error::TryRecvError::Empty) => return Ok(discarded),
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    return Err(TransportError::Closed);
                }
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| TransportError::Connection {
                message: e.to_string(),
            })?;
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut self.forwarder)
            .await
            .is_err()
        {
            tracing::warn!("MQTT event loop did not stop after disconnect");
            self.forwarder.abort();
        }
        Ok(())
    }
}
