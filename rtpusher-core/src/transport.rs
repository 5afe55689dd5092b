//! Broker transport abstraction.
//!
//! This module provides a trait-based publish/subscribe transport so the
//! scenario engine can run against a real MQTT broker or an in-memory
//! scripted transport for testing.

use async_trait::async_trait;

use crate::{InboundMessage, QoS};

/// Errors reported by a broker transport.
///
/// Every variant is fatal to a replay run: there is no retry policy at
/// this layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Could not establish or lost the broker connection.
    #[error("connection error: {message}")]
    Connection {
        /// Details about the connection failure.
        message: String,
    },

    /// The broker did not acknowledge the connection in time.
    #[error("connect to {address} timed out")]
    ConnectTimeout {
        /// The broker address being connected to.
        address: String,
    },

    /// Publishing a message failed.
    #[error("publish to {topic} failed: {message}")]
    Publish {
        /// Topic of the failed publish.
        topic: String,
        /// Details about the failure.
        message: String,
    },

    /// Subscribing to topics failed.
    #[error("subscribe failed: {message}")]
    Subscribe {
        /// Details about the failure.
        message: String,
    },

    /// The inbound message stream has ended.
    #[error("transport closed")]
    Closed,
}

/// Provider trait for a publish/subscribe broker session.
///
/// The session is owned by a single flow of control for the lifetime of a
/// run, so methods take `&mut self` and no `Send` bounds are needed.
#[async_trait(?Send)]
pub trait BrokerTransport {
    /// Publish `payload` on `topic`.
    ///
    /// Returns once the transport has accepted the message.
    async fn publish(&mut self, topic: &str, payload: Vec<u8>, qos: QoS)
    -> Result<(), TransportError>;

    /// Subscribe to every `(topic, qos)` pair in one request.
    async fn subscribe(&mut self, subscriptions: &[(String, QoS)]) -> Result<(), TransportError>;

    /// Wait for the next inbound message on any subscribed topic.
    ///
    /// Pends until a message arrives; callers bound the wait with
    /// [`TimeProvider::timeout`](crate::TimeProvider::timeout). Must be
    /// cancel safe.
    async fn recv(&mut self) -> Result<InboundMessage, TransportError>;

    /// Drop every inbound message already received, without waiting.
    ///
    /// Returns how many were dropped. A queued transport error is returned
    /// instead of being discarded.
    fn discard_pending(&mut self) -> Result<usize, TransportError>;

    /// Flush outstanding publishes and close the session.
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}
