//! # rtpusher-core
//!
//! Core abstractions for the rtpusher scenario player.
//!
//! This crate provides the traits and types the player is written against,
//! so the scenario engine can run unchanged over a real broker connection or
//! over a scripted in-memory transport in tests:
//!
//! - **Provider traits**: Abstractions for time and broker transport
//! - **Wire types**: QoS levels, inbound messages, broker addresses
//! - **Codec trait**: Structured document serialization
//!
//! ## Provider Traits
//!
//! - [`TimeProvider`]: Sleep, timeout, and wall-clock operations
//! - [`BrokerTransport`]: Publish, subscribe and receive on a pub/sub broker
//!
//! ## Wire Types
//!
//! - [`QoS`]: MQTT delivery guarantee level
//! - [`InboundMessage`]: A message received on a subscribed topic
//! - [`BrokerAddress`]: Host + port of the broker

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod codec;
mod time;
mod transport;
mod types;

// Codec exports
pub use codec::{CodecError, Document, DocumentCodec, JsonCodec};

// Provider trait exports
pub use time::{TimeError, TimeProvider, TokioTimeProvider};
pub use transport::{BrokerTransport, TransportError};

// Wire type exports
pub use types::{
    BrokerAddress, BrokerAddressParseError, DEFAULT_MQTT_PORT, InboundMessage, InvalidQoS, QoS,
};
