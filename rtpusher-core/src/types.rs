//! Wire types shared between the player and its transports.
//!
//! - [`QoS`]: MQTT delivery guarantee level
//! - [`InboundMessage`]: topic + payload received from the broker
//! - [`BrokerAddress`]: host + port of the broker

use serde::{Deserialize, Serialize};

/// Default MQTT port used when an address omits one.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// MQTT quality-of-service level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QoS {
    /// Fire and forget (0).
    #[default]
    AtMostOnce,
    /// Acknowledged delivery (1).
    AtLeastOnce,
    /// Assured single delivery (2).
    ExactlyOnce,
}

/// Error for a QoS level outside 0..=2.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid QoS level {0} (expected 0, 1 or 2)")]
pub struct InvalidQoS(pub u8);

impl TryFrom<u8> for QoS {
    type Error = InvalidQoS;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(InvalidQoS(other)),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

impl std::fmt::Display for QoS {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl InboundMessage {
    /// Create a new inbound message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Broker address (hostname or IP + port).
///
/// # Examples
///
/// ```
/// use rtpusher_core::BrokerAddress;
///
/// let addr: BrokerAddress = "broker.local".parse().expect("valid address");
/// assert_eq!(addr.to_string(), "broker.local:1883");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrokerAddress {
    /// Hostname or IP literal (without IPv6 brackets).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl BrokerAddress {
    /// Create a new broker address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse from `host`, `host:port`, `[v6]` or `[v6]:port`.
    ///
    /// A missing port defaults to [`DEFAULT_MQTT_PORT`]. A bare IPv6
    /// literal without brackets is accepted as a host.
    ///
    /// # Errors
    ///
    /// Returns error if the host is empty or the port cannot be parsed.
    pub fn parse(s: &str) -> Result<Self, BrokerAddressParseError> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or(BrokerAddressParseError::UnclosedBracket)?;
            if host.is_empty() {
                return Err(BrokerAddressParseError::EmptyHost);
            }
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(port)?,
                None if tail.is_empty() => DEFAULT_MQTT_PORT,
                None => return Err(BrokerAddressParseError::InvalidPort),
            };
            return Ok(Self::new(host, port));
        }

        match s.split_once(':') {
            // More than one colon: an unbracketed IPv6 literal.
            Some((_, tail)) if tail.contains(':') => Ok(Self::new(s, DEFAULT_MQTT_PORT)),
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(BrokerAddressParseError::EmptyHost);
                }
                Ok(Self::new(host, parse_port(port)?))
            }
            None if s.is_empty() => Err(BrokerAddressParseError::EmptyHost),
            None => Ok(Self::new(s, DEFAULT_MQTT_PORT)),
        }
    }
}

fn parse_port(s: &str) -> Result<u16, BrokerAddressParseError> {
    s.parse()
        .map_err(|_| BrokerAddressParseError::InvalidPort)
}

impl std::str::FromStr for BrokerAddress {
    type Err = BrokerAddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl Default for BrokerAddress {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_MQTT_PORT)
    }
}

/// Error parsing a broker address from string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerAddressParseError {
    /// No host given.
    #[error("empty broker host")]
    EmptyHost,
    /// The port number could not be parsed.
    #[error("invalid port number")]
    InvalidPort,
    /// An IPv6 literal was opened with `[` but never closed.
    #[error("unclosed '[' in IPv6 address")]
    UnclosedBracket,
}
