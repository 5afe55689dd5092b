//! Scenario type definitions.

use std::str::FromStr;
use std::time::Duration;

use indexmap::IndexMap;
use rtpusher_core::{Document, QoS};
use serde::{Deserialize, Deserializer};

use crate::error::ScenarioError;

/// Expectation wait applied when a scenario does not declare `timeout`.
pub const DEFAULT_EXPECT_TIMEOUT_SECS: f64 = 3.0;

/// Payload encoding of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum PayloadFormat {
    /// Key/value document (`json`).
    #[default]
    Structured,
    /// Positioning sentence (`nmea`).
    Sentence,
    /// Opaque bytes (`bytes`).
    RawBytes,
}

impl PayloadFormat {
    /// Name used in scenario documents.
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadFormat::Structured => "json",
            PayloadFormat::Sentence => "nmea",
            PayloadFormat::RawBytes => "bytes",
        }
    }
}

impl FromStr for PayloadFormat {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" | "structured" => Ok(PayloadFormat::Structured),
            "nmea" | "sentence" => Ok(PayloadFormat::Sentence),
            "bytes" | "raw" => Ok(PayloadFormat::RawBytes),
            other => Err(ScenarioError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl TryFrom<String> for PayloadFormat {
    type Error = ScenarioError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A channel the scenario publishes on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelSpec {
    /// Topic messages are published to.
    pub topic: String,
    /// How channel content is encoded.
    pub format: PayloadFormat,
    /// Publish QoS.
    #[serde(default)]
    pub qos: QoS,
}

/// A channel the scenario listens on for expected responses.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscribeSpec {
    /// Topic to subscribe to.
    pub topic: String,
    /// How inbound payloads are decoded.
    #[serde(default)]
    pub format: PayloadFormat,
    /// Subscription QoS.
    #[serde(default = "default_subscribe_qos")]
    pub qos: QoS,
}

fn default_subscribe_qos() -> QoS {
    QoS::AtLeastOnce
}

/// Publish channel declarations, in document order.
pub type ChannelMap = IndexMap<String, ChannelSpec>;

/// Content for one channel; shape depends on the channel's format.
pub type ChannelContent = Document;

/// Required field/value pairs for one subscribed channel.
///
/// A `null` expectation in the document is kept as `None`; any message on
/// such a channel is reported as unexpected data.
pub type Expectation = Option<Document>;

/// One scenario step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Entry {
    /// Identifier used in logs and diagnostics.
    #[serde(deserialize_with = "scalar_string")]
    pub id: String,
    /// Channel contents to publish, in document order.
    #[serde(default)]
    pub content: IndexMap<String, ChannelContent>,
    /// Responses to wait for after publishing.
    #[serde(default)]
    pub expect: Option<IndexMap<String, Expectation>>,
    /// Pause after dispatch, in seconds, before the next entry.
    #[serde(default)]
    pub sleep: Option<f64>,
}

/// A declarative replay scenario.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    /// Channels content may be published on.
    #[serde(default, rename = "mqtt_publish")]
    pub publish: ChannelMap,
    /// Channels responses are expected on.
    #[serde(default, rename = "mqtt_subscribe")]
    pub subscribe: IndexMap<String, SubscribeSpec>,
    /// Expectation wait per entry, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Steps, replayed strictly in order.
    #[serde(rename = "testdata")]
    pub entries: Vec<Entry>,
}

fn default_timeout() -> f64 {
    DEFAULT_EXPECT_TIMEOUT_SECS
}

impl Scenario {
    /// The expectation wait as a duration.
    pub fn expect_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_EXPECT_TIMEOUT_SECS))
    }

    /// Check cross references before anything is published.
    ///
    /// Every content channel must be declared in `mqtt_publish`, every
    /// expectation channel in `mqtt_subscribe`, subscribed topics must be
    /// unique, and numeric settings must be finite and non-negative.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        check_number("timeout", self.timeout)?;

        let mut topics: IndexMap<&str, &str> = IndexMap::new();
        for (name, spec) in &self.subscribe {
            if let Some(first) = topics.insert(&spec.topic, name) {
                return Err(ScenarioError::DuplicateTopic {
                    topic: spec.topic.clone(),
                    first: first.to_string(),
                    second: name.clone(),
                });
            }
        }

        for entry in &self.entries {
            if let Some(sleep) = entry.sleep {
                check_number("sleep", sleep)?;
            }
            for channel in entry.content.keys() {
                if !self.publish.contains_key(channel) {
                    return Err(ScenarioError::UnknownChannel {
                        entry: entry.id.clone(),
                        channel: channel.clone(),
                    });
                }
            }
            for channel in entry.expect.iter().flat_map(|expect| expect.keys()) {
                if !self.subscribe.contains_key(channel) {
                    return Err(ScenarioError::UnknownExpectation {
                        entry: entry.id.clone(),
                        channel: channel.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_number(field: &str, value: f64) -> Result<(), ScenarioError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ScenarioError::InvalidNumber {
            field: field.to_string(),
            value,
        })
    }
}

/// Accept any scalar (string, number, bool) as an identifier.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!(
            "entry id must be a scalar, got {other}"
        ))),
    }
}
