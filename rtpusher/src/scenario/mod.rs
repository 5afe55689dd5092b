//! Declarative replay scenarios.
//!
//! A scenario is a YAML document with four top-level keys:
//!
//! ```yaml
//! mqtt_publish:
//!   gps: {topic: device/gps, format: nmea}
//!   sensor: {topic: device/sensor, format: json, qos: 1}
//! mqtt_subscribe:
//!   status: {topic: backend/status}
//! timeout: 3.0
//! testdata:
//!   - id: t1
//!     content:
//!       gps: {lat: 59.33, long: 18.07, timestamp: "2024-01-01T10:00:00Z"}
//!     expect:
//!       status: {position: ok}
//!     sleep: 2
//! ```

mod types;

use std::path::Path;

pub use types::{
    ChannelContent, ChannelMap, ChannelSpec, DEFAULT_EXPECT_TIMEOUT_SECS, Entry, Expectation,
    PayloadFormat, Scenario, SubscribeSpec,
};

use crate::error::ScenarioError;

impl Scenario {
    /// Parse a scenario from YAML text.
    ///
    /// Only parses; call [`Scenario::validate`] to check cross references.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a scenario from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let scenario = Self::from_yaml_str(&text)?;
        tracing::debug!(
            path = %path.display(),
            entries = scenario.entries.len(),
            "Loaded scenario"
        );
        Ok(scenario)
    }
}
