//! # rtpusher
//!
//! Scripted test-data player for publish/subscribe brokers.
//!
//! rtpusher replays a declarative scenario of timed messages over MQTT to
//! simulate a device feed (location, telemetry, raw blobs), optionally
//! checking that the system under test answers on subscribed topics within
//! a timeout.
//!
//! ## Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  rtpusher (this crate)                      │
//! │  scenario ─► payload ─► engine ◄─ matcher      tabular      │
//! │              (sentence)    │                      │         │
//! │                            └──── mqtt (rumqttc) ──┘         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     rtpusher-core                           │
//! │  Provider traits: TimeProvider, BrokerTransport             │
//! │  Wire types: QoS, InboundMessage, BrokerAddress, codec      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use rtpusher::{BrokerConfig, MqttTransport, PlayerConfig, Scenario, ScenarioEngine};
//! use rtpusher_core::TokioTimeProvider;
//!
//! let scenario = Scenario::load("feed.yaml")?;
//! let transport = MqttTransport::connect(&BrokerConfig::default()).await?;
//! let mut engine = ScenarioEngine::new(transport, TokioTimeProvider::new(), PlayerConfig::default());
//! let report = engine.run(&scenario).await?;
//! println!("{report}");
//! ```

#![deny(missing_docs)]

pub mod config;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod mqtt;
pub mod payload;
pub mod report;
pub mod scenario;
pub mod sentence;
pub mod tabular;

pub use config::{BrokerConfig, PlayerConfig, SpeedFactor};
pub use engine::{EnginePhase, ScenarioEngine, dispatch_order};
pub use error::{PayloadError, PlayerError, ScenarioError, TabularError};
pub use matcher::{MatchOutcome, ResponseMatcher};
pub use mqtt::MqttTransport;
pub use payload::{EncodedMessage, PayloadEncoder};
pub use report::{Diagnostic, Failure, RunReport};
pub use scenario::{PayloadFormat, Scenario};
pub use tabular::{TabularRow, load_rows, parse_rows, replay_rows};
