//! The scenario execution engine.
//!
//! A pass runs `Idle → Subscribing → Running(i) → AwaitingExpectations(i) →
//! Running(i+1) → … → Done` on a single flow of control:
//!
//! 1. Subscribe to every `mqtt_subscribe` channel and build the routing
//!    table from topic back to channel.
//! 2. For each entry, in order: encode every content channel, drop inbound
//!    messages left over from earlier entries, put `time` (or else `gps`)
//!    first, and publish sequentially.
//! 3. If the entry expects responses, compare inbound messages until every
//!    expected channel has matched or the timeout elapses.
//! 4. Sleep `sleep / speed` before the next entry, unless speed is zero.
//!
//! Mismatches and timeouts are counted in the [`RunReport`]; transport
//! failures, encoding errors and unroutable topics abort the pass.

mod state;

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use rtpusher_core::{BrokerTransport, DocumentCodec, JsonCodec, QoS, TimeError, TimeProvider};

use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::matcher::{MatchOutcome, ResponseMatcher};
use crate::payload::{EncodedMessage, PayloadEncoder};
use crate::report::{Diagnostic, RunReport};
use crate::scenario::{Entry, Expectation, Scenario};
use crate::sentence::SentenceClock;

pub use state::{EnginePhase, RunState, SubscriptionTable};

/// Channel published first whenever an entry contains it.
pub const TIME_CHANNEL: &str = "time";

/// Channel published first when an entry has no [`TIME_CHANNEL`].
pub const GPS_CHANNEL: &str = "gps";

/// Reorder an entry's messages for dispatch.
///
/// Downstream consumers need a time reference before the data it
/// timestamps, so `time` goes first; failing that, `gps`. Everything else
/// keeps its relative order.
pub fn dispatch_order<M>(mut items: Vec<M>, channel: impl Fn(&M) -> &str) -> Vec<M> {
    let lead = [TIME_CHANNEL, GPS_CHANNEL]
        .into_iter()
        .find_map(|wanted| items.iter().position(|item| channel(item) == wanted));
    if let Some(position) = lead {
        let item = items.remove(position);
        items.insert(0, item);
    }
    items
}

/// Replays scenarios over a broker transport.
///
/// Structured channels are encoded and decoded with `C`, JSON by default.
pub struct ScenarioEngine<T: BrokerTransport, P: TimeProvider, C: DocumentCodec = JsonCodec> {
    transport: T,
    time: P,
    config: PlayerConfig,
    encoder: PayloadEncoder<C>,
    matcher: ResponseMatcher<C>,
    subscriptions: SubscriptionTable,
    state: RunState,
    phase: EnginePhase,
}

impl<T: BrokerTransport, P: TimeProvider> ScenarioEngine<T, P> {
    /// Create an engine owning `transport` for its lifetime.
    pub fn new(transport: T, time: P, config: PlayerConfig) -> Self {
        Self::with_codec(transport, time, config, JsonCodec)
    }
}

impl<T: BrokerTransport, P: TimeProvider, C: DocumentCodec> ScenarioEngine<T, P, C> {
    /// Create an engine using `codec` for structured channels.
    pub fn with_codec(transport: T, time: P, config: PlayerConfig, codec: C) -> Self {
        Self {
            transport,
            time,
            config,
            encoder: PayloadEncoder::with_codec(codec.clone()),
            matcher: ResponseMatcher::with_codec(codec),
            subscriptions: SubscriptionTable::default(),
            state: RunState::default(),
            phase: EnginePhase::Idle,
        }
    }

    /// Current position in the pass.
    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Sentence timestamp state carried between entries and passes.
    pub fn sentence_clock(&self) -> &SentenceClock {
        &self.state.clock
    }

    /// Routing table built by the last pass.
    pub fn subscriptions(&self) -> &SubscriptionTable {
        &self.subscriptions
    }

    /// Borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back, ending the engine.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Play every entry of `scenario` once.
    ///
    /// Returns the pass report even when expectations failed; check
    /// [`RunReport::is_success`]. Returns `Err` only for fatal conditions,
    /// leaving later entries unplayed.
    pub async fn run(&mut self, scenario: &Scenario) -> Result<RunReport, PlayerError> {
        scenario.validate()?;
        let started = Instant::now();
        self.state.begin_pass();

        self.subscribe(scenario).await?;

        let timeout = self
            .config
            .expect_timeout
            .unwrap_or_else(|| scenario.expect_timeout());
        for (index, entry) in scenario.entries.iter().enumerate() {
            self.play_entry(scenario, index, entry, timeout).await?;
        }
        self.phase = EnginePhase::Done;

        let mut report = std::mem::take(&mut self.state.report);
        report.elapsed = started.elapsed();
        if report.is_success() {
            tracing::info!("Test finished OK!");
        } else {
            tracing::error!("Test finished with {} errors", report.errors());
        }
        Ok(report)
    }

    async fn subscribe(&mut self, scenario: &Scenario) -> Result<(), PlayerError> {
        self.phase = EnginePhase::Subscribing;
        self.subscriptions = SubscriptionTable::from_scenario(scenario);

        let requested: Vec<(String, QoS)> = scenario
            .subscribe
            .iter()
            .map(|(name, spec)| {
                tracing::debug!(channel = %name, topic = %spec.topic, qos = %spec.qos, "Subscribe");
                (spec.topic.clone(), spec.qos)
            })
            .collect();
        if !requested.is_empty() {
            self.transport.subscribe(&requested).await?;
            tracing::debug!(topics = requested.len(), "MQTT subscribed");
        }
        Ok(())
    }

    async fn play_entry(
        &mut self,
        scenario: &Scenario,
        index: usize,
        entry: &Entry,
        timeout: Duration,
    ) -> Result<(), PlayerError> {
        self.phase = EnginePhase::Running { index };
        tracing::info!("ID: {}", entry.id);

        // Encode in document order so relative sentence durations chain in
        // the order they were written.
        let now = self.time.wall_clock();
        let mut messages = Vec::with_capacity(entry.content.len());
        for (channel, content) in &entry.content {
            let message =
                self.encoder
                    .encode(&scenario.publish, channel, content, &mut self.state.clock, now)?;
            tracing::debug!(
                "Topic {}, Payload {}",
                message.topic,
                String::from_utf8_lossy(&message.payload)
            );
            messages.push(message);
        }

        // Anything received since the last expectation window belongs to an
        // earlier entry.
        let stale = self.transport.discard_pending()?;
        if stale > 0 {
            tracing::debug!(
                discarded = stale,
                "Dropped inbound messages received outside an expectation window"
            );
        }

        for message in dispatch_order(messages, |m: &EncodedMessage| m.channel.as_str()) {
            self.transport
                .publish(&message.topic, message.payload, message.qos)
                .await?;
            self.state.report.published += 1;
            tracing::debug!(topic = %message.topic, channel = %message.channel, "Published");
        }
        if !entry.content.is_empty() {
            let names: Vec<&str> = entry.content.keys().map(String::as_str).collect();
            tracing::info!("Sent {}", names.join(", "));
        }

        if let Some(expect) = entry.expect.as_ref().filter(|expect| !expect.is_empty()) {
            self.phase = EnginePhase::AwaitingExpectations { index };
            self.await_expectations(&entry.id, expect, timeout).await?;
        }

        if let Some(delay) = self.config.speed.scale(entry.sleep.unwrap_or(0.0)) {
            tracing::info!("Sleeping for {:.3} seconds", delay.as_secs_f64());
            self.time.sleep(delay).await;
        }

        self.state.report.entries += 1;
        Ok(())
    }

    async fn await_expectations(
        &mut self,
        entry_id: &str,
        expect: &IndexMap<String, Expectation>,
        timeout: Duration,
    ) -> Result<(), PlayerError> {
        let Self {
            transport,
            time,
            matcher,
            subscriptions,
            state,
            ..
        } = self;
        state.remaining = expect.clone();

        let waited = time
            .timeout(timeout, async {
                while !state.remaining.is_empty() {
                    let message = transport.recv().await?;
                    let (channel, format) = subscriptions
                        .route(&message.topic)
                        .ok_or_else(|| PlayerError::UnroutableTopic(message.topic.clone()))?;
                    state.report.received += 1;

                    let outcome =
                        matcher.check(channel, state.remaining.get(channel), format, &message.payload);
                    match outcome {
                        MatchOutcome::Matched => {
                            tracing::debug!("Got expected result on channel {}", channel);
                            state.remaining.shift_remove(channel);
                        }
                        // The channel stays outstanding: a later message may still match.
                        MatchOutcome::Mismatched(diagnostics) => {
                            tracing::error!(
                                "Got unexpected result on channel {} = {}",
                                channel,
                                String::from_utf8_lossy(&message.payload)
                            );
                            state.record_failure(entry_id, diagnostics);
                        }
                    }
                }
                Ok::<(), PlayerError>(())
            })
            .await;

        match waited {
            Ok(result) => result,
            Err(TimeError::Elapsed) => {
                let missing: Vec<String> = state.remaining.drain(..).map(|(name, _)| name).collect();
                tracing::error!(
                    "Didn't receive expected result from channel(s): {}",
                    missing.join(", ")
                );
                for channel in missing {
                    state.record_failure(entry_id, vec![Diagnostic::NotReceived { channel }]);
                }
                Ok(())
            }
        }
    }
}
