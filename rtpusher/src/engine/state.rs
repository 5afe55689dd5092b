//! Engine-private mutable state.

use indexmap::IndexMap;

use crate::report::{Diagnostic, Failure, RunReport};
use crate::scenario::{Expectation, PayloadFormat, Scenario};
use crate::sentence::SentenceClock;

/// Where the engine is in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnginePhase {
    /// Nothing started yet.
    #[default]
    Idle,
    /// Issuing subscriptions before the first entry.
    Subscribing,
    /// Building and publishing entry `index`.
    Running {
        /// Zero-based entry index.
        index: usize,
    },
    /// Waiting for entry `index`'s expected responses.
    AwaitingExpectations {
        /// Zero-based entry index.
        index: usize,
    },
    /// Every entry played.
    Done,
}

/// Mutable state of one engine, updated only by its single flow of control.
#[derive(Debug, Default)]
pub struct RunState {
    /// Last resolved sentence timestamp; survives across passes.
    pub clock: SentenceClock,
    /// Expectations not yet satisfied for the current entry.
    pub remaining: IndexMap<String, Expectation>,
    /// Counters and failures of the current pass.
    pub report: RunReport,
}

impl RunState {
    /// Reset per-pass accounting, keeping the sentence clock.
    pub fn begin_pass(&mut self) {
        self.remaining.clear();
        self.report = RunReport::default();
    }

    /// Count one failure for `entry`.
    pub fn record_failure(&mut self, entry: &str, diagnostics: Vec<Diagnostic>) {
        for diagnostic in &diagnostics {
            tracing::error!(entry, "{diagnostic}");
        }
        self.report.failures.push(Failure {
            entry: entry.to_string(),
            diagnostics,
        });
    }

    /// Cumulative error count of the current pass.
    pub fn errors(&self) -> usize {
        self.report.errors()
    }
}

/// Maps subscribed topics back to the channel that declared them.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionTable {
    routes: IndexMap<String, (String, PayloadFormat)>,
}

impl SubscriptionTable {
    /// Build the table from a scenario's subscribe declarations.
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let routes = scenario
            .subscribe
            .iter()
            .map(|(name, spec)| (spec.topic.clone(), (name.clone(), spec.format)))
            .collect();
        Self { routes }
    }

    /// Channel name and decode format for `topic`.
    pub fn route(&self, topic: &str) -> Option<(&str, PayloadFormat)> {
        self.routes
            .get(topic)
            .map(|(channel, format)| (channel.as_str(), *format))
    }

    /// Number of subscribed topics.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
