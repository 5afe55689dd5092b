//! Expectation diagnostics and run reporting.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::scenario::PayloadFormat;

/// Why an inbound message (or its absence) did not satisfy an expectation.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A field was present with the wrong value.
    FieldMismatch {
        /// Channel the message arrived on.
        channel: String,
        /// Field name.
        field: String,
        /// Value the scenario expected.
        expected: Value,
        /// Value actually received.
        actual: Value,
    },
    /// An expected field was absent from the message.
    MissingField {
        /// Channel the message arrived on.
        channel: String,
        /// Field name.
        field: String,
    },
    /// A message arrived on a channel with no outstanding expectation.
    UnexpectedData {
        /// Channel the message arrived on.
        channel: String,
    },
    /// The channel's decode format cannot be compared field by field.
    UnsupportedFormat {
        /// Channel the message arrived on.
        channel: String,
        /// The channel's declared format.
        format: PayloadFormat,
    },
    /// The payload did not decode as a structured document.
    Undecodable {
        /// Channel the message arrived on.
        channel: String,
        /// Decoder error.
        reason: String,
    },
    /// No matching message arrived before the expectation timeout.
    NotReceived {
        /// Channel that stayed silent.
        channel: String,
    },
}

impl Diagnostic {
    /// Channel this diagnostic concerns.
    pub fn channel(&self) -> &str {
        match self {
            Diagnostic::FieldMismatch { channel, .. }
            | Diagnostic::MissingField { channel, .. }
            | Diagnostic::UnexpectedData { channel }
            | Diagnostic::UnsupportedFormat { channel, .. }
            | Diagnostic::Undecodable { channel, .. }
            | Diagnostic::NotReceived { channel } => channel,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::FieldMismatch {
                channel,
                field,
                expected,
                actual,
            } => write!(
                f,
                "expect mismatch on {channel} for {field}: expected {expected}, got {actual}"
            ),
            Diagnostic::MissingField { channel, field } => {
                write!(f, "missing data {field} on {channel}")
            }
            Diagnostic::UnexpectedData { channel } => write!(f, "unexpected data on {channel}"),
            Diagnostic::UnsupportedFormat { channel, format } => {
                write!(f, "unsupported format {format} on {channel}")
            }
            Diagnostic::Undecodable { channel, reason } => {
                write!(f, "undecodable payload on {channel}: {reason}")
            }
            Diagnostic::NotReceived { channel } => {
                write!(f, "did not receive expected result on {channel}")
            }
        }
    }
}

/// A counted failure: one mismatching message or one timed-out channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    /// Identifier of the entry being played.
    pub entry: String,
    /// Everything wrong with it; at least one item.
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of one scenario pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Entries played to completion.
    pub entries: usize,
    /// Messages published.
    pub published: usize,
    /// Inbound messages compared against expectations.
    pub received: usize,
    /// Every counted failure, in order of occurrence.
    pub failures: Vec<Failure>,
    /// Wall-clock time the pass took.
    pub elapsed: Duration,
}

impl RunReport {
    /// Cumulative error count.
    pub fn errors(&self) -> usize {
        self.failures.len()
    }

    /// Whether the pass finished without errors.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Replay Report ===")?;
        writeln!(f, "Entries: {}", self.entries)?;
        writeln!(f, "Published: {}", self.published)?;
        writeln!(f, "Received: {}", self.received)?;
        writeln!(f, "Elapsed: {:?}", self.elapsed)?;
        writeln!(f, "Errors: {}", self.errors())?;

        if !self.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "=== Failures ===")?;
            for failure in &self.failures {
                for diagnostic in &failure.diagnostics {
                    writeln!(f, "  - [{}] {}", failure.entry, diagnostic)?;
                }
            }
        }

        Ok(())
    }
}
