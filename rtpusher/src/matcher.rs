//! Comparison of inbound payloads against declared expectations.

use rtpusher_core::{DocumentCodec, JsonCodec};
use serde_json::Value;

use crate::report::Diagnostic;
use crate::scenario::{Expectation, PayloadFormat};

/// Result of comparing one message against a channel's expectation.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Every declared field is present with the expected value.
    Matched,
    /// At least one problem; never empty.
    Mismatched(Vec<Diagnostic>),
}

impl MatchOutcome {
    /// Whether the expectation is satisfied.
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched)
    }
}

/// Compares decoded payloads with expectations.
#[derive(Debug, Clone, Default)]
pub struct ResponseMatcher<C: DocumentCodec = JsonCodec> {
    codec: C,
}

impl ResponseMatcher<JsonCodec> {
    /// A matcher decoding structured payloads as JSON.
    pub fn new() -> Self {
        Self { codec: JsonCodec }
    }
}

impl<C: DocumentCodec> ResponseMatcher<C> {
    /// A matcher using a custom structured document codec.
    pub fn with_codec(codec: C) -> Self {
        Self { codec }
    }

    /// Compare `payload`, received on `channel`, with `expected`.
    ///
    /// `expected` is `None` when the channel has no outstanding expectation
    /// (never declared for this entry, already satisfied, or declared null).
    /// Only structured payloads can be compared.
    pub fn check(
        &self,
        channel: &str,
        expected: Option<&Expectation>,
        format: PayloadFormat,
        payload: &[u8],
    ) -> MatchOutcome {
        let mismatch = |diagnostic| MatchOutcome::Mismatched(vec![diagnostic]);

        if format != PayloadFormat::Structured {
            return mismatch(Diagnostic::UnsupportedFormat {
                channel: channel.to_string(),
                format,
            });
        }
        let doc = match self.codec.decode(payload) {
            Ok(doc) => doc,
            Err(e) => {
                return mismatch(Diagnostic::Undecodable {
                    channel: channel.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        let Some(Some(expected)) = expected else {
            return mismatch(Diagnostic::UnexpectedData {
                channel: channel.to_string(),
            });
        };

        let diagnostics: Vec<Diagnostic> = expected
            .iter()
            .filter_map(|(field, want)| match doc.get(field) {
                None => Some(Diagnostic::MissingField {
                    channel: channel.to_string(),
                    field: field.clone(),
                }),
                Some(got) if !values_equal(want, got) => Some(Diagnostic::FieldMismatch {
                    channel: channel.to_string(),
                    field: field.clone(),
                    expected: want.clone(),
                    actual: got.clone(),
                }),
                Some(_) => None,
            })
            .collect();

        if diagnostics.is_empty() {
            MatchOutcome::Matched
        } else {
            MatchOutcome::Mismatched(diagnostics)
        }
    }
}

/// Structural equality where numbers compare by value, so `80` equals `80.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => x.as_f64() == y.as_f64(),
            },
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => a == b,
    }
}
