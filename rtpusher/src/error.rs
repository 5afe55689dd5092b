//! Error types for the rtpusher player.
//!
//! Everything here is fatal to a run. Expectation mismatches and timeouts are
//! not errors: they are recorded as [`Diagnostic`](crate::Diagnostic)s in the
//! run report.

use std::path::PathBuf;

use rtpusher_core::{CodecError, TransportError};
use thiserror::Error;

/// Errors that abort a replay run.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The scenario document is malformed or inconsistent.
    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    /// A channel's content could not be turned into a payload.
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),

    /// A tabular replay file is malformed.
    #[error("tabular error: {0}")]
    Tabular(#[from] TabularError),

    /// The broker transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A message arrived on a topic no subscription accounts for.
    #[error("received message on unroutable topic: {0}")]
    UnroutableTopic(String),
}

/// Errors loading or validating a scenario document.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Failed to read the scenario file.
    #[error("failed to read scenario file {path}: {source}")]
    Io {
        /// Path of the scenario file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the scenario YAML.
    #[error("failed to parse scenario YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A channel declares a payload format this player does not know.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// An entry publishes on a channel missing from `mqtt_publish`.
    #[error("entry {entry}: undefined channel {channel}")]
    UnknownChannel {
        /// Identifier of the offending entry.
        entry: String,
        /// The undeclared channel name.
        channel: String,
    },

    /// An entry expects a response on a channel missing from `mqtt_subscribe`.
    #[error("entry {entry}: expectation on unsubscribed channel {channel}")]
    UnknownExpectation {
        /// Identifier of the offending entry.
        entry: String,
        /// The unsubscribed channel name.
        channel: String,
    },

    /// Two subscribe channels share a topic, so inbound routing is ambiguous.
    #[error("topic {topic} is subscribed by both {first} and {second}")]
    DuplicateTopic {
        /// The shared topic.
        topic: String,
        /// First channel declaring it.
        first: String,
        /// Second channel declaring it.
        second: String,
    },

    /// A numeric setting is negative or not finite.
    #[error("invalid {field}: {value}")]
    InvalidNumber {
        /// Name of the setting.
        field: String,
        /// The rejected value.
        value: f64,
    },
}

/// Errors encoding a channel's content into a payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The channel is not declared in the publish configuration.
    #[error("undefined channel: {0}")]
    UnknownChannel(String),

    /// A referenced file could not be read.
    #[error("failed to read {path}: {source}")]
    FileRead {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A file inlined as text is not valid UTF-8.
    #[error("file {0} is not valid UTF-8 (use a FILE_BASE64_ key for binary data)")]
    NonUtf8File(PathBuf),

    /// A required content field is absent.
    #[error("channel {channel}: missing field {field}")]
    MissingField {
        /// Channel being encoded.
        channel: String,
        /// The absent field.
        field: String,
    },

    /// A content field has the wrong type or shape.
    #[error("channel {channel}: invalid field {field}: {reason}")]
    InvalidField {
        /// Channel being encoded.
        channel: String,
        /// The malformed field.
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// An absolute timestamp could not be parsed.
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    /// A relative duration could not be parsed or applied.
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),

    /// A raw-bytes channel has none of `base64`, `file` or `string`.
    #[error("channel {0}: no binary contents found")]
    NoPayloadSource(String),

    /// Inline base64 content could not be decoded.
    #[error("invalid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The structured document could not be serialized.
    #[error("encode failed: {0}")]
    Encode(#[from] CodecError),
}

/// Errors parsing a tabular replay file.
#[derive(Debug, Error)]
pub enum TabularError {
    /// Failed to read the file.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A row does not have exactly four fields.
    #[error("line {line}: expected 4 fields, found {found}")]
    FieldCount {
        /// 1-based line number.
        line: usize,
        /// Number of fields present.
        found: usize,
    },

    /// The timestamp column is not a number.
    #[error("line {line}: invalid timestamp {value:?}")]
    InvalidTimestamp {
        /// 1-based line number.
        line: usize,
        /// The rejected text.
        value: String,
    },

    /// The QoS column is not 0, 1 or 2.
    #[error("line {line}: invalid QoS {value:?}")]
    InvalidQoS {
        /// 1-based line number.
        line: usize,
        /// The rejected text.
        value: String,
    },

    /// The payload column is not valid base64.
    #[error("line {line}: invalid base64 payload: {source}")]
    InvalidPayload {
        /// 1-based line number.
        line: usize,
        /// Decoder error.
        source: base64::DecodeError,
    },
}
