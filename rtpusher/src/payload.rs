//! Channel content to `(topic, bytes)` encoding.
//!
//! | format | content |
//! |--------|---------|
//! | `json`  | key/value pairs; `FILE_<key>` inlines a file as text, `FILE_BASE64_<key>` as base64 |
//! | `nmea`  | `lat`, `long`, optional `timestamp`, `duration`, `status` |
//! | `bytes` | one of `base64`, `file`, `string`, checked in that order |

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rtpusher_core::{Document, DocumentCodec, JsonCodec, QoS};
use serde_json::Value;

use crate::encoding::{b64_decode, b64_encode};
use crate::error::PayloadError;
use crate::scenario::{ChannelContent, ChannelMap, PayloadFormat};
use crate::sentence::{self, Fix, IsoDuration, SentenceClock, STATUS_VALID};

/// Key prefix that replaces a structured value with a file's contents.
pub const FILE_PREFIX: &str = "FILE_";

/// Key prefix (after [`FILE_PREFIX`]) that base64-encodes the file contents.
pub const BASE64_PREFIX: &str = "BASE64_";

/// A payload ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    /// Channel the payload was built for.
    pub channel: String,
    /// Destination topic.
    pub topic: String,
    /// Payload bytes.
    pub payload: Vec<u8>,
    /// Publish QoS.
    pub qos: QoS,
}

/// Builds publishable payloads from channel content.
#[derive(Debug, Clone, Default)]
pub struct PayloadEncoder<C: DocumentCodec = JsonCodec> {
    codec: C,
}

impl PayloadEncoder<JsonCodec> {
    /// An encoder producing JSON for structured channels.
    pub fn new() -> Self {
        Self { codec: JsonCodec }
    }
}

impl<C: DocumentCodec> PayloadEncoder<C> {
    /// An encoder using a custom structured document codec.
    pub fn with_codec(codec: C) -> Self {
        Self { codec }
    }

    /// Encode one channel's content.
    ///
    /// `clock` and `now` are only consulted for sentence channels; every
    /// other format is a pure function of the configuration and content.
    pub fn encode(
        &self,
        channels: &ChannelMap,
        channel: &str,
        content: &ChannelContent,
        clock: &mut SentenceClock,
        now: DateTime<Utc>,
    ) -> Result<EncodedMessage, PayloadError> {
        let spec = channels
            .get(channel)
            .ok_or_else(|| PayloadError::UnknownChannel(channel.to_string()))?;

        let payload = match spec.format {
            PayloadFormat::Structured => self.encode_structured(channel, content)?,
            PayloadFormat::Sentence => encode_sentence(channel, content, clock, now)?.into_bytes(),
            PayloadFormat::RawBytes => encode_raw(channel, content)?,
        };

        Ok(EncodedMessage {
            channel: channel.to_string(),
            topic: spec.topic.clone(),
            payload,
            qos: spec.qos,
        })
    }

    fn encode_structured(
        &self,
        channel: &str,
        content: &ChannelContent,
    ) -> Result<Vec<u8>, PayloadError> {
        let mut doc = Document::new();
        for (key, value) in content {
            let Some(file_key) = key.strip_prefix(FILE_PREFIX) else {
                doc.insert(key.clone(), value.clone());
                continue;
            };
            let path = string_field(channel, key, value)?;
            let bytes = read_file(Path::new(path))?;
            let (out_key, text) = match file_key.strip_prefix(BASE64_PREFIX) {
                Some(b64_key) => (b64_key, b64_encode(&bytes)),
                None => (
                    file_key,
                    String::from_utf8(bytes).map_err(|_| PayloadError::NonUtf8File(path.into()))?,
                ),
            };
            doc.insert(out_key.to_string(), Value::String(text));
        }
        Ok(self.codec.encode(&doc)?)
    }
}

fn encode_sentence(
    channel: &str,
    content: &ChannelContent,
    clock: &mut SentenceClock,
    now: DateTime<Utc>,
) -> Result<String, PayloadError> {
    let lat = number_field(channel, content, "lat")?;
    let lon = number_field(channel, content, "long")?;

    let explicit = match content.get("timestamp") {
        Some(value) => Some(sentence::parse_timestamp(string_field(
            channel,
            "timestamp",
            value,
        )?)?),
        None => None,
    };
    let offset = match content.get("duration") {
        Some(Value::Number(n)) => Some(IsoDuration::from_secs_f64(
            n.as_f64().unwrap_or(f64::NAN),
        )?),
        Some(value) => Some(string_field(channel, "duration", value)?.parse()?),
        None => None,
    };
    let status = match content.get("status") {
        Some(value) => string_field(channel, "status", value)?.to_string(),
        None => STATUS_VALID.to_string(),
    };

    let timestamp = clock.resolve(explicit, offset.as_ref(), now)?;
    Ok(sentence::encode_rmc(&Fix {
        lat,
        lon,
        status,
        timestamp,
    }))
}

fn encode_raw(channel: &str, content: &ChannelContent) -> Result<Vec<u8>, PayloadError> {
    if let Some(value) = content.get("base64") {
        return Ok(b64_decode(string_field(channel, "base64", value)?)?);
    }
    if let Some(value) = content.get("file") {
        return read_file(Path::new(string_field(channel, "file", value)?));
    }
    if let Some(value) = content.get("string") {
        return Ok(string_field(channel, "string", value)?.as_bytes().to_vec());
    }
    Err(PayloadError::NoPayloadSource(channel.to_string()))
}

fn read_file(path: &Path) -> Result<Vec<u8>, PayloadError> {
    std::fs::read(path).map_err(|source| PayloadError::FileRead {
        path: PathBuf::from(path),
        source,
    })
}

fn number_field(channel: &str, content: &ChannelContent, field: &str) -> Result<f64, PayloadError> {
    match content.get(field) {
        Some(value) => value.as_f64().ok_or_else(|| PayloadError::InvalidField {
            channel: channel.to_string(),
            field: field.to_string(),
            reason: format!("expected a number, got {value}"),
        }),
        None => Err(PayloadError::MissingField {
            channel: channel.to_string(),
            field: field.to_string(),
        }),
    }
}

fn string_field<'a>(channel: &str, field: &str, value: &'a Value) -> Result<&'a str, PayloadError> {
    value.as_str().ok_or_else(|| PayloadError::InvalidField {
        channel: channel.to_string(),
        field: field.to_string(),
        reason: format!("expected a string, got {value}"),
    })
}
