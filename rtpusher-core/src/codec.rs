//! Structured document serialization.
//!
//! Channels declared with the structured format carry a flat key/value
//! document. The [`DocumentCodec`] trait turns such a document into bytes
//! for publishing and back again when checking expected responses; the
//! default [`JsonCodec`] uses JSON.
//!
//! # Example
//!
//! ```rust
//! use rtpusher_core::{Document, DocumentCodec, JsonCodec};
//! use serde_json::json;
//!
//! let mut doc = Document::new();
//! doc.insert("battery".to_string(), json!(80));
//!
//! let codec = JsonCodec;
//! let bytes = codec.encode(&doc).unwrap();
//! assert_eq!(&bytes, br#"{"battery":80}"#);
//!
//! let decoded = codec.decode(&bytes).unwrap();
//! assert_eq!(decoded, doc);
//! ```

/// A structured key/value document, in insertion order.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Error type for codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a document to bytes.
    #[error("encode error: {0}")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Failed to decode bytes to a document.
    #[error("decode error: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The bytes decoded, but not to a key/value document.
    #[error("decoded value is not a key/value document")]
    NotADocument,
}

/// Pluggable structured document format.
pub trait DocumentCodec: Clone + 'static {
    /// Encode a document to bytes.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if serialization fails.
    fn encode(&self, doc: &Document) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes to a document.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Decode` for malformed input and
    /// `CodecError::NotADocument` when the top-level value is not a map.
    fn decode(&self, buf: &[u8]) -> Result<Document, CodecError>;
}

/// JSON codec using serde_json.
#[derive(Clone, Default, Debug, Copy)]
pub struct JsonCodec;

impl DocumentCodec for JsonCodec {
    fn encode(&self, doc: &Document) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(doc).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode(&self, buf: &[u8]) -> Result<Document, CodecError> {
        let value: serde_json::Value =
            serde_json::from_slice(buf).map_err(|e| CodecError::Decode(Box::new(e)))?;
        match value {
            serde_json::Value::Object(doc) => Ok(doc),
            _ => Err(CodecError::NotADocument),
        }
    }
}
