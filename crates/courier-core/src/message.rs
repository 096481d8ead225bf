//! Outbound message variants and their wire encodings.
//!
//! Text payloads go out as raw UTF-8 bytes with no framing. Structured
//! messages are protobuf-encoded [`RequestProtocol`] values prefixed with a
//! varint32 length, which is what a protobuf length-field frame decoder on
//! the client side expects.

use bytes::Bytes;
use prost::Message as _;
use serde::Serialize;

use crate::errors::Result;

/// Maximum characters of payload shown in a message summary.
const SUMMARY_MAX_CHARS: usize = 64;

/// Fixed schema of a structured message.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestProtocol {
    /// Message body.
    #[prost(string, tag = "1")]
    pub req_msg: String,
    /// Request identifier.
    #[prost(int32, tag = "2")]
    pub request_id: i32,
}

/// Which variant a message is, for logs and metric labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Raw text payload.
    Text,
    /// Protobuf-encoded [`RequestProtocol`].
    Structured,
}

impl MessageKind {
    /// Lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Structured => "structured",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message to be written to a client connection.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundMessage {
    /// Already-serialized text, written as UTF-8 bytes.
    Text {
        /// The payload.
        payload: String,
    },
    /// Structured message encoded with the fixed binary schema.
    Structured(RequestProtocol),
}

impl OutboundMessage {
    /// Build a text message.
    pub fn text(payload: impl Into<String>) -> Self {
        Self::Text {
            payload: payload.into(),
        }
    }

    /// Build a text message holding the JSON serialization of `value`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::text(serde_json::to_string(value)?))
    }

    /// Build a structured message.
    ///
    /// The schema's request ID is 32 bits wide, so `request_id` is truncated
    /// to its low 32 bits.
    #[allow(clippy::cast_possible_truncation)]
    pub fn structured(request_id: i64, body: impl Into<String>) -> Self {
        Self::Structured(RequestProtocol {
            req_msg: body.into(),
            request_id: request_id as i32,
        })
    }

    /// The message variant.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::Structured(_) => MessageKind::Structured,
        }
    }

    /// Encode into the exact bytes written to the socket.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        match self {
            Self::Text { payload } => Bytes::copy_from_slice(payload.as_bytes()),
            Self::Structured(proto) => Bytes::from(proto.encode_length_delimited_to_vec()),
        }
    }

    /// Short human-readable description for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Text { payload } => truncate(payload),
            Self::Structured(proto) => format!(
                "request_id={} body={}",
                proto.request_id,
                truncate(&proto.req_msg)
            ),
        }
    }
}

fn truncate(s: &str) -> String {
    match s.char_indices().nth(SUMMARY_MAX_CHARS) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_owned(),
    }
}
