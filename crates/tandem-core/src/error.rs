//! Error types for the endpoint and its codecs.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Reserved error codes used when the runtime itself fails a request.
///
/// These follow the JSON-RPC 2.0 reserved range so that the 2.0 codec can
/// put them on the wire unchanged. The binary and JSON-RPC 1.0 codecs only
/// carry the message.
pub mod error_code {
    /// The request body could not be parsed.
    pub const PARSE_ERROR: i64 = -32700;
    /// The frame was not a valid request.
    pub const INVALID_REQUEST: i64 = -32600;
    /// No handler is registered under the requested method name.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// The request body did not decode into the handler's argument type.
    pub const INVALID_PARAMS: i64 = -32602;
    /// The handler failed internally.
    pub const INTERNAL_ERROR: i64 = -32603;
    /// The handler panicked before producing a reply.
    pub const HANDLER_ABORTED: i64 = -32000;
}

/// A failure outcome carried in a response frame.
///
/// This is the one semantic notion behind all three codecs' error shapes:
/// the structured object of JSON-RPC 2.0, and the bare string of the binary
/// and JSON-RPC 1.0 framings (which preserve `message` only; errors decoded
/// from those wires carry `code` 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl WireError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// An error reconstructed from a codec that only carries a message.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_code::METHOD_NOT_FOUND,
            format!("method not found: {method}"),
        )
    }

    pub fn invalid_params(detail: impl fmt::Display) -> Self {
        Self::new(
            error_code::INVALID_PARAMS,
            format!("invalid params: {detail}"),
        )
    }

    pub fn internal(detail: impl fmt::Display) -> Self {
        Self::new(error_code::INTERNAL_ERROR, detail.to_string())
    }

    pub fn handler_aborted(detail: impl fmt::Display) -> Self {
        Self::new(
            error_code::HANDLER_ABORTED,
            format!("handler aborted: {detail}"),
        )
    }

    /// The string form written by the message-only codecs. Never empty, so
    /// that an empty header field keeps meaning "success" on the wire.
    pub fn wire_message(&self) -> &str {
        if self.message.is_empty() {
            "unspecified error"
        } else {
            &self.message
        }
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code == 0 {
            write!(f, "{}", self.wire_message())
        } else {
            write!(f, "{} (code {})", self.wire_message(), self.code)
        }
    }
}

impl std::error::Error for WireError {}

/// Framing-level errors produced by a codec.
///
/// `Closed`, `Io`, and `Malformed` are fatal for the endpoint: the reader
/// cannot resynchronize, so they end the read loop and trigger shutdown.
/// `Encode` and `InvalidSeq` are per-request.
#[derive(Debug)]
pub enum CodecError {
    /// The transport reached EOF at a frame boundary.
    Closed,
    Io(std::io::Error),
    /// The byte stream does not parse as a frame (or EOF hit mid-frame).
    Malformed(String),
    /// A value could not be serialized into the wire format.
    Encode(String),
    /// A response was written for a seq with no recorded inbound request.
    InvalidSeq(u64),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "transport closed"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Malformed(detail) => write!(f, "malformed frame: {detail}"),
            Self::Encode(detail) => write!(f, "encode error: {detail}"),
            Self::InvalidSeq(seq) => write!(f, "invalid seq {seq} in response"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Closed
        } else {
            Self::Io(e)
        }
    }
}

impl CodecError {
    /// Whether this error ends the endpoint (as opposed to one request).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed | Self::Io(_) | Self::Malformed(_))
    }
}

/// Body encode/decode errors. Per-request.
#[derive(Debug)]
pub enum BodyError {
    Encode(String),
    Decode(String),
    /// The request carried no body but the handler's argument type needs one.
    MissingParams,
}

impl fmt::Display for BodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(detail) => write!(f, "body encode error: {detail}"),
            Self::Decode(detail) => write!(f, "body decode error: {detail}"),
            Self::MissingParams => write!(f, "request body missing params"),
        }
    }
}

impl std::error::Error for BodyError {}

/// The caller-facing error sum returned by `call`, `notify`, and `go`.
#[derive(Debug)]
pub enum RpcError {
    /// The codec failed while writing or the connection died mid-call.
    Codec(CodecError),
    /// The argument or reply failed to encode/decode.
    Body(BodyError),
    /// The peer's handler returned a failure instead of a reply.
    Remote(WireError),
    /// The endpoint shut down before (or while) the call completed.
    Shutdown,
    /// The pending table is at capacity; the call was refused.
    TooManyPending(usize),
    /// `serve` was invoked a second time on the same endpoint.
    AlreadyServing,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Codec(e) => write!(f, "codec error: {e}"),
            Self::Body(e) => write!(f, "{e}"),
            Self::Remote(e) => write!(f, "remote error: {e}"),
            Self::Shutdown => write!(f, "connection shut down"),
            Self::TooManyPending(max) => write!(f, "too many pending calls (max {max})"),
            Self::AlreadyServing => write!(f, "endpoint is already serving"),
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Codec(e) => Some(e),
            Self::Body(e) => Some(e),
            Self::Remote(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CodecError> for RpcError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

impl From<BodyError> for RpcError {
    fn from(e: BodyError) -> Self {
        Self::Body(e)
    }
}

impl From<WireError> for RpcError {
    fn from(e: WireError) -> Self {
        Self::Remote(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_error_roundtrips_through_json() {
        let err = WireError::method_not_found("frobnicate");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], error_code::METHOD_NOT_FOUND);
        assert!(json.get("data").is_none());
        let back: WireError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn blank_messages_are_coerced_on_the_wire() {
        let err = WireError::new(0, "");
        assert_eq!(err.wire_message(), "unspecified error");
    }

    #[test]
    fn eof_maps_to_closed() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(CodecError::from(eof), CodecError::Closed));
    }
}
