//! The codec seam between the endpoint and the wire.
//!
//! A codec owns the transport and translates between bytes and frames. The
//! endpoint splits it once into a read half (owned exclusively by the
//! reader loop) and a write half (serialized behind the endpoint's writer
//! lock), so reads and writes never contend on one lock.

use std::future::Future;

use crate::body::{Body, BodyFormat};
use crate::error::{CodecError, WireError};

mod binary;
mod jsonrpc;
mod jsonrpc2;

pub use binary::{BinaryCodec, BinaryReader, BinaryWriter};
pub use jsonrpc::{JsonRpcCodec, JsonRpcReader, JsonRpcWriter};
pub use jsonrpc2::{JsonRpc2Codec, JsonRpc2Reader, JsonRpc2Writer};

/// Seq value that marks a request as a notification.
pub const NOTIFY_SEQ: u64 = 0;

/// The header of the next inbound frame, before its body is consumed.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundHeader {
    Request {
        method: String,
        /// 0 for notifications.
        seq: u64,
    },
    Response {
        seq: u64,
        /// Present when the peer's handler failed; the body is then empty.
        error: Option<WireError>,
    },
}

/// The read half of a codec. Exactly one reader loop drives it.
///
/// After `read_header` returns a request or a successful response, the
/// matching body method must be called before the next `read_header`; the
/// body occupies the wire even when the caller intends to discard it.
pub trait CodecRead: Send + 'static {
    fn read_header(&mut self) -> impl Future<Output = Result<InboundHeader, CodecError>> + Send;

    /// Consume the current request frame's body. Absent params yield
    /// [`Body::Empty`]; whether that is acceptable is decided by the typed
    /// decode at dispatch time.
    fn read_request_body(&mut self) -> impl Future<Output = Result<Body, CodecError>> + Send;

    /// Consume the current response frame's body.
    fn read_response_body(&mut self) -> impl Future<Output = Result<Body, CodecError>> + Send;
}

/// The write half of a codec. The endpoint serializes access to it.
pub trait CodecWrite: Send + 'static {
    /// Emit a request frame. `seq == NOTIFY_SEQ` is written as a
    /// notification (no id on the JSON framings).
    fn write_request(
        &mut self,
        seq: u64,
        method: &str,
        body: &Body,
    ) -> impl Future<Output = Result<(), CodecError>> + Send;

    /// Emit a response frame. Exactly one of `error` / a non-empty `body`
    /// carries the outcome.
    fn write_response(
        &mut self,
        seq: u64,
        error: Option<&WireError>,
        body: &Body,
    ) -> impl Future<Output = Result<(), CodecError>> + Send;

    /// Flush and release the transport. Invoked exactly once, at shutdown.
    fn close(&mut self) -> impl Future<Output = Result<(), CodecError>> + Send;

    /// The body representation this codec speaks.
    fn body_format(&self) -> BodyFormat;

    /// True only for the JSON-RPC 2.0 framing; selects the structured
    /// error-object path.
    fn is_v2(&self) -> bool {
        false
    }
}

/// A frame codec over some transport, splittable into its two halves.
pub trait Codec: Send + 'static {
    type Reader: CodecRead;
    type Writer: CodecWrite;

    fn split(self) -> (Self::Reader, Self::Writer);
}
