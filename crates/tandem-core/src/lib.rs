//! tandem-core: endpoint, codecs, and wire types for the tandem RPC system.
//!
//! This crate defines:
//! - The bidirectional endpoint ([`Endpoint`], [`PendingCall`])
//! - The codec seam ([`Codec`], [`CodecRead`], [`CodecWrite`], [`InboundHeader`])
//! - Three codecs ([`BinaryCodec`], [`JsonRpcCodec`], [`JsonRpc2Codec`])
//! - Frame payloads ([`Body`], [`BodyFormat`])
//! - Error types ([`RpcError`], [`CodecError`], [`BodyError`], [`WireError`])

#![forbid(unsafe_code)]

mod body;
mod codec;
mod endpoint;
mod error;
mod pending;
mod registry;

pub use body::{Body, BodyFormat};
pub use codec::{
    BinaryCodec, BinaryReader, BinaryWriter, Codec, CodecRead, CodecWrite, InboundHeader,
    JsonRpc2Codec, JsonRpc2Reader, JsonRpc2Writer, JsonRpcCodec, JsonRpcReader, JsonRpcWriter,
    NOTIFY_SEQ,
};
pub use endpoint::{Endpoint, PendingCall};
pub use error::{error_code, BodyError, CodecError, RpcError, WireError};
pub use pending::CallOutcome;
pub use registry::{FallbackHandler, Handler, HandlerFuture};
