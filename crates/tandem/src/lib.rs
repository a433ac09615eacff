//! tandem: bidirectional RPC over a single full-duplex byte stream.
//!
//! Unlike a classical client/server RPC, either peer of a tandem
//! connection may invoke methods registered on the other, and a handler
//! may call back to the very peer whose request it is serving.
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//! use tandem::{BinaryCodec, Endpoint};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tandem::RpcError> {
//! let (a, b) = BinaryCodec::pair();
//! let client = Arc::new(Endpoint::new(a));
//! let server = Arc::new(Endpoint::new(b));
//!
//! // Both sides register methods; both sides serve.
//! server.handle("add", |_ep, (a, b): (i64, i64)| async move { Ok(a + b) });
//! tokio::spawn(server.clone().serve());
//! tokio::spawn(client.clone().serve());
//!
//! let sum: i64 = client.call("add", &(1, 2)).await?;
//! assert_eq!(sum, 3);
//! # Ok(())
//! # }
//! ```
//!
//! # Calling back
//!
//! Handlers receive a handle to their own endpoint and can issue calls
//! through it while the original request is still in flight:
//!
//! ```ignore
//! server.handle("add", |ep, (a, b): (i64, i64)| async move {
//!     let product: i64 = ep.call("mult", &(2, 3)).await.map_err(WireError::internal)?;
//!     Ok(a + b + product)
//! });
//! ```
//!
//! # Codecs
//!
//! Three framings drive the same endpoint state machine:
//!
//! - [`BinaryCodec`]: self-describing CBOR frames, for peer-symmetric use.
//! - [`JsonRpcCodec`]: line-delimited JSON-RPC 1.0.
//! - [`JsonRpc2Codec`]: line-delimited JSON-RPC 2.0, with structured error
//!   objects and named params.
//!
//! Each codec wraps anything `AsyncRead + AsyncWrite`; connecting a
//! listener to an endpoint is the caller's business:
//!
//! ```ignore
//! let listener = TcpListener::bind("127.0.0.1:9000").await?;
//! loop {
//!     let (socket, _) = listener.accept().await?;
//!     let ep = Arc::new(Endpoint::new(JsonRpc2Codec::new(socket)));
//!     ep.handle("add", |_ep, (a, b): (i64, i64)| async move { Ok(a + b) });
//!     tokio::spawn(ep.serve());
//! }
//! ```
//!
//! # Notifications
//!
//! [`Endpoint::notify`] writes a request with no id; the peer dispatches it
//! and never responds, whatever the handler's outcome.
//!
//! # Errors
//!
//! Handlers fail with [`WireError`]; callers see [`RpcError`]:
//!
//! ```ignore
//! match client.call::<_, i64>("add", &(1, 2)).await {
//!     Ok(sum) => println!("sum: {sum}"),
//!     Err(RpcError::Remote(e)) => eprintln!("peer failed: {e}"),
//!     Err(RpcError::Shutdown) => eprintln!("connection shut down"),
//!     Err(e) => eprintln!("call failed: {e}"),
//! }
//! ```

#![forbid(unsafe_code)]

pub use tandem_core::{
    error_code, BinaryCodec, Body, BodyError, BodyFormat, Codec, CodecError, CodecRead,
    CodecWrite, Endpoint, FallbackHandler, Handler, HandlerFuture, InboundHeader, JsonRpc2Codec,
    JsonRpcCodec, PendingCall, RpcError, WireError, NOTIFY_SEQ,
};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tandem::prelude::*;
/// ```
pub mod prelude {
    pub use tandem_core::{
        BinaryCodec, Endpoint, JsonRpc2Codec, JsonRpcCodec, RpcError, WireError,
    };
}
