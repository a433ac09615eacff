//! One bidirectional RPC peer bound to one connection.
//!
//! An [`Endpoint`] plays client and server at once: it issues outbound
//! calls, serves inbound requests, and lets a handler call back to the
//! peer whose request it is serving.
//!
//! # Architecture
//!
//! ```text
//!                ┌───────────────────────────────────┐
//!                │           Endpoint<C>             │
//!                ├───────────────────────────────────┤
//!                │  writer:   Mutex<C::Writer>       │
//!                │  pending:  seq -> oneshot::Sender │
//!                │  registry: method -> handler      │
//!                └───────────────┬───────────────────┘
//!                                │
//!                          serve() loop
//!                                │
//!            ┌───────────────────┴───────────────────┐
//!            │                                       │
//!     response? (pending)                    request? (dispatch)
//!            │                                       │
//!  ┌─────────▼─────────┐              ┌──────────────▼─────────────┐
//!  │ take(seq), hand   │              │ spawn a task, run handler, │
//!  │ body to caller    │              │ write exactly one response │
//!  └───────────────────┘              └────────────────────────────┘
//! ```
//!
//! Only `serve()` touches the codec's read half. Writes from callers and
//! dispatch tasks contend on one writer lock, held just long enough to
//! put a single frame on the wire.
//!
//! # Usage
//!
//! ```ignore
//! let (a, b) = BinaryCodec::pair();
//! let client = Arc::new(Endpoint::new(a));
//! let server = Arc::new(Endpoint::new(b));
//!
//! server.handle("add", |_ep, (a, b): (i64, i64)| async move { Ok(a + b) });
//! tokio::spawn(server.clone().serve());
//! tokio::spawn(client.clone().serve());
//!
//! let sum: i64 = client.call("add", &(1, 2)).await?;
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{oneshot, Mutex as AsyncMutex, Notify};

use crate::body::{Body, BodyFormat};
use crate::codec::{Codec, CodecRead, CodecWrite, InboundHeader, NOTIFY_SEQ};
use crate::error::{CodecError, RpcError, WireError};
use crate::pending::{CallOutcome, PendingTable};
use crate::registry::{FallbackHandler, Handler, Registry};

pub struct Endpoint<C: Codec> {
    writer: AsyncMutex<C::Writer>,
    reader: parking_lot::Mutex<Option<C::Reader>>,
    registry: Registry<C>,
    pending: PendingTable,
    format: BodyFormat,
    /// Set once `close` begins or the reader exits; new calls fail fast.
    closed: AtomicBool,
    /// Guards the teardown sequence so it runs exactly once.
    shutdown_done: AtomicBool,
    serving: AtomicBool,
    /// Dispatch inbound requests on the reader instead of fresh tasks.
    blocking: AtomicBool,
    close_notify: Notify,
}

impl<C: Codec> Endpoint<C> {
    /// Wrap an open codec. The endpoint is inert until [`serve`] runs.
    ///
    /// [`serve`]: Endpoint::serve
    pub fn new(codec: C) -> Self {
        let (reader, writer) = codec.split();
        let format = writer.body_format();
        Self {
            writer: AsyncMutex::new(writer),
            reader: parking_lot::Mutex::new(Some(reader)),
            registry: Registry::new(),
            pending: PendingTable::new(),
            format,
            closed: AtomicBool::new(false),
            shutdown_done: AtomicBool::new(false),
            serving: AtomicBool::new(false),
            blocking: AtomicBool::new(false),
            close_notify: Notify::new(),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a typed handler under `method`, replacing any previous one.
    ///
    /// The handler receives a capability handle to this endpoint, so it can
    /// call back to the peer while serving the request. Argument and reply
    /// types are erased here: the stored closure decodes the inbound body
    /// into `A` and encodes the `R` it gets back.
    pub fn handle<A, R, F, Fut>(&self, method: impl Into<String>, f: F)
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Arc<Endpoint<C>>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, WireError>> + Send + 'static,
    {
        let format = self.format;
        let handler: Handler<C> = Arc::new(move |ep, body| {
            let args: A = match body.decode() {
                Ok(args) => args,
                Err(e) => {
                    return Box::pin(std::future::ready(Err(WireError::invalid_params(e))));
                }
            };
            let fut = f(ep, args);
            Box::pin(async move {
                let reply = fut.await?;
                Body::encode(format, &reply).map_err(WireError::internal)
            })
        });
        self.registry.register(method.into(), handler);
    }

    /// Register an already-erased handler. Most callers want [`handle`];
    /// this is the escape hatch for dispatchers built at runtime.
    ///
    /// [`handle`]: Endpoint::handle
    pub fn register_handler(&self, method: impl Into<String>, handler: Handler<C>) {
        self.registry.register(method.into(), handler);
    }

    /// Register the fallback invoked for methods with no handler. The
    /// fallback works on raw bodies since it cannot know an argument type.
    pub fn handle_unknown<F, Fut>(&self, f: F)
    where
        F: Fn(Arc<Endpoint<C>>, String, Body) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Body, WireError>> + Send + 'static,
    {
        let fallback: FallbackHandler<C> =
            Arc::new(move |ep, method, body| Box::pin(f(ep, method, body)));
        self.registry.set_fallback(fallback);
    }

    /// Set the callback invoked exactly once when the reader loop exits.
    pub fn on_disconnect(&self, f: impl FnOnce() + Send + 'static) {
        self.registry.set_disconnect(Box::new(f));
    }

    /// Deprecated escape hatch: when `true`, inbound requests run on the
    /// reader itself, serially. A blocking-mode handler that calls back to
    /// the peer will deadlock; prefer the default.
    pub fn set_blocking(&self, blocking: bool) {
        self.blocking.store(blocking, Ordering::Relaxed);
    }

    // ========================================================================
    // Outbound calls
    // ========================================================================

    /// Issue a call and wait for the peer's reply.
    pub async fn call<A, R>(&self, method: &str, args: &A) -> Result<R, RpcError>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.go(method, args).await?.wait().await
    }

    /// Issue a call without waiting: the returned [`PendingCall`] resolves
    /// when the reply arrives or the endpoint shuts down. Returns once the
    /// request frame is on the wire.
    pub async fn go<A>(&self, method: &str, args: &A) -> Result<PendingCall, RpcError>
    where
        A: Serialize + ?Sized,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(RpcError::Shutdown);
        }
        let body = Body::encode(self.format, args)?;
        let (tx, rx) = oneshot::channel();
        // The entry must exist before the frame is written; a fast peer can
        // reply before this task is scheduled again.
        let seq = self.pending.allocate(tx)?;
        let written = {
            let mut writer = self.writer.lock().await;
            // Re-check under the writer lock: a concurrent shutdown may
            // have drained the table between the entry check and here,
            // which would strand this entry forever.
            if self.closed.load(Ordering::Acquire) {
                self.pending.take(seq);
                return Err(RpcError::Shutdown);
            }
            writer.write_request(seq, method, &body).await
        };
        if let Err(e) = written {
            self.pending.take(seq);
            return Err(RpcError::Codec(e));
        }
        Ok(PendingCall { seq, rx })
    }

    /// Fire-and-forget: write a request with seq 0. The peer sends no
    /// response, success means the frame reached the wire.
    pub async fn notify<A>(&self, method: &str, args: &A) -> Result<(), RpcError>
    where
        A: Serialize + ?Sized,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(RpcError::Shutdown);
        }
        let body = Body::encode(self.format, args)?;
        let mut writer = self.writer.lock().await;
        // Re-check under the writer lock: a concurrent shutdown may have
        // closed the codec while this task was queued behind it.
        if self.closed.load(Ordering::Acquire) {
            return Err(RpcError::Shutdown);
        }
        writer
            .write_request(NOTIFY_SEQ, method, &body)
            .await
            .map_err(RpcError::Codec)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Run the reader loop until the connection ends.
    ///
    /// Exactly one task may serve an endpoint. Returns `Ok(())` on clean
    /// peer shutdown or local [`close`]; fatal codec errors are returned
    /// after the teardown sequence has run.
    ///
    /// [`close`]: Endpoint::close
    pub async fn serve(self: Arc<Self>) -> Result<(), RpcError> {
        let mut reader = self
            .reader
            .lock()
            .take()
            .ok_or(RpcError::AlreadyServing)?;
        self.serving.store(true, Ordering::Release);
        let result = Self::read_loop(&self, &mut reader).await;
        if let Err(e) = &result {
            tracing::debug!(error = %e, "reader exiting");
        }
        self.shutdown().await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if !e.is_fatal() => Ok(()),
            Err(e) => Err(RpcError::Codec(e)),
        }
    }

    /// Initiate shutdown: wake the reader, fail new calls, complete every
    /// pending call with *connection shut down*. Idempotent.
    pub async fn close(&self) -> Result<(), RpcError> {
        self.closed.store(true, Ordering::Release);
        self.close_notify.notify_one();
        if !self.serving.load(Ordering::Acquire) {
            // No reader to unwind; run the teardown here.
            self.shutdown().await;
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The body representation this endpoint's codec speaks. Fallback
    /// handlers need it to encode raw reply bodies.
    pub fn body_format(&self) -> BodyFormat {
        self.format
    }

    /// Seqs of calls still waiting for replies. Diagnostics only.
    pub fn pending_seqs(&self) -> Vec<u64> {
        self.pending.seqs()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // ========================================================================
    // Reader + dispatch
    // ========================================================================

    async fn read_loop(this: &Arc<Self>, reader: &mut C::Reader) -> Result<(), CodecError> {
        loop {
            if this.closed.load(Ordering::Acquire) {
                return Ok(());
            }
            let header = tokio::select! {
                header = reader.read_header() => header?,
                _ = this.close_notify.notified() => return Ok(()),
            };
            match header {
                InboundHeader::Response { seq, error } => match this.pending.take(seq) {
                    None => {
                        // Unknown or duplicate seq: consume the body so the
                        // stream stays in sync, then drop the frame.
                        reader.read_response_body().await?;
                        tracing::debug!(seq, "response with no pending call; dropping");
                    }
                    Some(slot) => {
                        let outcome: CallOutcome = match error {
                            Some(err) => {
                                reader.read_response_body().await?;
                                Err(err)
                            }
                            None => Ok(reader.read_response_body().await?),
                        };
                        let _ = slot.send(outcome);
                    }
                },
                InboundHeader::Request { method, seq } => {
                    let body = reader.read_request_body().await?;
                    if this.blocking.load(Ordering::Relaxed) {
                        this.clone().dispatch(method, seq, body).await;
                    } else {
                        let ep = this.clone();
                        tokio::spawn(ep.dispatch(method, seq, body));
                    }
                }
            }
        }
    }

    /// Run one inbound request to completion and, unless it was a
    /// notification, write exactly one response.
    async fn dispatch(self: Arc<Self>, method: String, seq: u64, body: Body) {
        let outcome = match self.registry.lookup(&method) {
            Some(handler) => self.invoke(&handler, body).await,
            None => match self.registry.fallback() {
                Some(fallback) => self.invoke_fallback(&fallback, method.clone(), body).await,
                None => Err(WireError::method_not_found(&method)),
            },
        };

        if seq == NOTIFY_SEQ {
            if let Err(e) = &outcome {
                tracing::debug!(method = %method, error = %e, "notification handler failed");
            }
            return;
        }

        let (error, reply) = match outcome {
            Ok(body) => (None, body),
            Err(e) => (Some(e), Body::Empty),
        };
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.write_response(seq, error.as_ref(), &reply).await {
            // Per-request failure; the endpoint keeps serving.
            tracing::warn!(seq, method = %method, error = %e, "failed to write response");
        }
    }

    async fn invoke(self: &Arc<Self>, handler: &Handler<C>, body: Body) -> Result<Body, WireError> {
        // The handler can panic both while producing its future and while
        // being polled; contain both.
        let fut = std::panic::catch_unwind(AssertUnwindSafe(|| handler(self.clone(), body)))
            .map_err(|p| WireError::handler_aborted(panic_message(&p)))?;
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(p) => Err(WireError::handler_aborted(panic_message(&p))),
        }
    }

    async fn invoke_fallback(
        self: &Arc<Self>,
        fallback: &FallbackHandler<C>,
        method: String,
        body: Body,
    ) -> Result<Body, WireError> {
        let fut =
            std::panic::catch_unwind(AssertUnwindSafe(|| fallback(self.clone(), method, body)))
                .map_err(|p| WireError::handler_aborted(panic_message(&p)))?;
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(p) => Err(WireError::handler_aborted(panic_message(&p))),
        }
    }

    /// The teardown sequence of the endpoint lifecycle. Runs exactly once:
    /// disable writes, drain pending calls, close the codec, fire the
    /// disconnect callback.
    async fn shutdown(&self) {
        if self.shutdown_done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.closed.store(true, Ordering::Release);
        let drained = self.pending.drain();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "completing pending calls with shutdown");
        }
        drop(drained);
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.close().await {
                tracing::debug!(error = %e, "codec close failed");
            }
        }
        if let Some(callback) = self.registry.take_disconnect() {
            callback();
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in handler".to_string()
    }
}

/// An in-flight outbound call. Resolves via [`wait`](PendingCall::wait).
pub struct PendingCall {
    seq: u64,
    rx: oneshot::Receiver<CallOutcome>,
}

impl PendingCall {
    /// The seq this call went out under.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Wait for the reply and decode it into `R`.
    pub async fn wait<R: DeserializeOwned>(self) -> Result<R, RpcError> {
        match self.rx.await {
            Ok(Ok(body)) => body.decode().map_err(RpcError::Body),
            Ok(Err(remote)) => Err(RpcError::Remote(remote)),
            // The sender was dropped by the shutdown drain.
            Err(_) => Err(RpcError::Shutdown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BinaryCodec, JsonRpc2Codec, JsonRpcCodec};
    use crate::error::error_code;
    use serde::Deserialize;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[derive(Debug, Serialize, Deserialize)]
    struct Args {
        a: i64,
        b: i64,
    }

    type BinEndpoint = Arc<Endpoint<BinaryCodec<tokio::io::DuplexStream>>>;

    fn endpoints() -> (BinEndpoint, BinEndpoint) {
        let (a, b) = BinaryCodec::pair();
        let client = Arc::new(Endpoint::new(a));
        let server = Arc::new(Endpoint::new(b));
        tokio::spawn(client.clone().serve());
        tokio::spawn(server.clone().serve());
        (client, server)
    }

    #[tokio::test]
    async fn call_roundtrip() {
        let (client, server) = endpoints();
        server.handle("add", |_ep, args: Args| async move { Ok(args.a + args.b) });

        let sum: i64 = client.call("add", &Args { a: 1, b: 2 }).await.unwrap();
        assert_eq!(sum, 3);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn handler_calls_back_to_the_requesting_peer() {
        let (client, server) = endpoints();

        client.handle("mult", |_ep, args: Args| async move { Ok(args.a * args.b) });
        server.handle("add", |ep, args: Args| async move {
            let product: i64 = ep
                .call("mult", &Args { a: 2, b: 3 })
                .await
                .map_err(WireError::internal)?;
            assert_eq!(product, 6);
            Ok(args.a + args.b)
        });

        let sum: i64 = client.call("add", &Args { a: 1, b: 2 }).await.unwrap();
        assert_eq!(sum, 3);
        assert_eq!(client.pending_count(), 0);
        assert_eq!(server.pending_count(), 0);
    }

    #[tokio::test]
    async fn unknown_method_is_a_per_request_error() {
        let (client, server) = endpoints();
        server.handle("real", |_ep, ():()| async move { Ok(1i64) });

        // The binary framing carries only the message; the reserved code
        // survives solely on the JSON-RPC 2.0 wire.
        match client.call::<_, i64>("nope", &()).await {
            Err(RpcError::Remote(e)) => {
                assert!(e.message.contains("method not found: nope"));
            }
            other => panic!("expected method-not-found, got {other:?}"),
        }
        // The endpoint keeps serving registered methods.
        let one: i64 = client.call("real", &()).await.unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn fallback_sees_unregistered_methods() {
        let (client, server) = endpoints();
        server.handle_unknown(|ep, method, _body| async move {
            Body::encode(ep.body_format(), &format!("fell back on {method}"))
                .map_err(WireError::internal)
        });

        let reply: String = client.call("missing", &()).await.unwrap();
        assert_eq!(reply, "fell back on missing");
    }

    #[tokio::test]
    async fn handler_panic_becomes_an_error_response() {
        let (client, server) = endpoints();
        server.handle("boom", |_ep, ():()| async move {
            panic!("kaboom");
            #[allow(unreachable_code)]
            Ok(0i64)
        });
        server.handle("fine", |_ep, ():()| async move { Ok(7i64) });

        match client.call::<_, i64>("boom", &()).await {
            Err(RpcError::Remote(e)) => {
                assert!(e.message.contains("handler aborted"));
                assert!(e.message.contains("kaboom"));
            }
            other => panic!("expected handler-aborted, got {other:?}"),
        }
        // The endpoint survives the panic.
        let seven: i64 = client.call("fine", &()).await.unwrap();
        assert_eq!(seven, 7);
    }

    #[tokio::test]
    async fn reserved_codes_survive_the_v2_wire() {
        let (a, b) = JsonRpc2Codec::pair();
        let client = Arc::new(Endpoint::new(a));
        let server = Arc::new(Endpoint::new(b));
        tokio::spawn(client.clone().serve());
        tokio::spawn(server.clone().serve());

        match client.call::<_, i64>("nope", &()).await {
            Err(RpcError::Remote(e)) => assert_eq!(e.code, error_code::METHOD_NOT_FOUND),
            other => panic!("expected method-not-found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn late_registration_takes_effect() {
        let (client, server) = endpoints();

        match client.call::<_, i64>("late", &()).await {
            Err(RpcError::Remote(_)) => {}
            other => panic!("expected error before registration, got {other:?}"),
        }
        server.handle("late", |_ep, ():()| async move { Ok(9i64) });
        let nine: i64 = client.call("late", &()).await.unwrap();
        assert_eq!(nine, 9);
    }

    #[tokio::test]
    async fn blocking_mode_dispatches_on_the_reader() {
        let (client, server) = endpoints();
        server.set_blocking(true);
        server.handle("add", |_ep, args: Args| async move { Ok(args.a + args.b) });

        let sum: i64 = client.call("add", &Args { a: 4, b: 5 }).await.unwrap();
        assert_eq!(sum, 9);
    }

    #[tokio::test]
    async fn close_drains_pending_and_fires_disconnect_once() {
        let (client, server) = endpoints();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        client.on_disconnect(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        server.handle("stall", |_ep, ():()| async move {
            std::future::pending::<()>().await;
            Ok(0i64)
        });

        let mut waiting = Vec::new();
        for _ in 0..10 {
            waiting.push(client.go("stall", &()).await.unwrap());
        }
        assert_eq!(client.pending_count(), 10);

        server.close().await.unwrap();

        for call in waiting {
            match tokio::time::timeout(Duration::from_secs(5), call.wait::<i64>()).await {
                Ok(Err(RpcError::Shutdown)) => {}
                other => panic!("expected Shutdown, got {other:?}"),
            }
        }
        assert_eq!(client.pending_count(), 0);

        // New calls fail immediately.
        match client.call::<_, i64>("stall", &()).await {
            Err(RpcError::Shutdown) | Err(RpcError::Codec(_)) => {}
            other => panic!("expected failure after close, got {other:?}"),
        }

        // Idempotent close, callback exactly once.
        client.close().await.unwrap();
        client.close().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_replies_are_dropped() {
        let (near, far) = tokio::io::duplex(64 * 1024);
        let client = Arc::new(Endpoint::new(JsonRpcCodec::new(near)));
        tokio::spawn(client.clone().serve());
        let (far_read, mut far_write) = tokio::io::split(far);
        let mut far_lines = BufReader::new(far_read);

        let call_client = client.clone();
        let call = tokio::spawn(async move {
            call_client.call::<_, i64>("echo", &(1i64,)).await
        });

        let mut line = String::new();
        far_lines.read_line(&mut line).await.unwrap();
        let request: serde_json::Value = serde_json::from_str(&line).unwrap();
        let id = request["id"].as_u64().unwrap();

        // Reply twice with the same id.
        let reply = format!("{{\"id\":{id},\"result\":42,\"error\":null}}\n");
        far_write.write_all(reply.as_bytes()).await.unwrap();
        far_write.write_all(reply.as_bytes()).await.unwrap();

        assert_eq!(call.await.unwrap().unwrap(), 42);

        // The duplicate had no effect; the endpoint still works.
        let second = tokio::spawn({
            let client = client.clone();
            async move { client.call::<_, i64>("echo", &(2i64,)).await }
        });
        line.clear();
        far_lines.read_line(&mut line).await.unwrap();
        let request: serde_json::Value = serde_json::from_str(&line).unwrap();
        let id = request["id"].as_u64().unwrap();
        let reply = format!("{{\"id\":{id},\"result\":43,\"error\":null}}\n");
        far_write.write_all(reply.as_bytes()).await.unwrap();
        assert_eq!(second.await.unwrap().unwrap(), 43);
    }

    #[tokio::test]
    async fn notification_produces_no_response_frame() {
        let (near, far) = tokio::io::duplex(64 * 1024);
        let server = Arc::new(Endpoint::new(JsonRpcCodec::new(near)));
        server.handle("log", |_ep, _line: String| async move {
            Err::<(), _>(WireError::internal("refused"))
        });
        server.handle("marker", |_ep, ():()| async move { Ok("ok".to_string()) });
        tokio::spawn(server.clone().serve());

        let (far_read, mut far_write) = tokio::io::split(far);
        let mut far_lines = BufReader::new(far_read);

        // Notification whose handler errors, then a marker call.
        far_write
            .write_all(b"{\"method\":\"log\",\"params\":[\"hello\"],\"id\":null}\n")
            .await
            .unwrap();
        far_write
            .write_all(b"{\"method\":\"marker\",\"params\":[],\"id\":1}\n")
            .await
            .unwrap();

        // The first (and only) frame back answers the marker, proving the
        // notification produced nothing.
        let mut line = String::new();
        far_lines.read_line(&mut line).await.unwrap();
        let reply: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(reply["id"], serde_json::json!(1));
        assert_eq!(reply["result"], serde_json::json!("ok"));
    }
}
