//! tandem-testkit: conformance scenarios shared by all tandem codecs.
//!
//! Every codec must drive the endpoint state machine identically. Each
//! codec provides a [`CodecFactory`] and runs the shared scenarios:
//!
//! ```ignore
//! use tandem_testkit::CodecFactory;
//!
//! struct MyCodecFactory;
//!
//! impl CodecFactory for MyCodecFactory {
//!     type Codec = MyCodec;
//!
//!     async fn connect_pair() -> Result<(Self::Codec, Self::Codec), TestError> {
//!         /* create a connected pair */
//!     }
//! }
//!
//! #[tokio::test]
//! async fn my_codec_call_roundtrip() {
//!     tandem_testkit::run_call_roundtrip::<MyCodecFactory>().await;
//! }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tandem_core::{Codec, Endpoint, RpcError, WireError};

pub mod bidirectional;

/// Error type for test scenarios.
#[derive(Debug)]
pub enum TestError {
    /// Codec pair creation failed.
    Setup(String),
    /// RPC call failed.
    Rpc(RpcError),
    /// Assertion failed.
    Assertion(String),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Setup(msg) => write!(f, "setup error: {msg}"),
            TestError::Rpc(e) => write!(f, "RPC error: {e}"),
            TestError::Assertion(msg) => write!(f, "assertion failed: {msg}"),
        }
    }
}

impl std::error::Error for TestError {}

impl From<RpcError> for TestError {
    fn from(e: RpcError) -> Self {
        TestError::Rpc(e)
    }
}

/// Factory trait for creating connected codec pairs for testing.
pub trait CodecFactory: Send + Sync + 'static {
    /// The codec type being tested.
    type Codec: Codec;

    /// Create a connected pair of codecs. Frames written by one side are
    /// read by the other and vice versa.
    fn connect_pair()
    -> impl Future<Output = Result<(Self::Codec, Self::Codec), TestError>> + Send;
}

/// Argument record used by the arithmetic test methods.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Args {
    pub a: i64,
    pub b: i64,
}

type Ep<F> = Arc<Endpoint<<F as CodecFactory>::Codec>>;

/// Install a fmt subscriber once so scenario failures come with logs.
/// `RUST_LOG=tandem_core=debug` shows the reader's routing decisions.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Two served endpoints joined by a fresh codec pair.
pub async fn served_pair<F: CodecFactory>() -> Result<(Ep<F>, Ep<F>), TestError> {
    init_tracing();
    let (a, b) = F::connect_pair().await?;
    let client = Arc::new(Endpoint::new(a));
    let server = Arc::new(Endpoint::new(b));
    tokio::spawn(client.clone().serve());
    tokio::spawn(server.clone().serve());
    Ok((client, server))
}

// ============================================================================
// Scenario: unary happy path
// ============================================================================

/// Client calls `add(2, 3)` and expects `5`.
pub async fn run_call_roundtrip<F: CodecFactory>() {
    if let Err(e) = run_call_roundtrip_inner::<F>().await {
        panic!("run_call_roundtrip failed: {e}");
    }
}

async fn run_call_roundtrip_inner<F: CodecFactory>() -> Result<(), TestError> {
    let (client, server) = served_pair::<F>().await?;
    server.handle("add", |_ep, args: Args| async move { Ok(args.a + args.b) });

    let sum: i64 = client.call("add", &Args { a: 2, b: 3 }).await?;
    if sum != 5 {
        return Err(TestError::Assertion(format!(
            "expected add(2, 3) = 5, got {sum}"
        )));
    }
    if client.pending_count() != 0 {
        return Err(TestError::Assertion(format!(
            "pending table not empty after call: {:?}",
            client.pending_seqs()
        )));
    }
    Ok(())
}

// ============================================================================
// Scenario: unknown method
// ============================================================================

/// Calling an unregistered method fails per-request; the endpoint then
/// serves a registered method normally.
pub async fn run_unknown_method<F: CodecFactory>() {
    if let Err(e) = run_unknown_method_inner::<F>().await {
        panic!("run_unknown_method failed: {e}");
    }
}

async fn run_unknown_method_inner<F: CodecFactory>() -> Result<(), TestError> {
    let (client, server) = served_pair::<F>().await?;
    server.handle("add", |_ep, args: Args| async move { Ok(args.a + args.b) });

    match client.call::<_, i64>("nope", &Args { a: 1, b: 1 }).await {
        Err(RpcError::Remote(e)) => {
            if !e.message.contains("method not found") {
                return Err(TestError::Assertion(format!(
                    "expected a method-not-found message, got '{}'",
                    e.message
                )));
            }
        }
        other => {
            return Err(TestError::Assertion(format!(
                "expected Remote error, got {other:?}"
            )));
        }
    }

    let sum: i64 = client.call("add", &Args { a: 1, b: 1 }).await?;
    if sum != 2 {
        return Err(TestError::Assertion(format!("expected 2, got {sum}")));
    }
    Ok(())
}

// ============================================================================
// Scenario: notifications
// ============================================================================

/// A notification runs its handler (which errors) and produces no
/// response; a regular call afterwards still works.
pub async fn run_notification_is_silent<F: CodecFactory>() {
    if let Err(e) = run_notification_is_silent_inner::<F>().await {
        panic!("run_notification_is_silent failed: {e}");
    }
}

async fn run_notification_is_silent_inner<F: CodecFactory>() -> Result<(), TestError> {
    let (client, server) = served_pair::<F>().await?;

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    server.handle("log", move |_ep, _line: String| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(WireError::internal("log handler always fails"))
        }
    });
    server.handle("add", |_ep, args: Args| async move { Ok(args.a + args.b) });

    client.notify("log", &"payload".to_string()).await?;

    // The follow-up call orders us after the notification's dispatch and
    // proves the failed notification produced no response frame: if it
    // had, the reader would have dropped or misrouted it by now.
    let sum: i64 = client.call("add", &Args { a: 3, b: 4 }).await?;
    if sum != 7 {
        return Err(TestError::Assertion(format!("expected 7, got {sum}")));
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while seen.load(Ordering::SeqCst) == 0 {
        if tokio::time::Instant::now() >= deadline {
            return Err(TestError::Assertion(
                "notification handler never ran".into(),
            ));
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    if client.pending_count() != 0 {
        return Err(TestError::Assertion(
            "notification left a pending entry".into(),
        ));
    }
    Ok(())
}

// ============================================================================
// Scenario: handler panic
// ============================================================================

/// A panicking handler produces a handler-aborted error response and the
/// endpoint keeps serving.
pub async fn run_handler_panic<F: CodecFactory>() {
    if let Err(e) = run_handler_panic_inner::<F>().await {
        panic!("run_handler_panic failed: {e}");
    }
}

async fn run_handler_panic_inner<F: CodecFactory>() -> Result<(), TestError> {
    let (client, server) = served_pair::<F>().await?;
    server.handle("boom", |_ep, _args: Args| async move {
        panic!("handler blew up");
        #[allow(unreachable_code)]
        Ok(0i64)
    });
    server.handle("add", |_ep, args: Args| async move { Ok(args.a + args.b) });

    match client.call::<_, i64>("boom", &Args { a: 0, b: 0 }).await {
        Err(RpcError::Remote(e)) => {
            if !e.message.contains("handler aborted") {
                return Err(TestError::Assertion(format!(
                    "expected a handler-aborted message, got '{}'",
                    e.message
                )));
            }
        }
        other => {
            return Err(TestError::Assertion(format!(
                "expected Remote error, got {other:?}"
            )));
        }
    }

    let sum: i64 = client.call("add", &Args { a: 20, b: 22 }).await?;
    if sum != 42 {
        return Err(TestError::Assertion(format!("expected 42, got {sum}")));
    }
    Ok(())
}

// ============================================================================
// Scenario: shutdown drains pending calls
// ============================================================================

/// Ten calls against a peer that never replies all complete with
/// *connection shut down* once the peer tears the connection down, and the
/// disconnect callback fires exactly once.
pub async fn run_shutdown_drains_pending<F: CodecFactory>() {
    if let Err(e) = run_shutdown_drains_pending_inner::<F>().await {
        panic!("run_shutdown_drains_pending failed: {e}");
    }
}

async fn run_shutdown_drains_pending_inner<F: CodecFactory>() -> Result<(), TestError> {
    let (client, server) = served_pair::<F>().await?;

    let disconnects = Arc::new(AtomicUsize::new(0));
    let counter = disconnects.clone();
    client.on_disconnect(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    server.handle("stall", |_ep, _args: Args| async move {
        std::future::pending::<()>().await;
        Ok(0i64)
    });

    let mut waiting = Vec::new();
    for i in 0..10 {
        waiting.push(client.go("stall", &Args { a: i, b: i }).await?);
    }
    if client.pending_count() != 10 {
        return Err(TestError::Assertion(format!(
            "expected 10 pending calls, got {}",
            client.pending_count()
        )));
    }

    server.close().await?;

    for call in waiting {
        match tokio::time::timeout(Duration::from_secs(5), call.wait::<i64>()).await {
            Ok(Err(RpcError::Shutdown)) => {}
            Ok(other) => {
                return Err(TestError::Assertion(format!(
                    "expected Shutdown, got {other:?}"
                )));
            }
            Err(_) => {
                return Err(TestError::Assertion(
                    "pending call did not complete within 5s of teardown".into(),
                ));
            }
        }
    }
    if client.pending_count() != 0 {
        return Err(TestError::Assertion(
            "pending table not empty after teardown".into(),
        ));
    }

    match client.call::<_, i64>("stall", &Args { a: 0, b: 0 }).await {
        Err(RpcError::Shutdown) | Err(RpcError::Codec(_)) => {}
        other => {
            return Err(TestError::Assertion(format!(
                "expected calls to fail after shutdown, got {other:?}"
            )));
        }
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while disconnects.load(Ordering::SeqCst) == 0 {
        if tokio::time::Instant::now() >= deadline {
            return Err(TestError::Assertion(
                "disconnect callback never fired".into(),
            ));
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    // Closing again must not re-fire the callback.
    client.close().await?;
    tokio::time::sleep(Duration::from_millis(20)).await;
    if disconnects.load(Ordering::SeqCst) != 1 {
        return Err(TestError::Assertion(format!(
            "disconnect callback fired {} times",
            disconnects.load(Ordering::SeqCst)
        )));
    }
    Ok(())
}

// ============================================================================
// Scenario: concurrent calls
// ============================================================================

/// Many interleaved calls from one endpoint all resolve to their own
/// replies, in whatever order the peer answers.
pub async fn run_concurrent_calls<F: CodecFactory>() {
    if let Err(e) = run_concurrent_calls_inner::<F>().await {
        panic!("run_concurrent_calls failed: {e}");
    }
}

async fn run_concurrent_calls_inner<F: CodecFactory>() -> Result<(), TestError> {
    let (client, server) = served_pair::<F>().await?;
    server.handle("add", |_ep, args: Args| async move { Ok(args.a + args.b) });

    let mut tasks = Vec::new();
    for i in 0..32i64 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            let sum: i64 = client.call("add", &Args { a: i, b: 1000 }).await?;
            Ok::<_, RpcError>((i, sum))
        }));
    }

    for task in tasks {
        let (i, sum) = task
            .await
            .map_err(|e| TestError::Setup(format!("caller task panicked: {e}")))??;
        if sum != i + 1000 {
            return Err(TestError::Assertion(format!(
                "call {i} got mismatched reply {sum}"
            )));
        }
    }
    if client.pending_count() != 0 {
        return Err(TestError::Assertion(format!(
            "pending table not empty: {:?}",
            client.pending_seqs()
        )));
    }
    Ok(())
}
