//! Method registration.
//!
//! Handlers are stored type-erased: registration closes a decoder and an
//! encoder over the handler's concrete argument and reply types, leaving
//! the registry with uniform `Body -> Body` callables. Lookup is read-many
//! and safe to run concurrently with dispatch; registering an existing name
//! replaces it, and registration after the endpoint has started takes
//! effect for subsequent requests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::body::Body;
use crate::codec::Codec;
use crate::endpoint::Endpoint;
use crate::error::WireError;

/// The outcome of one handler invocation: an encoded reply or a failure.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Body, WireError>> + Send>>;

/// A registered handler, erased to the uniform signature. The first
/// argument is the capability handle back onto the dispatching endpoint.
pub type Handler<C> = Arc<dyn Fn(Arc<Endpoint<C>>, Body) -> HandlerFuture + Send + Sync>;

/// The unknown-method fallback additionally receives the method name.
pub type FallbackHandler<C> =
    Arc<dyn Fn(Arc<Endpoint<C>>, String, Body) -> HandlerFuture + Send + Sync>;

pub(crate) struct Registry<C: Codec> {
    handlers: RwLock<HashMap<String, Handler<C>>>,
    fallback: RwLock<Option<FallbackHandler<C>>>,
    disconnect: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl<C: Codec> Registry<C> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            fallback: RwLock::new(None),
            disconnect: Mutex::new(None),
        }
    }

    pub(crate) fn register(&self, method: String, handler: Handler<C>) {
        if self.handlers.write().insert(method.clone(), handler).is_some() {
            tracing::debug!(method = %method, "replaced existing handler");
        }
    }

    pub(crate) fn lookup(&self, method: &str) -> Option<Handler<C>> {
        self.handlers.read().get(method).cloned()
    }

    pub(crate) fn set_fallback(&self, handler: FallbackHandler<C>) {
        *self.fallback.write() = Some(handler);
    }

    pub(crate) fn fallback(&self) -> Option<FallbackHandler<C>> {
        self.fallback.read().clone()
    }

    pub(crate) fn set_disconnect(&self, callback: Box<dyn FnOnce() + Send>) {
        *self.disconnect.lock() = Some(callback);
    }

    /// Take the disconnect callback; the caller invokes it at most once.
    pub(crate) fn take_disconnect(&self) -> Option<Box<dyn FnOnce() + Send>> {
        self.disconnect.lock().take()
    }
}
