//! Endpoints: what a resource verb or custom action executes.
//!
//! An endpoint's handler may answer in any of four ways, captured by
//! [`Reply`] and an `Err` return:
//!
//! | handler does | modelled as |
//! |---|---|
//! | answers later through the [`Responder`] it was given | `Ok(Reply::Pending)` |
//! | returns a value or a stream right away | `Ok(Reply::Ready(payload))` |
//! | returns a future | `Ok(Reply::Deferred(future))` |
//! | fails before answering | `Err(error)` |
//!
//! [`resolve`](crate::resolve::resolve) turns all four into one result.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::trace;

use crate::cache::CacheSpec;
use crate::error::{Error, Result};
use crate::handler::BoxFuture;
use crate::options::Options;
use crate::stream::StreamReply;

/// What a resolved endpoint produced.
pub enum Payload {
    /// JSON data. `Value::Null` means "nothing there" and becomes a 404.
    Json(Value),
    /// A byte stream piped to the client as-is.
    Stream(StreamReply),
}

impl Payload {
    /// Serializes any value into a JSON payload.
    pub fn json(value: impl Serialize) -> Result<Self> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<StreamReply> for Payload {
    fn from(stream: StreamReply) -> Self {
        Self::Stream(stream)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Stream(stream) => f.debug_tuple("Stream").field(&stream.content_type()).finish(),
        }
    }
}

/// How a handler chose to answer.
pub enum Reply {
    /// The handler will answer through its [`Responder`].
    Pending,
    /// The answer is already here.
    Ready(Payload),
    /// The answer arrives when this future completes.
    Deferred(BoxFuture<Result<Payload>>),
}

impl Reply {
    pub fn ready(payload: impl Into<Payload>) -> Self {
        Self::Ready(payload.into())
    }

    pub fn deferred<Fut, T>(future: Fut) -> Self
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Into<Payload>,
    {
        Self::Deferred(Box::pin(async move { future.await.map(Into::into) }))
    }
}

/// The deliver-once callback handed to every handler.
///
/// Clones share one slot. The first [`send`](Responder::send) delivers; every
/// later one, from any clone, is dropped and returns `false`.
#[derive(Clone)]
pub struct Responder {
    slot: Arc<Mutex<Option<oneshot::Sender<Result<Payload>>>>>,
}

impl Responder {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Result<Payload>>) {
        let (tx, rx) = oneshot::channel();
        (Self { slot: Arc::new(Mutex::new(Some(tx))) }, rx)
    }

    /// Delivers the handler's result. Returns `false` if one was already sent.
    pub fn send(&self, result: Result<Payload>) -> bool {
        let sender = self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        match sender {
            // The receiver may be gone if the request was abandoned; the
            // delivery still counts as the one allowed.
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => {
                trace!("dropping repeated handler response");
                false
            }
        }
    }

    pub fn ok(&self, payload: impl Into<Payload>) -> bool {
        self.send(Ok(payload.into()))
    }

    pub fn fail(&self, err: Error) -> bool {
        self.send(Err(err))
    }

    pub fn is_delivered(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

/// The raw handler signature every constructor funnels into.
pub type HandlerFn = dyn Fn(Options, Responder) -> Result<Reply> + Send + Sync;

/// An endpoint's execute step: a flat value or a handler.
#[derive(Clone)]
pub enum Execute {
    Value(Value),
    Handler(Arc<HandlerFn>),
}

impl fmt::Debug for Execute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Handler(_) => f.write_str("Handler"),
        }
    }
}

/// A resource verb or custom action: execute step, cache spec, visibility.
#[derive(Clone, Debug)]
pub struct Endpoint {
    pub(crate) execute: Execute,
    pub(crate) cache: Option<CacheSpec>,
    pub(crate) hidden: bool,
}

impl Endpoint {
    /// The general form: the handler gets a responder and says how it answers.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(Options, Responder) -> Result<Reply> + Send + Sync + 'static,
    {
        Self::from_execute(Execute::Handler(Arc::new(handler)))
    }

    /// A flat value, returned as-is on every request.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::from_execute(Execute::Value(value.into()))
    }

    /// A handler that returns its answer directly.
    pub fn sync<F, T>(handler: F) -> Self
    where
        F: Fn(Options) -> Result<T> + Send + Sync + 'static,
        T: Into<Payload>,
    {
        Self::new(move |options, _| handler(options).map(Reply::ready))
    }

    /// A handler that returns a future.
    pub fn future<F, Fut, T>(handler: F) -> Self
    where
        F: Fn(Options) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Into<Payload>,
    {
        Self::new(move |options, _| Ok(Reply::deferred(handler(options))))
    }

    /// A handler that answers through the responder, now or later.
    pub fn callback<F>(handler: F) -> Self
    where
        F: Fn(Options, Responder) + Send + Sync + 'static,
    {
        Self::new(move |options, responder| {
            handler(options, responder);
            Ok(Reply::Pending)
        })
    }

    fn from_execute(execute: Execute) -> Self {
        Self { execute, cache: None, hidden: false }
    }

    /// Caches this endpoint's JSON results through `spec`.
    pub fn cache(mut self, spec: CacheSpec) -> Self {
        self.cache = Some(spec);
        self
    }

    /// Routes the endpoint but leaves it out of the route index.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn execute(&self) -> &Execute { &self.execute }
    pub fn cache_spec(&self) -> Option<&CacheSpec> { self.cache.as_ref() }
    pub fn is_hidden(&self) -> bool { self.hidden }
}
