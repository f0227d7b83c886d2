//! Response caching for endpoints.
//!
//! resourceful defines the protocol only; bring your own [`CacheStore`].
//! A hit (`get` returns `Some`) skips both the handler and `set`. A miss runs
//! the handler and hands its JSON result to `set` before responding. Streams
//! are never stored.
//!
//! The `Cache-Control` header is computed on every request, hit or miss, by
//! the route itself, so a cached response is indistinguishable from a fresh
//! one.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::endpoint::{Execute, Payload, Reply, Responder};
use crate::error::Result;
use crate::options::Options;
use crate::resolve::resolve;

/// An external store keyed by the computed cache key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// `None` is a miss.
    async fn get(&self, options: &Options, key: &str) -> Result<Option<Value>>;
    async fn set(&self, options: &Options, value: &Value, key: &str) -> Result<()>;
}

/// The `Cache-Control` directives an endpoint responds with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub public: bool,
    pub private: bool,
    pub max_age: Option<Duration>,
}

impl CacheControl {
    pub fn public() -> Self {
        Self { public: true, ..Self::default() }
    }

    pub fn private() -> Self {
        Self { private: true, ..Self::default() }
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// The header value, or `None` when no directive is set.
    pub fn header_value(&self) -> Option<String> {
        let value = self.to_string();
        (!value.is_empty()).then_some(value)
    }
}

/// `public, max-age=3600`
impl fmt::Display for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut directives = Vec::new();
        if self.public {
            directives.push("public".to_owned());
        }
        if self.private {
            directives.push("private".to_owned());
        }
        if let Some(max_age) = self.max_age {
            directives.push(format!("max-age={}", max_age.as_secs()));
        }
        f.write_str(&directives.join(", "))
    }
}

type HeaderFn = dyn Fn(&Options) -> CacheControl + Send + Sync;
type KeyFn = dyn Fn(&Options) -> String + Send + Sync;

#[derive(Clone)]
enum Header {
    Static(CacheControl),
    Computed(Arc<HeaderFn>),
}

/// How one endpoint caches: header, key and store.
#[derive(Clone)]
pub struct CacheSpec {
    header: Header,
    key: Option<Arc<KeyFn>>,
    store: Arc<dyn CacheStore>,
}

impl CacheSpec {
    /// Caches through `store` with no `Cache-Control` directives and the
    /// default key (the request path).
    pub fn new(store: impl CacheStore + 'static) -> Self {
        Self::shared(Arc::new(store))
    }

    /// Like [`CacheSpec::new`] for a store that other endpoints also use.
    pub fn shared(store: Arc<dyn CacheStore>) -> Self {
        Self { header: Header::Static(CacheControl::default()), key: None, store }
    }

    pub fn header(mut self, control: CacheControl) -> Self {
        self.header = Header::Static(control);
        self
    }

    /// Computes the directives from the request options.
    pub fn header_with<F>(mut self, header: F) -> Self
    where
        F: Fn(&Options) -> CacheControl + Send + Sync + 'static,
    {
        self.header = Header::Computed(Arc::new(header));
        self
    }

    /// Overrides the default cache key.
    pub fn key<F>(mut self, key: F) -> Self
    where
        F: Fn(&Options) -> String + Send + Sync + 'static,
    {
        self.key = Some(Arc::new(key));
        self
    }

    pub(crate) fn control(&self, options: &Options) -> CacheControl {
        match &self.header {
            Header::Static(control) => *control,
            Header::Computed(header) => header(options),
        }
    }

    fn key_for(&self, options: &Options, default_key: &DefaultKey) -> String {
        match &self.key {
            Some(key) => key(options),
            None => default_key.render(options),
        }
    }
}

impl fmt::Debug for CacheSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSpec")
            .field("custom_key", &self.key.is_some())
            .finish_non_exhaustive()
    }
}

/// The key used when a spec has none: the endpoint's name, then the route
/// path with its parameters filled in from the options, e.g.
/// `user.car.findById:/users/1/cars/2`. Endpoints sharing a path and a store
/// never share entries.
#[derive(Clone, Debug)]
pub(crate) struct DefaultKey {
    endpoint: String,
    template: String,
}

impl DefaultKey {
    pub(crate) fn new(endpoint: impl Into<String>, template: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), template: template.into() }
    }

    fn render(&self, options: &Options) -> String {
        let path = self.template
            .split('/')
            .map(|segment| match segment.strip_prefix(':') {
                Some(param) => options.segment(param).unwrap_or_default(),
                None => segment.to_owned(),
            })
            .collect::<Vec<_>>()
            .join("/");
        format!("{}:{path}", self.endpoint)
    }
}

/// Wraps an execute step with `cache`.
///
/// The result is itself an execute step, so the resolver treats it like any
/// other handler whichever style the wrapped one uses.
pub(crate) fn with_cache(execute: Execute, cache: CacheSpec, default_key: DefaultKey) -> Execute {
    Execute::Handler(Arc::new(move |options: Options, _: Responder| -> Result<Reply> {
        let key = cache.key_for(&options, &default_key);
        Ok(Reply::Deferred(Box::pin(cached(execute.clone(), cache.clone(), options, key))))
    }))
}

async fn cached(execute: Execute, cache: CacheSpec, options: Options, key: String) -> Result<Payload> {
    if let Some(hit) = cache.store.get(&options, &key).await? {
        debug!(%key, "cache hit");
        return Ok(Payload::Json(hit));
    }
    debug!(%key, "cache miss");
    let payload = resolve(&execute, options.clone()).await?;
    if let Payload::Json(value) = &payload {
        cache.store.set(&options, value, &key).await?;
    }
    Ok(payload)
}
