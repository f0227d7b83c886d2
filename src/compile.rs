//! Compiles a resource map into routes on a [`Router`].
//!
//! Each route runs, strictly in order:
//!
//! ```text
//! options ← path params, query, JSON body
//! pre hook            (an error stops here; the handler never runs)
//! cache get ─hit──┐
//!   └miss→ resolve handler → cache set
//!                 ↓
//! emit: stream → pipe | null → 404 | value → 200 / 201 for create
//! Cache-Control from the cache spec, hit or miss
//! post hook           (sees the response status or the error)
//! ```
//!
//! Errors are returned to the router, which forwards them to its error
//! handler exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{DefaultKey, with_cache};
use crate::endpoint::{Execute, Payload};
use crate::error::{Error, Result};
use crate::meta::{join, meta};
use crate::method::Method;
use crate::options::Options;
use crate::request::Request;
use crate::resolve::resolve;
use crate::resource::{Resources, Verb};
use crate::response::Response;
use crate::router::Router;
use crate::stream;
use crate::walk::{Descriptor, descriptors};

/// Query parameter that, set to `false`, drops the response body.
pub const RESPONSE_QUERY: &str = "response";

/// Runs before every compiled route's handler. May adjust the options.
#[async_trait]
pub trait PreHook: Send + Sync {
    async fn pre(&self, options: &mut Options, request: &Request) -> Result<()>;
}

#[async_trait]
impl<F> PreHook for F
where
    F: Fn(&mut Options, &Request) -> Result<()> + Send + Sync,
{
    async fn pre(&self, options: &mut Options, request: &Request) -> Result<()> {
        self(options, request)
    }
}

/// Runs after every compiled route, with the response status on success or
/// the error that is about to be rendered. Its result is only logged.
#[async_trait]
pub trait PostHook: Send + Sync {
    async fn post(
        &self,
        options: &Options,
        request: &Request,
        status: Option<StatusCode>,
        error: Option<&Error>,
    ) -> Result<()>;
}

#[async_trait]
impl<F> PostHook for F
where
    F: Fn(&Options, &Request, Option<StatusCode>, Option<&Error>) -> Result<()> + Send + Sync,
{
    async fn post(
        &self,
        options: &Options,
        request: &Request,
        status: Option<StatusCode>,
        error: Option<&Error>,
    ) -> Result<()> {
        self(options, request, status, error)
    }
}

#[derive(Default)]
struct Hooks {
    pre: Option<Arc<dyn PreHook>>,
    post: Option<Arc<dyn PostHook>>,
}

/// A resource map plus everything needed to compile it.
///
/// ```rust
/// use resourceful::{Api, Endpoint, Resource, Resources};
/// use serde_json::json;
///
/// let router = Api::new(Resources::new().resource(
///     "user",
///     Resource::new().find(Endpoint::value(json!([]))),
/// ))
/// .base("/api")
/// .build()
/// .expect("valid resource map");
/// # let _ = router;
/// ```
pub struct Api {
    resources: Resources,
    base: String,
    hooks: Hooks,
    index: bool,
}

impl Api {
    pub fn new(resources: Resources) -> Self {
        Self { resources, base: String::new(), hooks: Hooks::default(), index: true }
    }

    /// Mounts every route under `base`, e.g. `/api`.
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    pub fn pre(mut self, hook: impl PreHook + 'static) -> Self {
        self.hooks.pre = Some(Arc::new(hook));
        self
    }

    pub fn post(mut self, hook: impl PostHook + 'static) -> Self {
        self.hooks.post = Some(Arc::new(hook));
        self
    }

    /// Serve the route index at `GET <base>/`. On by default.
    pub fn index(mut self, enabled: bool) -> Self {
        self.index = enabled;
        self
    }

    /// The route index for this map, as served at `GET <base>/`.
    pub fn meta(&self) -> Result<Value> {
        meta(&self.resources, Some(&self.base))
    }

    /// Compiles onto a fresh router.
    pub fn build(self) -> Result<Router> {
        self.mount(Router::new())
    }

    /// Compiles onto an existing router, next to its other routes.
    pub fn mount(self, mut router: Router) -> Result<Router> {
        let descriptors = descriptors(&self.resources)?;
        let hooks = Arc::new(self.hooks);

        for descriptor in descriptors {
            let path = join(&self.base, &descriptor.path);
            let method = descriptor.method;
            debug!(%method, %path, "registering route");
            let route = Arc::new(Route::new(descriptor, Arc::clone(&hooks)));
            router = router.try_on(method, &path, move |req: Request| {
                let route = Arc::clone(&route);
                async move { route.serve(req).await }
            })?;
        }

        if self.index {
            let index = Bytes::from(serde_json::to_vec(&meta(&self.resources, Some(&self.base))?)?);
            let path = join(&self.base, "/");
            router = router.try_on(Method::Get, &path, move |_req: Request| {
                let body = index.clone();
                async move { Ok::<_, Error>(Response::json(body)) }
            })?;
        }

        info!(base = %self.base, "resource routes compiled");
        Ok(router)
    }
}

/// One compiled route.
struct Route {
    descriptor: Descriptor,
    execute: Execute,
    hooks: Arc<Hooks>,
}

impl Route {
    fn new(descriptor: Descriptor, hooks: Arc<Hooks>) -> Self {
        let execute = match descriptor.endpoint.cache_spec() {
            Some(cache) => with_cache(
                descriptor.endpoint.execute().clone(),
                cache.clone(),
                DefaultKey::new(descriptor.hierarchy.join("."), descriptor.path.clone()),
            ),
            None => descriptor.endpoint.execute().clone(),
        };
        Self { descriptor, execute, hooks }
    }

    async fn serve(&self, req: Request) -> Result<Response> {
        let mut options = Options::new();
        let outcome = match Options::from_request(&req) {
            Ok(merged) => {
                options = merged;
                self.run(&mut options, &req).await
            }
            Err(err) => Err(err),
        };

        if let Some(post) = &self.hooks.post {
            let (status, error) = match &outcome {
                Ok(response) => (Some(response.status_code()), None),
                Err(err) => (None, Some(err)),
            };
            if let Err(err) = post.post(&options, &req, status, error).await {
                warn!(error = %err, route = %self.descriptor.path, "post hook failed");
            }
        }
        outcome
    }

    async fn run(&self, options: &mut Options, req: &Request) -> Result<Response> {
        if let Some(pre) = &self.hooks.pre {
            pre.pre(options, req).await?;
        }

        let control = self.descriptor.endpoint.cache_spec().map(|cache| cache.control(options));
        let payload = resolve(&self.execute, options.clone()).await?;
        let mut response = self.emit(payload, req).await?;

        if let Some(value) = control.and_then(|c| c.header_value()) {
            response.set_header("cache-control", &value);
        }
        Ok(response)
    }

    async fn emit(&self, payload: Payload, req: &Request) -> Result<Response> {
        let status = match self.descriptor.verb {
            Some(Verb::Create) => StatusCode::CREATED,
            _ => StatusCode::OK,
        };
        match payload {
            Payload::Stream(reply) => stream::pipe(reply, status).await,
            Payload::Json(Value::Null) => Ok(Response::status(StatusCode::NOT_FOUND)),
            Payload::Json(_) if suppress_body(req) => Ok(Response::status(status)),
            Payload::Json(value) => {
                Ok(Response::builder().status(status).json(serde_json::to_vec(&value)?))
            }
        }
    }
}

fn suppress_body(req: &Request) -> bool {
    req.query_pairs().iter().any(|(k, v)| k == RESPONSE_QUERY && v == "false")
}
