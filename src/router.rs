//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. Paths use `:name`
//! parameters. A handler that fails returns its error; the router forwards
//! it exactly once to the error handler installed with [`Router::catch`].

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use hyper::body::Body;
use matchit::Router as MatchitRouter;
use tracing::debug;

use percent_encoding::percent_decode_str;

use crate::error::{self, BoxError, Error, Result};
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::request::Request;
use crate::response::{Response, ResponseBody};

/// Request bodies larger than this are rejected unless
/// [`Router::body_limit`] says otherwise.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

type Rewrite = Arc<dyn Fn(&mut Request) -> Result<()> + Send + Sync>;
type Catch = Arc<dyn Fn(Error) -> Response + Send + Sync>;

pub(crate) enum Lookup {
    Found(BoxedHandler, Vec<(String, String)>),
    MethodNotAllowed,
    NotFound,
}

/// The application router.
///
/// Build it once at startup, by hand with [`Router::on`] or from a resource
/// map with [`Api`](crate::Api), then pass it to [`Server::serve`].
///
/// [`Server::serve`]: crate::Server::serve
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    rewrites: Vec<Rewrite>,
    catch: Catch,
    body_limit: usize,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            rewrites: Vec::new(),
            catch: Arc::new(error::render),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// ```rust,no_run
    /// # use resourceful::{Error, Method, Request, Response, Router};
    /// # async fn get_user(_: Request) -> Result<Response, Error> { Ok(Response::text("")) }
    /// # async fn create_user(_: Request) -> Result<Response, Error> { Ok(Response::text("")) }
    /// Router::new()
    ///     .on(Method::Get,  "/users/:userId", get_user)
    ///     .on(Method::Post, "/users",         create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the path is malformed or conflicts with an existing route.
    /// Use [`Router::try_on`] to handle that as an error instead.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.try_on(method, path, handler)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Like [`Router::on`], but reports an invalid or conflicting path.
    pub fn try_on(mut self, method: Method, path: &str, handler: impl Handler) -> Result<Self> {
        self.routes
            .entry(method)
            .or_default()
            .insert(matchit_path(path), handler.into_boxed_handler())
            .map_err(|e| Error::Config(format!("invalid route `{method} {path}`: {e}")))?;
        Ok(self)
    }

    /// Install a rewrite that runs on every request before route lookup,
    /// e.g. [`rewrite_large_requests`](crate::middleware::rewrite_large_requests).
    pub fn rewrite<F>(mut self, rewrite: F) -> Self
    where
        F: Fn(&mut Request) -> Result<()> + Send + Sync + 'static,
    {
        self.rewrites.push(Arc::new(rewrite));
        self
    }

    /// Replace the error handler. Defaults to [`error::render`].
    pub fn catch<F>(mut self, catch: F) -> Self
    where
        F: Fn(Error) -> Response + Send + Sync + 'static,
    {
        self.catch = Arc::new(catch);
        self
    }

    /// Caps buffered request bodies at `bytes`. Larger bodies are rejected
    /// with `413 Payload Too Large`. Defaults to [`DEFAULT_BODY_LIMIT`].
    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Finds the route for `method` and `path`.
    ///
    /// A single trailing `/` is ignored, and `HEAD` falls back to the `GET`
    /// route of the same path.
    pub(crate) fn lookup(&self, method: Method, path: &str) -> Lookup {
        let trimmed = path.strip_suffix('/').filter(|p| !p.is_empty());
        let candidates: Vec<&str> = std::iter::once(path).chain(trimmed).collect();

        for path in &candidates {
            if let Some(found) = self.at(method, path) {
                return found;
            }
            if method == Method::Head {
                if let Some(found) = self.at(Method::Get, path) {
                    return found;
                }
            }
        }

        let elsewhere = candidates.iter().any(|path| {
            self.routes.iter().any(|(m, tree)| *m != method && tree.at(path).is_ok())
        });
        if elsewhere { Lookup::MethodNotAllowed } else { Lookup::NotFound }
    }

    fn at(&self, method: Method, path: &str) -> Option<Lookup> {
        let matched = self.routes.get(&method)?.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some(Lookup::Found(Arc::clone(matched.value), params))
    }

    /// Routes one request and produces one response.
    ///
    /// This is what the server calls per request; tests can call it directly.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<ResponseBody>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        match self.dispatch(req).await {
            Ok(response) => response.into_http(),
            Err(err) => (self.catch)(err).into_http(),
        }
    }

    async fn dispatch<B>(&self, req: http::Request<B>) -> Result<Response>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let mut request = Request::from_http(req, self.body_limit).await?;
        for rewrite in &self.rewrites {
            rewrite(&mut request)?;
        }

        match self.lookup(request.method, &request.path) {
            Lookup::Found(handler, params) => {
                debug!(method = %request.method, path = %request.path, "dispatching");
                request.params = decode_params(params)?;
                handler.call(request).await
            }
            Lookup::MethodNotAllowed => {
                Err(Error::http(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"))
            }
            Lookup::NotFound => Err(Error::not_found()),
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

/// Percent-decodes matched parameter values: `/users/a%20b` yields `a b`.
fn decode_params(params: Vec<(String, String)>) -> Result<Vec<(String, String)>> {
    params
        .into_iter()
        .map(|(key, raw)| {
            let value = percent_decode_str(&raw).decode_utf8().map_err(|_| {
                Error::BadRequest(format!("path parameter `{key}` is not valid UTF-8"))
            })?;
            Ok((key, value.into_owned()))
        })
        .collect()
}

/// Translates `/users/:userId` into matchit's `/users/{userId}`.
fn matchit_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};

    async fn echo(req: Request) -> Result<Response> {
        Ok(Response::text(req.param("userId").unwrap_or("none").to_owned()))
    }

    async fn fail(_req: Request) -> Result<Response> {
        Err(Error::forbidden())
    }

    fn get(uri: &str) -> http::Request<Full<Bytes>> {
        http::Request::get(uri).body(Full::default()).expect("request")
    }

    #[test]
    fn translates_colon_params() {
        assert_eq!(matchit_path("/users/:userId/cars/:carId"), "/users/{userId}/cars/{carId}");
        assert_eq!(matchit_path("/"), "/");
    }

    #[test]
    fn try_on_reports_conflicts() {
        let router = Router::new().on(Method::Get, "/users/:userId", echo);
        assert!(matches!(
            router.try_on(Method::Get, "/users/:id", echo),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn routes_with_params() {
        let router = Router::new().on(Method::Get, "/users/:userId", echo);
        let res = router.handle(get("/users/7")).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.expect("body").to_bytes();
        assert_eq!(&body[..], b"7");
    }

    #[tokio::test]
    async fn forwards_errors_to_catch_once() {
        let router = Router::new()
            .on(Method::Get, "/secret", fail)
            .catch(|err| Response::builder().status(err.status()).text("caught"));
        let res = router.handle(get("/secret")).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let body = res.into_body().collect().await.expect("body").to_bytes();
        assert_eq!(&body[..], b"caught");
    }

    #[tokio::test]
    async fn decodes_path_params() {
        let router = Router::new().on(Method::Get, "/users/:userId", echo);
        let body = router.handle(get("/users/a%20b")).await.into_body().collect().await.expect("body").to_bytes();
        assert_eq!(&body[..], b"a b");

        let res = router.handle(get("/users/%FF")).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn head_and_trailing_slash_reach_get_routes() {
        let router = Router::new().on(Method::Get, "/users/:userId", echo);
        let head = http::Request::head("/users/3").body(Full::<Bytes>::default()).expect("request");
        assert_eq!(router.handle(head).await.status(), StatusCode::OK);

        let res = router.handle(get("/users/3/")).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.expect("body").to_bytes();
        assert_eq!(&body[..], b"3");

        assert_eq!(router.handle(get("/users/3//")).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rejects_bodies_over_the_limit() {
        let router = Router::new().on(Method::Post, "/users", echo).body_limit(8);
        let small = http::Request::post("/users").body(Full::new(Bytes::from_static(b"{}"))).expect("request");
        assert_eq!(router.handle(small).await.status(), StatusCode::OK);

        let large = http::Request::post("/users").body(Full::new(Bytes::from(vec![b' '; 64]))).expect("request");
        assert_eq!(router.handle(large).await.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn distinguishes_404_and_405() {
        let router = Router::new().on(Method::Post, "/users", echo);
        assert_eq!(router.handle(get("/users")).await.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(router.handle(get("/cars")).await.status(), StatusCode::NOT_FOUND);
    }
}
