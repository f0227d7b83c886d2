//! Incoming HTTP request type.

use bytes::Bytes;
use http::HeaderMap;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;

use crate::error::{BoxError, Error, Result};
use crate::method::Method;

/// An incoming HTTP request with its body fully buffered.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: Vec::new(),
        }
    }

    /// Buffers a hyper request. Unknown methods surface as `405`, bodies over
    /// `limit` bytes as `413`.
    pub(crate) async fn from_http<B>(req: http::Request<B>, limit: usize) -> Result<Self>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let method = Method::try_from(&parts.method).map_err(|()| {
            Error::http(http::StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
        })?;
        let body = Limited::new(body, limit)
            .collect()
            .await
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    Error::http(http::StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
                } else {
                    Error::BadRequest(format!("failed to read request body: {e}"))
                }
            })?
            .to_bytes();

        Ok(Self {
            method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers: parts.headers,
            body,
            params: Vec::new(),
        })
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:userId`, `req.param("userId")` on `/users/42`
    /// returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Path parameters in path order.
    pub fn params(&self) -> &[(String, String)] { &self.params }

    /// Decoded query pairs in query-string order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default()
    }

    pub fn set_method(&mut self, method: Method) { self.method = method; }

    pub fn set_query(&mut self, query: Option<String>) { self.query = query; }

    pub fn set_body(&mut self, body: impl Into<Bytes>) { self.body = body.into(); }

    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }
}
