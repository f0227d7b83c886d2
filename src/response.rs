//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Routes compiled from a resource map build their responses for you. Build
//! a [`Response`] yourself only in hand-registered routes or error handlers.

use bytes::Bytes;
use futures_util::TryStreamExt;
use futures_util::stream::BoxStream;
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use tracing::warn;

use crate::error::Error;

/// A boxed stream of body chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, Error>>;

/// The body type handed to hyper.
pub type ResponseBody = UnsyncBoxBody<Bytes, Error>;

pub(crate) enum Body {
    Full(Bytes),
    Stream(ByteStream),
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK, no custom headers needed)
///
/// ```rust
/// use http::StatusCode;
/// use resourceful::Response;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use http::StatusCode;
/// use resourceful::Response;
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
/// ```
pub struct Response {
    pub(crate) body: Body,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: StatusCode,
}

impl Response {
    /// `200 OK`, `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Body::Full(Bytes::new()), headers: Vec::new(), status: code }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }

    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The buffered body, or `None` for a streaming response.
    pub fn body_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Full(bytes) => Some(bytes),
            Body::Stream(_) => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.body, Body::Stream(_))
    }

    /// Sets a header, replacing any existing value of the same name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    /// Converts into the hyper response. A failing stream chunk surfaces as
    /// a body error, which makes hyper abort the connection mid-transfer.
    pub fn into_http(self) -> http::Response<ResponseBody> {
        let body = match self.body {
            Body::Full(bytes) => Full::new(bytes).map_err(|never| match never {}).boxed_unsync(),
            Body::Stream(stream) => StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync(),
        };

        let mut res = http::Response::new(body);
        *res.status_mut() = self.status;
        for (name, value) in self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(name), Ok(value)) => {
                    res.headers_mut().append(name, value);
                }
                _ => warn!(header = %name, "dropping invalid response header"),
            }
        }
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish("application/json", Body::Full(body.into()))
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish("text/plain; charset=utf-8", Body::Full(Bytes::from(body.into())))
    }

    /// Terminate with a streamed body of the given content type.
    pub fn stream(self, content_type: &str, body: ByteStream) -> Response {
        self.finish(content_type, Body::Stream(body))
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        Response { body: Body::Full(Bytes::new()), headers: self.headers, status: self.status }
    }

    fn finish(self, content_type: &str, body: Body) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from hand-registered
/// route handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `Ok(StatusCode::NO_CONTENT)`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}
