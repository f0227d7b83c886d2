//! Unified error type and the default JSON error renderer.
//!
//! Every failure on the request path (a pre hook, a handler, a cache store,
//! a stream) becomes an [`Error`] and is forwarded exactly once to the
//! router's error handler. The default handler is [`render`].

use std::collections::BTreeMap;

use http::StatusCode;
use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::response::Response;

/// Shorthand used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type accepted from request body implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Field-level issues carried by [`Error::Validation`].
#[derive(Clone, Debug, PartialEq)]
pub enum Fields {
    /// Per-field messages, rendered as a `fields` object.
    Map(BTreeMap<String, String>),
    /// Free-form issues, rendered into the message one per line.
    List(Vec<Value>),
}

/// The error type of every fallible operation in resourceful.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// A bad request with structured issues attached.
    #[error("{}", validation_message(.0))]
    Validation(Option<Fields>),
    /// Any other status with a message.
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error("{0}")]
    Server(String),
    /// The resource map cannot be compiled into routes.
    #[error("invalid resource map: {0}")]
    Config(String),
    #[error("invalid address: {0}")]
    Addr(#[from] std::net::AddrParseError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn bad_request() -> Self {
        Self::BadRequest("Bad Request".to_owned())
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized("Unauthorized".to_owned())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("Forbidden".to_owned())
    }

    pub fn not_found() -> Self {
        Self::NotFound("Not Found".to_owned())
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }

    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http { status, message: message.into() }
    }

    /// A validation failure with per-field messages.
    pub fn invalid_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self::Validation(Some(Fields::Map(fields)))
    }

    /// A validation failure with a list of free-form issues.
    pub fn issues(issues: Vec<Value>) -> Self {
        Self::Validation(Some(Fields::List(issues)))
    }

    /// The HTTP status this error renders with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Validation(_) | Self::Json(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Http { status, .. } => *status,
            Self::Server(_) | Self::Config(_) | Self::Addr(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn fields(&self) -> Option<Value> {
        match self {
            Self::Validation(Some(Fields::Map(fields))) => Some(Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            )),
            _ => None,
        }
    }
}

fn validation_message(fields: &Option<Fields>) -> String {
    let mut message = String::from("Bad Request");
    if let Some(Fields::List(issues)) = fields {
        message.push_str("\nIssues:");
        for issue in issues {
            message.push_str("\n - ");
            match issue {
                Value::String(s) => message.push_str(s),
                other => message.push_str(&other.to_string()),
            }
        }
    }
    message
}

/// Default error handler: status from the error, body `{"error", "fields"?}`.
pub fn render(err: Error) -> Response {
    let status = err.status();
    if status.is_server_error() {
        error!(status = status.as_u16(), error = %err, "request failed");
    } else {
        warn!(status = status.as_u16(), error = %err, "request rejected");
    }

    let mut body = Map::new();
    body.insert("error".to_owned(), Value::String(err.to_string()));
    if let Some(fields) = err.fields() {
        body.insert("fields".to_owned(), fields);
    }

    // A `Map<String, Value>` always serializes.
    let bytes = serde_json::to_vec(&body).unwrap_or_default();
    Response::builder().status(status).json(bytes)
}
