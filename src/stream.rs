//! Streamed endpoint results.
//!
//! A [`StreamReply`] pairs a content type with a byte stream. When a route
//! emits one, the adapter holds the status line back until the first
//! non-empty chunk arrives:
//!
//! - an error before any bytes is returned as an ordinary `Err`, so the router
//!   renders it like any handler failure (status and JSON body intact);
//! - an error after bytes went out cannot be reported in-band; the body
//!   yields the error and hyper aborts the connection.

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt, TryStreamExt};
use http::StatusCode;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{Error, Result};
use crate::response::{ByteStream, Response};

/// A content type plus the bytes to send under it.
pub struct StreamReply {
    content_type: String,
    body: ByteStream,
}

impl StreamReply {
    pub fn new<S>(content_type: impl Into<String>, body: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self { content_type: content_type.into(), body: body.boxed() }
    }

    /// A stream fed from a [`StreamSender`]. It ends when every sender is
    /// dropped.
    pub fn channel(content_type: impl Into<String>) -> (StreamSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let body = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        (StreamSender(tx), Self::new(content_type, body))
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

/// Write half of [`StreamReply::channel`].
#[derive(Clone)]
pub struct StreamSender(mpsc::UnboundedSender<Result<Bytes>>);

impl StreamSender {
    /// Queues a chunk. Returns `false` once the response side is gone.
    pub fn send(&self, chunk: impl Into<Bytes>) -> bool {
        self.0.send(Ok(chunk.into())).is_ok()
    }

    /// Fails the stream. Returns `false` once the response side is gone.
    pub fn fail(&self, err: Error) -> bool {
        self.0.send(Err(err)).is_ok()
    }
}

/// Pipes a stream into a response with `status` and the stream's content type.
pub(crate) async fn pipe(reply: StreamReply, status: StatusCode) -> Result<Response> {
    let StreamReply { content_type, mut body } = reply;

    let first = loop {
        match body.next().await {
            Some(Ok(chunk)) if chunk.is_empty() => continue,
            Some(Ok(chunk)) => break Some(chunk),
            Some(Err(err)) => return Err(err),
            None => break None,
        }
    };

    let rest = body.inspect_err(|err| {
        warn!(error = %err, "stream failed mid-transfer, aborting response");
    });
    let body = stream::iter(first.map(Ok)).chain(rest).boxed();

    Ok(Response::builder().status(status).stream(&content_type, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::time::Duration;

    #[tokio::test]
    async fn early_error_is_returned_before_commit() {
        let (tx, reply) = StreamReply::channel("application/json");
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(Bytes::new());
            tx.fail(Error::server("Bad news!"));
        });
        let err = pipe(reply, StatusCode::OK).await.err().expect("early error");
        assert_eq!(err.to_string(), "Bad news!");
    }

    #[tokio::test]
    async fn pipes_chunks_with_declared_type() {
        let chunks = vec![Ok(Bytes::from_static(b"[1")), Ok(Bytes::from_static(b"]"))];
        let reply = StreamReply::new("application/json", stream::iter(chunks));
        let res = pipe(reply, StatusCode::OK).await.expect("piped");
        assert!(res.is_streaming());
        assert_eq!(res.header("content-type"), Some("application/json"));
        let body = res.into_http().into_body().collect().await.expect("body").to_bytes();
        assert_eq!(&body[..], b"[1]");
    }

    #[tokio::test]
    async fn late_error_aborts_the_body() {
        let chunks = vec![Ok(Bytes::from_static(b"[1")), Err(Error::server("gone"))];
        let reply = StreamReply::new("application/json", stream::iter(chunks));
        let res = pipe(reply, StatusCode::OK).await.expect("committed");
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.into_http().into_body().collect().await.is_err());
    }

    #[tokio::test]
    async fn empty_stream_has_empty_body() {
        let reply = StreamReply::new("text/plain", stream::empty());
        let res = pipe(reply, StatusCode::CREATED).await.expect("piped");
        assert_eq!(res.status_code(), StatusCode::CREATED);
        let body = res.into_http().into_body().collect().await.expect("body").to_bytes();
        assert!(body.is_empty());
    }
}
