//! Resolves an endpoint's execute step into exactly one result.
//!
//! Flat values resolve immediately. Handlers are called with a fresh
//! [`Responder`] and whichever completion source fires first (an `Err`
//! return, a ready value, a finished future, or the responder) decides the
//! result. Every later completion is dropped by the responder.

use tracing::debug;

use crate::endpoint::{Execute, Payload, Reply, Responder};
use crate::error::{Error, Result};
use crate::options::Options;

/// Runs `execute` with `options` and waits for its single result.
pub async fn resolve(execute: &Execute, options: Options) -> Result<Payload> {
    let handler = match execute {
        Execute::Value(value) => return Ok(Payload::Json(value.clone())),
        Execute::Handler(handler) => handler,
    };

    let (responder, mut delivered) = Responder::channel();
    match handler(options, responder.clone()) {
        Err(err) => {
            responder.fail(err);
        }
        Ok(Reply::Ready(payload)) => {
            responder.ok(payload);
        }
        Ok(Reply::Pending) => {}
        Ok(Reply::Deferred(future)) => {
            tokio::select! {
                biased;
                first = &mut delivered => return first.unwrap_or_else(|_| Err(never_responded())),
                settled = future => {
                    responder.send(settled);
                }
            }
        }
    }

    // Only handler-held clones remain; if they all drop without sending,
    // the channel closes instead of hanging the request.
    drop(responder);
    delivered.await.unwrap_or_else(|_| Err(never_responded()))
}

fn never_responded() -> Error {
    debug!("handler dropped its responder without answering");
    Error::server("handler never responded")
}
