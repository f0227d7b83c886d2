//! Route handler trait and type erasure.
//!
//! The router holds handlers of *different* types in a single
//! `HashMap<Method, Tree>`, so each one is hidden behind a trait object
//! (`dyn ErasedHandler`) and stored uniformly:
//!
//! ```text
//! async fn hello(req: Request) -> Result<Response> { … }  ← user writes this
//!        ↓ router.on(Method::Get, "/", hello)
//! hello.into_boxed_handler()                            ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                            ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time                    ← one vtable dispatch
//! ```
//!
//! Handlers are fallible. An `Err` is not written by the handler; the router
//! forwards it, once, to its error handler (see [`Router::catch`]).
//!
//! [`Router::catch`]: crate::Router::catch

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future.
///
/// `Send + 'static` lets tokio move it across worker threads.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Internal dispatch interface.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<Result<Response>>;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any function with the signature:
///
/// ```text
/// async fn name(req: Request) -> Result<impl IntoResponse, impl Into<Error>>
/// ```
///
/// The trait is sealed; only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R, E> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<Error> + Send + 'static,
{
}

impl<F, Fut, R, E> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Holds a concrete handler `F` and bridges it to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R, E> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<Result<Response>> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.map(IntoResponse::into_response).map_err(Into::into) })
    }
}
