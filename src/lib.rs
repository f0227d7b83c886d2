//! # resourceful
//!
//! Describe an API as a tree of resources; get REST routes served over
//! hyper.
//!
//! A resource named `user` with the six standard verbs compiles to:
//!
//! | verb | route |
//! |---|---|
//! | `create` | `POST /users` |
//! | `find` | `GET /users` |
//! | `findById` | `GET /users/:userId` |
//! | `updateById` | `PATCH /users/:userId` |
//! | `replaceById` | `PUT /users/:userId` |
//! | `deleteById` | `DELETE /users/:userId` |
//!
//! Custom actions mount next to them (`GET /users/:userId/isCool`), child
//! resources nest under the instance path (`/users/:userId/cars/:carId`),
//! and `GET /` serves an index of every route.
//!
//! Handlers answer with a value, a future or through a callback; all three
//! resolve to one result. Endpoints can cache through any [`CacheStore`]
//! and stream bytes with [`StreamReply`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use resourceful::{Api, Endpoint, Error, Resource, Resources, Server};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let resources = Resources::new().resource(
//!         "user",
//!         Resource::new()
//!             .find(Endpoint::value(json!([{ "id": 1 }])))
//!             .find_by_id(Endpoint::sync(|opts| match opts.u64("userId") {
//!                 Some(1) => Ok(json!({ "id": 1 })),
//!                 _ => Ok(json!(null)),
//!             })),
//!     );
//!
//!     let app = Api::new(resources).base("/api").build()?;
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//! ```

mod cache;
mod compile;
mod endpoint;
mod error;
mod handler;
mod meta;
mod method;
mod options;
mod request;
mod resolve;
mod resource;
mod response;
mod router;
mod server;
mod stream;
mod walk;

pub mod middleware;

pub use cache::{CacheControl, CacheSpec, CacheStore};
pub use compile::{Api, PostHook, PreHook, RESPONSE_QUERY};
pub use endpoint::{Endpoint, Execute, HandlerFn, Payload, Reply, Responder};
pub use error::{Error, Fields, Result, render};
pub use handler::{BoxFuture, Handler};
pub use meta::meta;
pub use method::Method;
pub use options::{BODY_KEY, Options};
pub use request::Request;
pub use resolve::resolve;
pub use resource::{Action, Resource, Resources, Verb};
pub use response::{ByteStream, IntoResponse, Response, ResponseBuilder, ResponseBody};
pub use router::{DEFAULT_BODY_LIMIT, Router};
pub use server::Server;
pub use stream::{StreamReply, StreamSender};
pub use walk::{Descriptor, descriptors, id_param, pluralize, walk};
