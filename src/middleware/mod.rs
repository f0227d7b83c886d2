//! Request rewrites that run before route lookup.
//!
//! Install one with [`Router::rewrite`](crate::Router::rewrite):
//!
//! ```rust
//! use resourceful::{Router, middleware};
//!
//! let router = Router::new().rewrite(middleware::rewrite_large_requests);
//! # let _ = router;
//! ```

mod override_method;

pub use override_method::{METHOD_OVERRIDE_HEADER, rewrite_large_requests};
