//! `POST` with `X-HTTP-Method-Override: GET` becomes a `GET`.
//!
//! Clients use this when a query is too large for a URL: they POST the
//! query as a JSON object instead. The object's fields are moved into the
//! query string, where keys already present in the URL win.

use serde_json::Value;
use tracing::debug;
use url::form_urlencoded;

use crate::error::Result;
use crate::method::Method;
use crate::request::Request;

pub const METHOD_OVERRIDE_HEADER: &str = "x-http-method-override";

/// Rewrites an overridden `POST` into a `GET`. Other requests, and override
/// values other than `GET`, pass through untouched.
pub fn rewrite_large_requests(req: &mut Request) -> Result<()> {
    if req.method() != Method::Post {
        return Ok(());
    }
    let wants_get = req.header(METHOD_OVERRIDE_HEADER)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("GET"));
    if !wants_get {
        return Ok(());
    }

    req.set_method(Method::Get);
    debug!(path = %req.path(), "rewrote POST to GET via method override");

    if req.body().iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }
    let Value::Object(fields) = serde_json::from_slice::<Value>(req.body())? else {
        return Ok(());
    };

    let mut pairs = req.query_pairs();
    for (key, value) in fields {
        if pairs.iter().any(|(k, _)| *k == key) {
            continue;
        }
        let value = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        pairs.push((key, value));
    }

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    req.set_query((!query.is_empty()).then_some(query));
    req.set_body(bytes::Bytes::new());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderName, HeaderValue};

    fn post(override_to: &str) -> Request {
        Request::new(Method::Post, "/users").with_header(
            HeaderName::from_static(METHOD_OVERRIDE_HEADER),
            HeaderValue::from_str(override_to).expect("header"),
        )
    }

    #[test]
    fn rewrites_post_with_get_override() {
        let mut req = post("GET").with_query("limit=5").with_body(r#"{"limit": 10, "name": "bob", "ids": [1, 2]}"#);
        rewrite_large_requests(&mut req).expect("rewrite");
        assert_eq!(req.method(), Method::Get);
        assert!(req.body().is_empty());
        assert_eq!(req.query_pairs(), vec![
            ("limit".to_owned(), "5".to_owned()),
            ("ids".to_owned(), "[1,2]".to_owned()),
            ("name".to_owned(), "bob".to_owned()),
        ]);
    }

    #[test]
    fn ignores_other_requests() {
        let mut req = post("DELETE");
        rewrite_large_requests(&mut req).expect("rewrite");
        assert_eq!(req.method(), Method::Post);

        let mut req = Request::new(Method::Put, "/users");
        rewrite_large_requests(&mut req).expect("rewrite");
        assert_eq!(req.method(), Method::Put);
    }

    #[test]
    fn empty_body_only_changes_method() {
        let mut req = post("get");
        rewrite_large_requests(&mut req).expect("rewrite");
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.query(), None);
    }
}
