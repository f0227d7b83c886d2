//! The merged per-request options handed to every endpoint.
//!
//! Sources, highest precedence first: path parameters, query parameters,
//! top-level fields of the JSON body. A key set by an earlier source is never
//! overwritten by a later one.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::error::Result;
use crate::request::Request;

/// Key under which a JSON body that is not an object is exposed.
pub const BODY_KEY: &str = "data";

/// Merged path, query and body values for one request.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Options(Map<String, Value>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_request(req: &Request) -> Result<Self> {
        let mut options = Self::new();
        for (key, raw) in req.params() {
            options.merge(key, coerce(raw));
        }
        for (key, value) in req.query_pairs() {
            options.merge(&key, Value::String(value));
        }
        if !req.body().iter().all(u8::is_ascii_whitespace) {
            match serde_json::from_slice::<Value>(req.body())? {
                Value::Object(fields) => {
                    for (key, value) in fields {
                        options.merge(&key, value);
                    }
                }
                other => options.merge(BODY_KEY, other),
            }
        }
        Ok(options)
    }

    fn merge(&mut self, key: &str, value: Value) {
        self.0.entry(key.to_owned()).or_insert(value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// `true` for a JSON `true` or the query string `"true"`.
    pub fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Sets a value, returning the one it replaced. Pre hooks use this.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Reads the options as a typed struct.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.0.clone()))?)
    }

    /// Renders a value the way it appeared in the URL.
    pub(crate) fn segment(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl From<Map<String, Value>> for Options {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Coerces a path segment to a JSON number when it looks numeric.
pub(crate) fn coerce(raw: &str) -> Value {
    if !looks_numeric(raw) {
        return Value::String(raw.to_owned());
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(n) = raw.parse::<u64>() {
        return Value::from(n);
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or_else(|| Value::String(raw.to_owned()), Value::Number)
}

fn looks_numeric(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(whole) && fraction.is_none_or(all_digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use serde::Deserialize;
    use serde_json::json;

    fn request(params: &[(&str, &str)], query: &str, body: &str) -> Request {
        Request::new(Method::Post, "/")
            .with_params(params.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect())
            .with_query(query)
            .with_body(body.to_owned())
    }

    #[test]
    fn coerces_numeric_segments() {
        assert_eq!(coerce("1"), json!(1));
        assert_eq!(coerce("-12"), json!(-12));
        assert_eq!(coerce("1.5"), json!(1.5));
        assert_eq!(coerce("18446744073709551615"), json!(u64::MAX));
        assert_eq!(coerce("abc"), json!("abc"));
        assert_eq!(coerce("1e5"), json!("1e5"));
        assert_eq!(coerce("1."), json!("1."));
        assert_eq!(coerce(""), json!(""));
    }

    #[test]
    fn path_params_win_over_query_and_body() {
        let req = request(&[("userId", "1")], "userId=9&sort=asc", r#"{"userId": 5, "sort": "desc", "name": "bob"}"#);
        let options = Options::from_request(&req).expect("options");
        assert_eq!(options.get("userId"), Some(&json!(1)));
        assert_eq!(options.str("sort"), Some("asc"));
        assert_eq!(options.str("name"), Some("bob"));
    }

    #[test]
    fn non_object_body_lands_under_data() {
        let options = Options::from_request(&request(&[], "", "[1,2]")).expect("options");
        assert_eq!(options.get(BODY_KEY), Some(&json!([1, 2])));
    }

    #[test]
    fn malformed_body_is_a_bad_request() {
        let err = Options::from_request(&request(&[], "", "{nope")).expect_err("bad json");
        assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn parses_into_typed_struct() {
        #[derive(Deserialize)]
        struct Lookup {
            #[serde(rename = "userId")]
            user_id: u64,
        }
        let options = Options::from_request(&request(&[("userId", "3")], "", "")).expect("options");
        assert_eq!(options.parse::<Lookup>().expect("typed").user_id, 3);
        assert_eq!(options.segment("userId").as_deref(), Some("3"));
    }
}
