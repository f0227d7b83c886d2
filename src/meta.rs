//! The route index: every visible endpoint, keyed by its hierarchy.
//!
//! ```json
//! { "user": { "find": { "path": "/users", "method": "get", "instance": false } } }
//! ```

use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::resource::Resources;
use crate::walk::walk;

/// Builds the route index, prefixing paths with `base` when given.
/// Hidden endpoints are left out.
pub fn meta(resources: &Resources, base: Option<&str>) -> Result<Value> {
    let mut root = Map::new();
    walk(resources, |descriptor| {
        if descriptor.endpoint.is_hidden() {
            return;
        }
        let leaf = json!({
            "path": join(base.unwrap_or_default(), &descriptor.path),
            "method": descriptor.method.as_lower(),
            "instance": descriptor.instance,
        });
        insert_at(&mut root, &descriptor.hierarchy, leaf);
    })?;
    Ok(Value::Object(root))
}

fn insert_at(root: &mut Map<String, Value>, keys: &[String], leaf: Value) {
    let Some((last, parents)) = keys.split_last() else { return };
    let mut node = root;
    for key in parents {
        let child = node.entry(key.clone()).or_insert_with(|| Value::Object(Map::new()));
        if !child.is_object() {
            *child = Value::Object(Map::new());
        }
        let Value::Object(map) = child else { return };
        node = map;
    }
    node.insert(last.clone(), leaf);
}

/// Joins a mount prefix and a route path: `("/api/", "/users")` → `/api/users`.
pub(crate) fn join(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return path.to_owned();
    }
    if path == "/" {
        return base.to_owned();
    }
    format!("{base}{path}")
}
