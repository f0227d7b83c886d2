//! Turns a resource map into route descriptors.
//!
//! For a resource `user`:
//!
//! | entry | path |
//! |---|---|
//! | `create`, `find` | `/users` |
//! | `findById`, `updateById`, `replaceById`, `deleteById` | `/users/:userId` |
//! | action `me` (collection) | `/users/me` |
//! | action `isCool` (instance) | `/users/:userId/isCool` |
//! | child `car` | `/users/:userId/cars...` |
//!
//! Collection segments pluralize by appending `s` (`person` becomes
//! `persons`). Id parameters are the camel-cased name plus `Id`. Children are
//! only ever mounted under their parent's instance path.

use std::collections::HashSet;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::method::Method;
use crate::resource::{Entry, Resource, Resources, Verb};

/// One concrete route derived from the resource map.
#[derive(Clone, Debug)]
pub struct Descriptor {
    /// Names from the root resource down to the verb or action.
    pub hierarchy: Vec<String>,
    pub path: String,
    pub method: Method,
    pub instance: bool,
    /// The standard verb, or `None` for a custom action.
    pub verb: Option<Verb>,
    /// Id parameters in path order.
    pub params: Vec<String>,
    pub endpoint: Endpoint,
}

impl Descriptor {
    /// The verb or action name, the last element of the hierarchy.
    pub fn name(&self) -> &str {
        self.hierarchy.last().map_or("", String::as_str)
    }
}

/// Where a resource is mounted: the parent's instance path and parameters.
#[derive(Default)]
struct Scope {
    hierarchy: Vec<String>,
    prefix: String,
    params: Vec<String>,
}

/// Visits every endpoint of `resources` depth-first, in insertion order.
///
/// Fails on the first malformed node: an empty resource, a name that cannot
/// be a path segment, a name repeated within one node, or an id parameter
/// that would repeat along one path.
pub fn walk<F>(resources: &Resources, mut visit: F) -> Result<()>
where
    F: FnMut(Descriptor),
{
    let root = Scope::default();
    let mut seen = HashSet::new();
    for (name, resource) in resources.iter() {
        check_name(name, &mut seen, &root.hierarchy)?;
        walk_resource(&root, name, resource, &mut visit)?;
    }
    Ok(())
}

/// Collects [`walk`] into a list.
pub fn descriptors(resources: &Resources) -> Result<Vec<Descriptor>> {
    let mut out = Vec::new();
    walk(resources, |descriptor| out.push(descriptor))?;
    Ok(out)
}

fn walk_resource<F>(scope: &Scope, name: &str, resource: &Resource, visit: &mut F) -> Result<()>
where
    F: FnMut(Descriptor),
{
    let mut hierarchy = scope.hierarchy.clone();
    hierarchy.push(name.to_owned());
    if resource.is_empty() {
        return Err(Error::Config(format!("resource `{}` defines no endpoints", hierarchy.join("."))));
    }

    let id = id_param(name);
    if scope.params.contains(&id) {
        return Err(Error::Config(format!(
            "resource `{}` repeats path parameter `{id}`",
            hierarchy.join(".")
        )));
    }

    let collection = format!("{}/{}", scope.prefix, pluralize(name));
    let instance_path = format!("{collection}/:{id}");
    let mut instance_params = scope.params.clone();
    instance_params.push(id);

    let mount = |instance: bool| {
        if instance {
            (instance_path.as_str(), instance_params.as_slice())
        } else {
            (collection.as_str(), scope.params.as_slice())
        }
    };

    let mut seen = HashSet::new();
    for entry in resource.entries() {
        match entry {
            Entry::Verb(verb, endpoint) => {
                check_name(verb.name(), &mut seen, &hierarchy)?;
                let (path, params) = mount(verb.instance());
                visit(descriptor(&hierarchy, verb.name(), path.to_owned(), verb.method(), verb.instance(), Some(*verb), params, endpoint));
            }
            Entry::Action(action_name, action) => {
                check_name(action_name, &mut seen, &hierarchy)?;
                let (base, params) = mount(action.instance);
                let path = format!("{base}/{action_name}");
                visit(descriptor(&hierarchy, action_name, path, action.method, action.instance, None, params, &action.endpoint));
            }
            Entry::Child(child_name, child) => {
                check_name(child_name, &mut seen, &hierarchy)?;
                let nested = Scope {
                    hierarchy: hierarchy.clone(),
                    prefix: instance_path.clone(),
                    params: instance_params.clone(),
                };
                walk_resource(&nested, child_name, child, visit)?;
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn descriptor(
    hierarchy: &[String],
    name: &str,
    path: String,
    method: Method,
    instance: bool,
    verb: Option<Verb>,
    params: &[String],
    endpoint: &Endpoint,
) -> Descriptor {
    let mut hierarchy = hierarchy.to_vec();
    hierarchy.push(name.to_owned());
    Descriptor {
        hierarchy,
        path,
        method,
        instance,
        verb,
        params: params.to_vec(),
        endpoint: endpoint.clone(),
    }
}

fn check_name(name: &str, seen: &mut HashSet<String>, parent: &[String]) -> Result<()> {
    let at = if parent.is_empty() { "the root".to_owned() } else { format!("`{}`", parent.join(".")) };
    if name.is_empty() {
        return Err(Error::Config(format!("empty name under {at}")));
    }
    if name.chars().any(|c| c.is_whitespace() || matches!(c, '/' | ':' | '{' | '}' | '*' | '?' | '#')) {
        return Err(Error::Config(format!("`{name}` under {at} is not a valid path segment")));
    }
    if !seen.insert(name.to_owned()) {
        return Err(Error::Config(format!("`{name}` is defined twice under {at}")));
    }
    Ok(())
}

/// `user` → `users`. Irregular plurals are not special-cased.
pub fn pluralize(name: &str) -> String {
    format!("{name}s")
}

/// `user` → `userId`, `car-part` → `carPartId`.
pub fn id_param(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    let words = name.split(['-', '_', '.']).filter(|w| !w.is_empty());
    for (i, word) in words.enumerate() {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                out.extend(first.to_lowercase());
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(chars.as_str());
        }
    }
    out.push_str("Id");
    out
}
