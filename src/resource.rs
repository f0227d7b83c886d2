//! The resource map: a tree of named resources, each with standard verbs,
//! custom actions and nested child resources.
//!
//! ```rust
//! use resourceful::{Action, Endpoint, Method, Resource, Resources};
//! use serde_json::json;
//!
//! let resources = Resources::new().resource(
//!     "user",
//!     Resource::new()
//!         .find(Endpoint::value(json!([])))
//!         .find_by_id(Endpoint::sync(|opts| Ok(json!({ "id": opts.u64("userId") }))))
//!         .action("me", Action::new(Endpoint::value(json!({ "me": true }))).http(Method::Get, false))
//!         .child("car", Resource::new().find(Endpoint::value(json!([])))),
//! );
//! # let _ = resources;
//! ```
//!
//! Entries keep insertion order; routes and the route index follow it.

use crate::endpoint::Endpoint;
use crate::method::Method;

/// The six conventional REST verbs.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Verb {
    Create,
    Find,
    FindById,
    UpdateById,
    ReplaceById,
    DeleteById,
}

impl Verb {
    pub const ALL: [Verb; 6] = [
        Self::Create,
        Self::Find,
        Self::FindById,
        Self::UpdateById,
        Self::ReplaceById,
        Self::DeleteById,
    ];

    /// The key this verb uses in the route index.
    pub fn name(self) -> &'static str {
        match self {
            Self::Create      => "create",
            Self::Find        => "find",
            Self::FindById    => "findById",
            Self::UpdateById  => "updateById",
            Self::ReplaceById => "replaceById",
            Self::DeleteById  => "deleteById",
        }
    }

    pub fn method(self) -> Method {
        match self {
            Self::Create      => Method::Post,
            Self::Find        => Method::Get,
            Self::FindById    => Method::Get,
            Self::UpdateById  => Method::Patch,
            Self::ReplaceById => Method::Put,
            Self::DeleteById  => Method::Delete,
        }
    }

    /// Whether the verb addresses one instance (`/users/:userId`).
    pub fn instance(self) -> bool {
        !matches!(self, Self::Create | Self::Find)
    }
}

/// A custom action: an endpoint plus where it is mounted.
///
/// Without an explicit [`http`](Action::http) binding an action answers
/// `GET` on the instance path: `/users/:userId/<name>`.
#[derive(Clone, Debug)]
pub struct Action {
    pub(crate) endpoint: Endpoint,
    pub(crate) method: Method,
    pub(crate) instance: bool,
}

impl Action {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint, method: Method::Get, instance: true }
    }

    /// Mounts the action with `method`, on the instance path when `instance`
    /// is set, on the collection path otherwise.
    pub fn http(mut self, method: Method, instance: bool) -> Self {
        self.method = method;
        self.instance = instance;
        self
    }
}

impl From<Endpoint> for Action {
    fn from(endpoint: Endpoint) -> Self {
        Self::new(endpoint)
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Entry {
    Verb(Verb, Endpoint),
    Action(String, Action),
    Child(String, Resource),
}

/// One resource node.
#[derive(Clone, Debug, Default)]
pub struct Resource {
    entries: Vec<Entry>,
}

impl Resource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verb(mut self, verb: Verb, endpoint: Endpoint) -> Self {
        self.entries.push(Entry::Verb(verb, endpoint));
        self
    }

    pub fn create(self, endpoint: Endpoint) -> Self { self.verb(Verb::Create, endpoint) }
    pub fn find(self, endpoint: Endpoint) -> Self { self.verb(Verb::Find, endpoint) }
    pub fn find_by_id(self, endpoint: Endpoint) -> Self { self.verb(Verb::FindById, endpoint) }
    pub fn update_by_id(self, endpoint: Endpoint) -> Self { self.verb(Verb::UpdateById, endpoint) }
    pub fn replace_by_id(self, endpoint: Endpoint) -> Self { self.verb(Verb::ReplaceById, endpoint) }
    pub fn delete_by_id(self, endpoint: Endpoint) -> Self { self.verb(Verb::DeleteById, endpoint) }

    pub fn action(mut self, name: impl Into<String>, action: impl Into<Action>) -> Self {
        self.entries.push(Entry::Action(name.into(), action.into()));
        self
    }

    /// Nests `resource` under this one's instance path.
    pub fn child(mut self, name: impl Into<String>, resource: Resource) -> Self {
        self.entries.push(Entry::Child(name.into(), resource));
        self
    }

    pub(crate) fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The root of a resource map.
#[derive(Clone, Debug, Default)]
pub struct Resources {
    entries: Vec<(String, Resource)>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(mut self, name: impl Into<String>, resource: Resource) -> Self {
        self.entries.push((name.into(), resource));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.entries.iter().map(|(name, resource)| (name.as_str(), resource))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
