//! The generic hypermedia resource.
//!
//! A [`Resource`] wraps one server response: the entity's `attributes` and
//! the `links` the server currently offers. Every string link becomes a
//! [`BoundOperation`]; nested link maps are child template namespaces and
//! are only used to materialize embedded children.
//!
//! All of a resource's state lives in a single immutable [`Snapshot`].
//! Refreshing or mutating a resource swaps the whole snapshot at once, so
//! a reader holding a snapshot never sees attributes from one response
//! next to operations from another.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{PublishError, PublishResult};
use crate::request::RequestType;
use crate::transport::Transport;
use crate::utils::expand_template;

use super::children::build_children;
use super::envelope::{Envelope, LinkEntry, Links};
use super::kind::ResourceKind;

/// An operation name bound to the URI the server supplied for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundOperation {
    name: String,
    uri: String,
}

impl BoundOperation {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw URI (or URI template) from the links map
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The URI with template placeholders filled in
    pub fn expand(&self, params: &[(String, String)]) -> String {
        expand_template(&self.uri, params)
    }
}

/// Describes one call of a bound operation.
#[derive(Debug, Clone)]
pub struct Invocation {
    method: Method,
    params: Vec<(String, String)>,
    query: Option<HashMap<String, String>>,
    body: RequestType,
}

impl Invocation {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            params: Vec::new(),
            query: None,
            body: RequestType::Plain,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Fill the `{name}` placeholder of the operation's URI template
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// Add a query string parameter
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.to_string());
        self
    }

    pub fn body(mut self, body: RequestType) -> Self {
        self.body = body;
        self
    }

    /// Serialize `body` as the JSON request body
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> PublishResult<Self> {
        Ok(self.body(RequestType::json(body)?))
    }
}

/// One consistent view of a resource, taken from a single response.
#[derive(Debug, Clone)]
pub struct Snapshot {
    attributes: Map<String, Value>,
    links: Links,
    operations: BTreeMap<String, BoundOperation>,
    namespaces: BTreeMap<String, Links>,
    children: BTreeMap<&'static str, Vec<Resource>>,
}

impl Snapshot {
    fn from_envelope(envelope: Envelope) -> Self {
        let mut operations = BTreeMap::new();
        let mut namespaces = BTreeMap::new();

        for (name, entry) in &envelope.links {
            match entry {
                LinkEntry::Direct(uri) => {
                    operations.insert(
                        name.clone(),
                        BoundOperation {
                            name: name.clone(),
                            uri: uri.clone(),
                        },
                    );
                }
                LinkEntry::Namespace(templates) => {
                    namespaces.insert(name.clone(), templates.clone());
                }
            }
        }

        Snapshot {
            attributes: envelope.resource,
            links: envelope.links,
            operations,
            namespaces,
            children: BTreeMap::new(),
        }
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn links(&self) -> &Links {
        &self.links
    }

    pub fn operations(&self) -> impl Iterator<Item = &BoundOperation> {
        self.operations.values()
    }

    pub fn operation(&self, name: &str) -> Option<&BoundOperation> {
        self.operations.get(name)
    }

    /// A child template namespace by name
    pub fn namespace(&self, name: &str) -> Option<&Links> {
        self.namespaces.get(name)
    }

    pub fn children(&self, list_name: &str) -> &[Resource] {
        self.children
            .get(list_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// A remote entity and the operations the server currently permits on it.
#[derive(Debug, Clone)]
pub struct Resource {
    kind: ResourceKind,
    transport: Arc<dyn Transport>,
    snapshot: Arc<Snapshot>,
    parent: Option<Arc<Resource>>,
}

impl Resource {
    /// Build a resource from a `{resource, links}` response.
    ///
    /// Fails with [`PublishError::MalformedResponse`] when the response does
    /// not have that shape. Declared children embedded in the payload are
    /// materialized, and so are their own embedded children.
    pub fn from_response(
        kind: ResourceKind,
        transport: Arc<dyn Transport>,
        response: Value,
        parent: Option<Arc<Resource>>,
    ) -> PublishResult<Self> {
        let envelope = Envelope::from_value(response)?;
        Self::build(kind, transport, envelope, parent)
    }

    /// Build one resource per envelope of an array response
    pub fn many(
        kind: ResourceKind,
        transport: Arc<dyn Transport>,
        response: Value,
        parent: Option<Arc<Resource>>,
    ) -> PublishResult<Vec<Self>> {
        let Value::Array(items) = response else {
            return Err(PublishError::malformed(format!(
                "expected a list of resources, got {response}"
            )));
        };

        items
            .into_iter()
            .map(|item| Self::from_response(kind, transport.clone(), item, parent.clone()))
            .collect()
    }

    /// Fetch a resource from a known URI
    pub async fn from_uri(
        kind: ResourceKind,
        transport: Arc<dyn Transport>,
        uri: &str,
    ) -> PublishResult<Self> {
        let response = transport
            .send(Method::GET, uri, None, RequestType::Plain)
            .await?;
        Self::from_response(kind, transport, response, None)
    }

    /// A child built from a synthetic envelope, exactly like a directly
    /// fetched one. Records nested inside the envelope are expanded too.
    pub(crate) fn embedded(
        kind: ResourceKind,
        transport: Arc<dyn Transport>,
        envelope: Envelope,
        parent: Arc<Resource>,
    ) -> PublishResult<Self> {
        Self::build(kind, transport, envelope, Some(parent))
    }

    fn build(
        kind: ResourceKind,
        transport: Arc<dyn Transport>,
        envelope: Envelope,
        parent: Option<Arc<Resource>>,
    ) -> PublishResult<Self> {
        let mut resource = Resource {
            kind,
            transport,
            snapshot: Arc::new(Snapshot::from_envelope(envelope)),
            parent,
        };

        let specs = kind.child_specs();
        if !specs.is_empty() {
            let this = Arc::new(resource.clone());
            let mut snapshot = (*resource.snapshot).clone();

            for spec in specs {
                snapshot
                    .children
                    .insert(spec.list_name, build_children(spec, &this)?);
            }

            resource.snapshot = Arc::new(snapshot);
        }

        Ok(resource)
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// The current snapshot. It stays consistent even if this resource is
    /// refreshed afterwards.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.clone()
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        self.snapshot.attributes()
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.snapshot.attributes.get(name)
    }

    /// Whether an attribute is present and not null
    pub fn is_set(&self, name: &str) -> bool {
        self.attribute(name).is_some_and(|value| !value.is_null())
    }

    pub fn links(&self) -> &Links {
        self.snapshot.links()
    }

    /// The operations that can be performed on this resource right now.
    /// These map directly onto the string entries of the `links` section.
    pub fn list_operations(&self) -> Vec<&str> {
        self.snapshot.operations.keys().map(String::as_str).collect()
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.snapshot.operations.contains_key(name)
    }

    /// Look up an operation, failing with [`PublishError::NotImplemented`]
    /// when the server does not currently offer it.
    pub fn operation(&self, name: &str) -> PublishResult<&BoundOperation> {
        self.snapshot
            .operation(name)
            .ok_or_else(|| PublishError::not_implemented(name))
    }

    /// The raw URI of an operation
    pub fn uri(&self, name: &str) -> PublishResult<&str> {
        self.operation(name).map(BoundOperation::uri)
    }

    /// Materialized children stored under `list_name`
    pub fn children(&self, list_name: &str) -> &[Resource] {
        self.snapshot.children(list_name)
    }

    /// The resource this one was produced from, if any
    pub fn parent(&self) -> Option<&Resource> {
        self.parent.as_deref()
    }

    /// Call an operation and return the raw response
    pub async fn invoke(&self, name: &str, invocation: Invocation) -> PublishResult<Value> {
        let uri = self.operation(name)?.expand(&invocation.params);

        self.transport
            .send(invocation.method, &uri, invocation.query, invocation.body)
            .await
    }

    /// Call an operation whose response is this resource's new state, and
    /// swap it in.
    pub async fn mutate(&mut self, name: &str, invocation: Invocation) -> PublishResult<&mut Self> {
        let response = self.invoke(name, invocation).await?;
        self.replace(response)?;
        Ok(self)
    }

    /// Like [`Resource::mutate`], for a path the links do not name directly
    pub(crate) async fn mutate_path(
        &mut self,
        path: &str,
        invocation: Invocation,
    ) -> PublishResult<&mut Self> {
        let response = self
            .transport
            .send(invocation.method, path, invocation.query, invocation.body)
            .await?;
        self.replace(response)?;
        Ok(self)
    }

    /// Call an operation that produces a new resource parented to this one
    pub async fn subresource(
        &self,
        name: &str,
        invocation: Invocation,
        kind: ResourceKind,
    ) -> PublishResult<Resource> {
        let response = self.invoke(name, invocation).await?;
        Resource::from_response(kind, self.transport(), response, Some(Arc::new(self.clone())))
    }

    /// Call an operation that produces a list of resources parented to this one
    pub async fn subresources(
        &self,
        name: &str,
        invocation: Invocation,
        kind: ResourceKind,
    ) -> PublishResult<Vec<Resource>> {
        let response = self.invoke(name, invocation).await?;
        Resource::many(kind, self.transport(), response, Some(Arc::new(self.clone())))
    }

    /// Call an operation that returns a new version of this resource as a
    /// separate value, with the same kind and parent.
    pub async fn derive(&self, name: &str, invocation: Invocation) -> PublishResult<Resource> {
        let response = self.invoke(name, invocation).await?;
        Resource::from_response(self.kind, self.transport(), response, self.parent.clone())
    }

    /// Re-fetch this resource and replace its state in place
    pub async fn show(&mut self) -> PublishResult<&mut Self> {
        self.mutate("show", Invocation::get()).await
    }

    /// Re-fetch this resource into a new value, leaving `self` untouched
    pub async fn refresh(&self) -> PublishResult<Resource> {
        let mut fresh = self.clone();
        fresh.show().await?;
        Ok(fresh)
    }

    // Builds the complete new state before touching `self`, so a malformed
    // response leaves the previous snapshot in place.
    fn replace(&mut self, response: Value) -> PublishResult<()> {
        let fresh = Resource::from_response(
            self.kind,
            self.transport(),
            response,
            self.parent.clone(),
        )?;
        self.snapshot = fresh.snapshot;
        Ok(())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})",
            self.kind,
            Value::Object(self.snapshot.attributes.clone())
        )
    }
}
