//! # Resource Objects
//!
//! A [`Resource`] is a shared handle to one JSON:API resource object. Every handle to the
//! same `(type, id)` obtained through one session points at the same instance, so a
//! change made through one handle is visible through all of them.
//!
//! ## Lifecycle
//!
//! | State | How it is reached | `is_dirty()` |
//! |-------|-------------------|--------------|
//! | New | [`Session::create`](crate::Session::create) | always (no id yet) |
//! | Clean | parsed from a document, or after a successful commit | no |
//! | Modified | `set(..)` on an attribute or relationship | yes |
//! | Delete requested | [`Resource::delete`] | yes, until the DELETE is committed |
//! | Invalid | superseded by a forced re-fetch, or session invalidated/closed | every field access fails |
//!
//! ## Commit protocol
//!
//! [`Resource::commit`] picks the method from the state: POST for new resources (full
//! attribute payload without nulls, every non-empty relationship), PATCH otherwise (only
//! the attribute diff and dirty relationships), DELETE when deletion was requested.
//! Attributes are validated against the schema before anything is sent.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::attributes::AttributeTree;
use crate::document::Document;
use crate::error::{JsonApiError, Result};
use crate::identifier::{RelationshipValue, ResourceIdentifier};
use crate::links::{Links, Meta};
use crate::modifier::Modifier;
use crate::naming::jsonify_name;
use crate::relationship::{FetchPlan, Relationship, RelationshipSet};
use crate::schema::Schema;
use crate::session::{Registration, Session, SessionInner};
use crate::transport::HttpMethod;

#[derive(Clone)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

struct ResourceInner {
    resource_type: String,
    session: Weak<SessionInner>,
    state: Mutex<ResourceState>,
}

struct ResourceState {
    id: Option<String>,
    attributes: AttributeTree,
    relationships: RelationshipSet,
    links: Links,
    meta: Meta,
    delete_requested: bool,
    invalid: bool,
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = self.inner.state.try_lock().and_then(|s| s.id.clone());
        f.debug_struct("Resource")
            .field("type", &self.inner.resource_type)
            .field("id", &id)
            .finish()
    }
}

/// Result of a name-based field lookup.
#[derive(Debug, Clone)]
pub enum Field {
    Attribute(Value),
    Relationship(RelationshipRef),
}

/// Options for [`Resource::commit`].
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Send the request here instead of the resource's own URL.
    pub url: Option<String>,
    /// Top-level `meta` member of the request document.
    pub meta: Option<Value>,
}

impl CommitOptions {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl Resource {
    /// Parses one resource object. The result is not registered anywhere.
    pub(crate) fn from_json(
        session: Weak<SessionInner>,
        schema: &dyn Schema,
        base: Option<&Url>,
        raw: &Value,
    ) -> Result<Self> {
        let resource_type = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonApiError::validation(None, "resource object without type"))?;
        let id = match raw.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let attributes = AttributeTree::build(resource_type, raw.get("attributes"), schema);
        let relationships = RelationshipSet::build(resource_type, raw.get("relationships"), schema, base)?;
        Ok(Self::assemble(
            session,
            resource_type,
            ResourceState {
                id,
                attributes,
                relationships,
                links: Links::parse(raw.get("links"), base),
                meta: Meta::parse(raw.get("meta")),
                delete_requested: false,
                invalid: false,
            },
        ))
    }

    /// A locally created resource without an id.
    pub(crate) fn new_local(
        session: Weak<SessionInner>,
        resource_type: &str,
        attributes: AttributeTree,
        relationships: RelationshipSet,
    ) -> Self {
        Self::assemble(
            session,
            resource_type,
            ResourceState {
                id: None,
                attributes,
                relationships,
                links: Links::default(),
                meta: Meta::default(),
                delete_requested: false,
                invalid: false,
            },
        )
    }

    fn assemble(session: Weak<SessionInner>, resource_type: &str, state: ResourceState) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                resource_type: resource_type.to_string(),
                session,
                state: Mutex::new(state),
            }),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, ResourceState>> {
        let state = self.inner.state.lock();
        if state.invalid {
            return Err(JsonApiError::Invalidated(format!(
                "resource {}:{}",
                self.inner.resource_type,
                state.id.as_deref().unwrap_or("(new)")
            )));
        }
        Ok(state)
    }

    fn session(&self) -> Result<Session> {
        Session::upgrade(&self.inner.session)
    }

    pub fn resource_type(&self) -> &str {
        &self.inner.resource_type
    }

    /// `None` until the resource has been committed.
    pub fn id(&self) -> Option<String> {
        self.inner.state.lock().id.clone()
    }

    pub fn identifier(&self) -> Option<ResourceIdentifier> {
        self.id()
            .map(|id| ResourceIdentifier::new(self.inner.resource_type.clone(), id))
    }

    /// Whether both handles refer to the same instance.
    pub fn same_instance(&self, other: &Resource) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_valid(&self) -> bool {
        !self.inner.state.lock().invalid
    }

    pub(crate) fn mark_invalid(&self) {
        self.inner.state.lock().invalid = true;
    }

    /// Looks a name up among attributes first, then relationships.
    ///
    /// Names are tried verbatim and then in JSON:API spelling, so `active_status` finds
    /// `active-status`.
    pub fn get(&self, name: &str) -> Result<Field> {
        let state = self.state()?;
        if let Some(path) = attribute_path(&state.attributes, name) {
            if let Some(value) = state.attributes.get(&path) {
                return Ok(Field::Attribute(value));
            }
        }
        if let Some(resolved) = state.relationships.resolve_name(name) {
            drop(state);
            return Ok(Field::Relationship(RelationshipRef {
                resource: self.clone(),
                name: resolved,
            }));
        }
        Err(self.not_found(name))
    }

    fn not_found(&self, name: &str) -> JsonApiError {
        JsonApiError::FieldNotFound {
            resource_type: self.inner.resource_type.clone(),
            name: name.to_string(),
        }
    }

    /// The value of an attribute; dotted paths address nested maps.
    pub fn attribute(&self, path: &str) -> Result<Value> {
        let state = self.state()?;
        attribute_path(&state.attributes, path)
            .and_then(|p| state.attributes.get(&p))
            .ok_or_else(|| self.not_found(path))
    }

    /// Sets a field by name. A name matching a relationship sets that relationship from
    /// the JSON value (`null`, an id, an identifier object, or an array of those).
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        let is_relationship = {
            let state = self.state()?;
            attribute_path(&state.attributes, name).is_none()
                && state.relationships.resolve_name(name).is_some()
        };
        if is_relationship {
            self.relationship(name)?.set(RelationshipValue::from_json(&value)?)
        } else {
            self.set_attribute(name, value)
        }
    }

    /// Sets an attribute, creating it when unknown.
    pub fn set_attribute(&self, path: &str, value: Value) -> Result<()> {
        let mut state = self.state()?;
        let path = attribute_path(&state.attributes, path).unwrap_or_else(|| jsonify_name(path));
        state.attributes.set(&path, value)
    }

    /// Creates an empty nested attribute map.
    pub fn create_map(&self, name: &str) -> Result<()> {
        let mut state = self.state()?;
        let path = attribute_path(&state.attributes, name).unwrap_or_else(|| jsonify_name(name));
        state.attributes.create_map(&path)
    }

    pub fn relationship(&self, name: &str) -> Result<RelationshipRef> {
        let resolved = self
            .state()?
            .relationships
            .resolve_name(name)
            .ok_or_else(|| self.not_found(name))?;
        Ok(RelationshipRef {
            resource: self.clone(),
            name: resolved,
        })
    }

    /// Resources behind a relationship; see [`RelationshipRef::resources`].
    pub fn related(&self, name: &str) -> Result<Vec<Resource>> {
        self.relationship(name)?.resources()
    }

    pub fn attribute_names(&self) -> Result<Vec<String>> {
        Ok(self.state()?.attributes.keys())
    }

    pub fn relationship_names(&self) -> Result<Vec<String>> {
        Ok(self.state()?.relationships.names())
    }

    /// Dotted paths of changed attributes followed by names of changed relationships.
    pub fn dirty_fields(&self) -> Result<Vec<String>> {
        let state = self.state()?;
        let mut fields = state.attributes.dirty_paths();
        fields.extend(state.relationships.dirty_names());
        Ok(fields)
    }

    /// True for uncommitted resources, pending deletes, and local changes.
    pub fn is_dirty(&self) -> bool {
        let state = self.inner.state.lock();
        state.id.is_none()
            || state.delete_requested
            || state.attributes.is_dirty()
            || state.relationships.is_dirty()
    }

    pub fn links(&self) -> Result<Links> {
        Ok(self.state()?.links.clone())
    }

    pub fn meta(&self) -> Result<Meta> {
        Ok(self.state()?.meta.clone())
    }

    /// The `self` link, or `{prefix}/{type}/{id}`.
    pub fn url(&self) -> Result<String> {
        let (self_link, id) = {
            let state = self.state()?;
            (state.links.self_link().map(|l| l.url.clone()), state.id.clone())
        };
        if let Some(url) = self_link {
            return Ok(url);
        }
        match id {
            Some(id) => Ok(self.session()?.url_for(&self.inner.resource_type, Some(&id), None)),
            None => Err(JsonApiError::MissingResource(format!(
                "uncommitted {} has no url",
                self.inner.resource_type
            ))),
        }
    }

    /// Collection URL new resources of this type are POSTed to.
    pub fn post_url(&self) -> Result<String> {
        Ok(self.session()?.url_for(&self.inner.resource_type, None, None))
    }

    /// The full resource object.
    pub fn to_json(&self) -> Result<Value> {
        let state = self.state()?;
        let mut out = Map::new();
        out.insert("type".into(), Value::String(self.inner.resource_type.clone()));
        if let Some(id) = &state.id {
            out.insert("id".into(), Value::String(id.clone()));
        }
        out.insert("attributes".into(), state.attributes.to_value());
        out.insert("relationships".into(), state.relationships.to_json());
        if !state.links.is_empty() {
            out.insert("links".into(), state.links.to_json());
        }
        if !state.meta.is_empty() {
            out.insert("meta".into(), state.meta.to_json());
        }
        Ok(Value::Object(out))
    }

    /// Requests deletion on the next commit.
    pub fn delete(&self) -> Result<()> {
        self.state()?.delete_requested = true;
        Ok(())
    }

    pub fn is_delete_requested(&self) -> bool {
        self.inner.state.lock().delete_requested
    }

    /// Checks the attributes against the session's schema.
    pub fn validate(&self) -> Result<()> {
        let attributes = self.state()?.attributes.to_value();
        self.session()?.schema().validate(&self.inner.resource_type, &attributes)
    }

    pub(crate) fn mark_clean(&self) {
        let mut state = self.inner.state.lock();
        state.attributes.mark_clean();
        state.relationships.mark_clean();
    }

    /// Replaces this instance's state with `fresh`'s, keeping this instance's identity.
    pub(crate) fn adopt(&self, fresh: &Resource) {
        if self.same_instance(fresh) {
            return;
        }
        let (id, attributes, relationships, links, meta) = {
            let f = fresh.inner.state.lock();
            (
                f.id.clone(),
                f.attributes.clone(),
                f.relationships.clone(),
                f.links.clone(),
                f.meta.clone(),
            )
        };
        let mut state = self.inner.state.lock();
        state.id = id;
        state.attributes = attributes;
        state.relationships = relationships;
        state.links = links;
        state.meta = meta;
    }

    pub(crate) fn self_link_url(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .links
            .self_link()
            .map(|l| l.url.clone())
    }

    /// Commits local changes. Returns this resource, or for a 202 response the
    /// resource read from the response (or its `Location`).
    #[tracing::instrument(skip(self, options), fields(resource_type = %self.inner.resource_type, id = ?self.id()))]
    pub async fn commit(&self, options: CommitOptions) -> Result<Resource> {
        self.session()?.ensure_cooperative("Resource::commit")?;
        self.commit_inner(options).await
    }

    pub fn commit_blocking(&self, options: CommitOptions) -> Result<Resource> {
        let session = self.session()?;
        session.ensure_blocking("Resource::commit_blocking")?;
        session.block_on(self.commit_inner(options))?
    }

    pub(crate) async fn commit_inner(&self, options: CommitOptions) -> Result<Resource> {
        let session = self.session()?;
        let (method, url, payload) = self.prepare_commit(&session, options)?;
        info!(resource_type = %self.inner.resource_type, %method, url = %url, "Committing resource");
        let response = session.http_request(method, &url, &payload).await?;

        if method == HttpMethod::Delete {
            session.remove_resource(self);
            self.inner.state.lock().delete_requested = false;
            info!(resource_type = %self.inner.resource_type, id = ?self.id(), "Resource deleted");
            return Ok(self.clone());
        }

        let location = response.location.as_deref().unwrap_or("");
        if response.has_resources() {
            if let Some(body) = response.body.as_ref().filter(|b| carries_data(b)) {
                let fresh = session.read_inner(body.clone(), location, Registration::Skip)?.resource()?;
                self.adopt(&fresh);
                session.register_existing(self);
            }
        }
        self.mark_clean();
        if self.id().is_some() {
            session.forget_pending(self);
        }

        if response.status == 202 {
            if let Some(body) = response.body.as_ref().filter(|b| carries_data(b)) {
                debug!("Accepted with resource body");
                return session.read_inner(body.clone(), location, Registration::Skip)?.resource();
            }
            if let Some(location) = response.location.as_deref() {
                debug!(location, "Accepted, reading location");
                return session
                    .fetch_document(location, Registration::Skip)
                    .await?
                    .resource();
            }
        }
        Ok(self.clone())
    }

    fn prepare_commit(&self, session: &Session, options: CommitOptions) -> Result<(HttpMethod, String, Value)> {
        let delete_requested = self.state()?.delete_requested;
        if delete_requested {
            let url = match options.url {
                Some(url) => url,
                None => self.url()?,
            };
            return Ok((HttpMethod::Delete, url, Value::Null));
        }

        self.validate()?;
        let state = self.state()?;
        let method = if state.id.is_some() {
            HttpMethod::Patch
        } else {
            HttpMethod::Post
        };
        let mut data = Map::new();
        data.insert("type".into(), Value::String(self.inner.resource_type.clone()));
        if let Some(id) = &state.id {
            data.insert("id".into(), Value::String(id.clone()));
        }
        let (attributes, relationships) = match method {
            HttpMethod::Post => (
                state.attributes.creation_payload(),
                state.relationships.creation_payload(),
            ),
            _ => (state.attributes.diff(), state.relationships.dirty_payload()),
        };
        data.insert("attributes".into(), attributes);
        data.insert("relationships".into(), relationships);
        if let Some(meta) = options.meta {
            data.insert("meta".into(), meta);
        }
        drop(state);

        let url = match (options.url, method) {
            (Some(url), _) => url,
            (None, HttpMethod::Post) => session.url_for(&self.inner.resource_type, None, None),
            (None, _) => self.url()?,
        };
        let mut payload = Map::new();
        payload.insert("data".into(), Value::Object(data));
        Ok((method, url, Value::Object(payload)))
    }

    /// Re-reads this resource from the server, discarding local changes.
    #[tracing::instrument(skip(self), fields(resource_type = %self.inner.resource_type, id = ?self.id()))]
    pub async fn refresh(&self) -> Result<()> {
        self.session()?.ensure_cooperative("Resource::refresh")?;
        self.refresh_inner().await
    }

    pub fn refresh_blocking(&self) -> Result<()> {
        let session = self.session()?;
        session.ensure_blocking("Resource::refresh_blocking")?;
        session.block_on(self.refresh_inner())?
    }

    async fn refresh_inner(&self) -> Result<()> {
        let session = self.session()?;
        let url = self.url()?;
        let document = session.fetch_document(&url, Registration::Skip).await?;
        let fresh = document.resource()?;
        self.adopt(&fresh);
        self.mark_clean();
        session.register_existing(self);
        for included in document.included()? {
            session.register(included, Registration::Merge);
        }
        info!(resource_type = %self.inner.resource_type, id = ?self.id(), "Resource refreshed");
        Ok(())
    }

    fn with_relationship<R>(&self, name: &str, f: impl FnOnce(&Relationship) -> R) -> Result<R> {
        let state = self.state()?;
        let relationship = state
            .relationships
            .get(name)
            .ok_or_else(|| self.not_found(name))?;
        Ok(f(relationship))
    }

    fn with_relationship_mut<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Relationship) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.state()?;
        let relationship = state
            .relationships
            .get_mut(name)
            .ok_or_else(|| self.not_found(name))?;
        f(relationship)
    }
}

fn carries_data(body: &Value) -> bool {
    body.get("data").map_or(false, |d| !d.is_null())
}

/// The stored spelling of an attribute name, if the attribute exists.
fn attribute_path(tree: &AttributeTree, name: &str) -> Option<String> {
    if tree.contains(name) {
        return Some(name.to_string());
    }
    let alt = jsonify_name(name);
    tree.contains(&alt).then_some(alt)
}

/// A handle to one named relationship of a resource.
#[derive(Debug, Clone)]
pub struct RelationshipRef {
    resource: Resource,
    name: String,
}

impl RelationshipRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &Resource {
        &self.resource
    }

    /// `single`, `multi`, `link` or `meta`.
    pub fn kind(&self) -> Result<&'static str> {
        self.resource.with_relationship(&self.name, Relationship::kind)
    }

    pub fn is_single(&self) -> Result<bool> {
        self.resource.with_relationship(&self.name, Relationship::is_single)
    }

    pub fn is_dirty(&self) -> Result<bool> {
        self.resource.with_relationship(&self.name, Relationship::is_dirty)
    }

    pub fn is_resolved(&self) -> Result<bool> {
        self.resource.with_relationship(&self.name, Relationship::is_resolved)
    }

    pub fn identifiers(&self) -> Result<Vec<ResourceIdentifier>> {
        self.resource.with_relationship(&self.name, Relationship::identifiers)
    }

    pub fn links(&self) -> Result<Links> {
        self.resource.with_relationship(&self.name, |r| r.links().clone())
    }

    pub fn meta(&self) -> Result<Meta> {
        self.resource.with_relationship(&self.name, |r| r.meta().clone())
    }

    pub fn as_identifier_payload(&self) -> Result<Value> {
        self.resource.with_relationship(&self.name, Relationship::as_identifier_payload)
    }

    /// Replaces the targets; see [`RelationshipValue`] for accepted forms.
    pub fn set(&self, value: impl Into<RelationshipValue>) -> Result<()> {
        let name = self.name.clone();
        let targets = value.into().bind(&name)?;
        self.resource
            .with_relationship_mut(&self.name, |r| r.set_targets(&name, targets))
    }

    /// Appends targets to a to-many relationship.
    pub fn add(&self, value: impl Into<RelationshipValue>) -> Result<()> {
        let name = self.name.clone();
        let targets = value.into().bind(&name)?;
        self.resource
            .with_relationship_mut(&self.name, |r| r.add_targets(&name, targets))
    }

    pub fn clear(&self) -> Result<()> {
        let name = self.name.clone();
        self.resource
            .with_relationship_mut(&self.name, |r| r.clear(&name))
    }

    /// Resolves the relationship and returns its targets.
    #[tracing::instrument(skip(self), fields(relationship = %self.name))]
    pub async fn fetch(&self) -> Result<Vec<Resource>> {
        self.resource.session()?.ensure_cooperative("RelationshipRef::fetch")?;
        self.fetch_inner().await
    }

    pub fn fetch_blocking(&self) -> Result<Vec<Resource>> {
        let session = self.resource.session()?;
        session.ensure_blocking("RelationshipRef::fetch_blocking")?;
        session.block_on(self.fetch_inner())?
    }

    async fn fetch_inner(&self) -> Result<Vec<Resource>> {
        let session = self.resource.session()?;
        let name = self.name.clone();
        let plan = self
            .resource
            .with_relationship_mut(&self.name, |r| r.begin_fetch(&name))?;
        debug!(relationship = %self.name, ?plan, "Resolving relationship");

        let outcome = match plan {
            FetchPlan::Identifiers(identifiers) => {
                let mut resources = Vec::with_capacity(identifiers.len());
                let mut failure = None;
                for identifier in &identifiers {
                    match session.fetch_by_identifier_inner(identifier, false, false).await {
                        Ok(Some(resource)) => resources.push(resource),
                        Ok(None) => {}
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
                match failure {
                    Some(e) => Err(e),
                    None => Ok((resources, None)),
                }
            }
            FetchPlan::Link(url) => match session.fetch_document(&url, Registration::Merge).await {
                Ok(document) => document.resources().map(|r| (r, Some(document))),
                Err(e) => Err(e),
            },
            FetchPlan::Nothing => Ok((Vec::new(), None)),
        };

        match outcome {
            Ok((resources, document)) => {
                let out = resources.clone();
                self.resource.with_relationship_mut(&self.name, |r| {
                    r.finish_fetch(resources, document);
                    Ok(())
                })?;
                Ok(out)
            }
            Err(e) => {
                let _ = self.resource.with_relationship_mut(&self.name, |r| {
                    r.abort_fetch();
                    Ok(())
                });
                Err(e)
            }
        }
    }

    /// The resolved targets.
    ///
    /// A blocking session resolves on demand; a cooperative session fails with
    /// [`JsonApiError::Mode`] until [`RelationshipRef::fetch`] has completed.
    pub fn resources(&self) -> Result<Vec<Resource>> {
        if let Some(resolved) = self
            .resource
            .with_relationship(&self.name, |r| r.resolved().map(<[Resource]>::to_vec))?
        {
            return Ok(resolved);
        }
        let session = self.resource.session()?;
        if session.is_cooperative() {
            return Err(JsonApiError::Mode(format!(
                "relationship '{}' is not resolved; await fetch() first",
                self.name
            )));
        }
        session.block_on(self.fetch_inner())?
    }

    /// The single target, if any. Warns when there are several.
    pub fn resource(&self) -> Result<Option<Resource>> {
        let resources = self.resources()?;
        if resources.len() > 1 {
            warn!(relationship = %self.name, count = resources.len(), "More than 1 resource, use resources() instead");
        }
        Ok(resources.into_iter().next())
    }

    /// The document a link relationship was resolved from.
    pub fn document(&self) -> Result<Option<Document>> {
        if self.is_resolved()? {
            return self.resource.with_relationship(&self.name, |r| r.document().cloned());
        }
        self.resources()?;
        self.resource.with_relationship(&self.name, |r| r.document().cloned())
    }

    fn filter_url(&self, modifier: &Modifier) -> Result<String> {
        let related = self
            .resource
            .with_relationship(&self.name, |r| r.related_url().map(str::to_string))?;
        let base = match related {
            Some(url) => url,
            None => {
                let identifiers = self.identifiers()?;
                match (identifiers.as_slice(), self.is_single()?) {
                    ([only], true) => self.resource.session()?.url_for(&only.resource_type, Some(&only.id), None),
                    _ => {
                        return Err(JsonApiError::Relationship(format!(
                            "relationship '{}' has no url to filter",
                            self.name
                        )))
                    }
                }
            }
        };
        Ok(modifier.url_with_modifiers(&base))
    }

    /// Fetches the relationship's URL with modifiers appended.
    #[tracing::instrument(skip(self, modifier), fields(relationship = %self.name))]
    pub async fn filter(&self, modifier: &Modifier) -> Result<Document> {
        let session = self.resource.session()?;
        session.ensure_cooperative("RelationshipRef::filter")?;
        let url = self.filter_url(modifier)?;
        session.fetch_document(&url, Registration::Merge).await
    }

    pub fn filter_blocking(&self, modifier: &Modifier) -> Result<Document> {
        let session = self.resource.session()?;
        session.ensure_blocking("RelationshipRef::filter_blocking")?;
        let url = self.filter_url(modifier)?;
        session.block_on(session.fetch_document(&url, Registration::Merge))?
    }
}
