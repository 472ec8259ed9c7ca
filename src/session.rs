//! # Session
//!
//! The session is the identity map and transport coordinator. It turns resource types,
//! ids and modifiers into URLs, fetches and parses documents, and guarantees that one
//! `(type, id)` maps to one [`Resource`] instance for the session's lifetime.
//!
//! ## Caches
//!
//! | Cache | Key | Filled by |
//! |-------|-----|-----------|
//! | resources by identifier | `(type, id)` | every parsed resource (unless read with `no_cache`) |
//! | resources by link | the resource's `self` link | same |
//! | documents by URL | source URL | every fetched document (unless `no_cache`) |
//! | pending | - | [`Session::create`], until the first successful POST |
//!
//! ## Registration
//!
//! A freshly parsed resource is registered in one of three ways:
//!
//! - **Merge** (normal reads): an existing clean instance adopts the fresh state and is
//!   kept; an existing dirty instance is kept untouched; otherwise the fresh instance is
//!   inserted.
//! - **Replace** (forced re-fetch): the fresh instance is inserted and the previous one is
//!   invalidated.
//! - **Skip** (`no_cache`): nothing is registered.
//!
//! ## Execution modes
//!
//! Every network-touching operation is an `async fn`. A session built with
//! [`ExecutionMode::Blocking`] owns a private single-threaded tokio runtime and exposes the
//! same operations as `*_blocking` methods that drive the future to completion. Calling
//! the wrong flavour fails with [`JsonApiError::Mode`].
//!
//! Locks are never held across an await, and the session lock is always taken before a
//! resource lock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::attributes::AttributeTree;
use crate::config::{ExecutionMode, SessionConfig};
use crate::document::{Document, DocumentParts, Pages};
use crate::error::{JsonApiError, Result};
use crate::identifier::{RelationshipValue, ResourceIdentifier};
use crate::links::{Links, Meta};
use crate::modifier::{ExtraFields, Fields, Filter, Inclusion, Modifier, Sort};
use crate::naming::jsonify_name;
use crate::relationship::RelationshipSet;
use crate::resource::{CommitOptions, Resource};
use crate::schema::{NoSchema, Schema};
use crate::transport::{HttpMethod, Transport, TransportResponse};

/// How a parsed resource enters the identity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Registration {
    Merge,
    Replace,
    Skip,
}

/// What [`Session::get`] should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// The whole collection.
    All,
    /// One resource by id.
    Id(String),
    /// The collection with modifiers appended.
    Filtered(Modifier),
}

impl From<&str> for Query {
    fn from(id: &str) -> Self {
        Query::Id(id.to_string())
    }
}

impl From<String> for Query {
    fn from(id: String) -> Self {
        Query::Id(id)
    }
}

impl From<Modifier> for Query {
    fn from(modifier: Modifier) -> Self {
        Query::Filtered(modifier)
    }
}

macro_rules! filtered_query {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Query {
            fn from(modifier: $ty) -> Self {
                Query::Filtered(modifier.into())
            }
        })*
    };
}

filtered_query!(Filter, Inclusion, Sort, Fields, ExtraFields);

/// Options for [`Session::fetch_by_identifier`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Never touch the network; a cache miss returns `None`.
    pub cache_only: bool,
    /// Bypass the cache and supersede any cached instance.
    pub force: bool,
}

#[derive(Default)]
struct IdentityMap {
    by_identifier: HashMap<ResourceIdentifier, Resource>,
    by_link: HashMap<String, Resource>,
    documents: HashMap<String, Document>,
    pending: Vec<Resource>,
}

pub(crate) struct SessionInner {
    config: SessionConfig,
    url_prefix: String,
    origin: Url,
    transport: Arc<dyn Transport>,
    schema: Arc<dyn Schema>,
    cache: Mutex<IdentityMap>,
    closed: AtomicBool,
    runtime: Option<Runtime>,
}

/// A cached, mutation-tracking view of one JSON:API server.
///
/// Cheap to clone; clones share the identity map.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("url_prefix", &self.inner.url_prefix)
            .field("mode", &self.inner.config.mode)
            .finish()
    }
}

impl Session {
    /// A session without schema: attributes are adopted verbatim and never validated.
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::with_schema(config, transport, Arc::new(NoSchema))
    }

    pub fn with_schema(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        schema: Arc<dyn Schema>,
    ) -> Result<Self> {
        let server = Url::parse(&config.server_url)?;
        let mut origin = server.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        let url_prefix = config.server_url.trim_end_matches('/').to_string();

        let runtime = match config.mode {
            ExecutionMode::Blocking => Some(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?,
            ),
            ExecutionMode::Cooperative => None,
        };
        info!(url = %url_prefix, mode = %config.mode, schema = schema.is_enabled(), "Session opened");

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                url_prefix,
                origin,
                transport,
                schema,
                cache: Mutex::new(IdentityMap::default()),
                closed: AtomicBool::new(false),
                runtime,
            }),
        })
    }

    pub(crate) fn upgrade(weak: &Weak<SessionInner>) -> Result<Session> {
        weak.upgrade()
            .map(|inner| Session { inner })
            .ok_or_else(|| JsonApiError::Invalidated("session (dropped)".into()))
    }

    fn downgrade(&self) -> Weak<SessionInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.inner.config.mode
    }

    pub fn is_cooperative(&self) -> bool {
        self.inner.config.mode == ExecutionMode::Cooperative
    }

    pub fn url_prefix(&self) -> &str {
        &self.inner.url_prefix
    }

    pub fn schema(&self) -> &dyn Schema {
        self.inner.schema.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// `{prefix}/{type}[/{id}]`, with modifiers appended as a query string.
    pub fn url_for(&self, resource_type: &str, id: Option<&str>, modifier: Option<&Modifier>) -> String {
        let mut url = format!("{}/{}", self.inner.url_prefix, resource_type);
        if let Some(id) = id {
            url.push('/');
            url.push_str(id);
        }
        if self.inner.config.trailing_slash {
            url.push('/');
        }
        match modifier {
            Some(m) => m.url_with_modifiers(&url),
            None => url,
        }
    }

    // =========================================================================
    // MODE CHECKS
    // =========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(JsonApiError::Invalidated("session (closed)".into()));
        }
        Ok(())
    }

    pub(crate) fn ensure_cooperative(&self, operation: &str) -> Result<()> {
        if !self.is_cooperative() {
            error!(operation, "Cooperative operation called on a blocking session");
            return Err(JsonApiError::Mode(format!(
                "{operation} needs a cooperative session; use the *_blocking variant"
            )));
        }
        Ok(())
    }

    pub(crate) fn ensure_blocking(&self, operation: &str) -> Result<()> {
        if self.is_cooperative() {
            error!(operation, "Blocking operation called on a cooperative session");
            return Err(JsonApiError::Mode(format!(
                "{operation} needs a blocking session; await the async variant"
            )));
        }
        Ok(())
    }

    /// Drives a future to completion on the session's private runtime.
    ///
    /// Fails with [`JsonApiError::Mode`] when called from inside another tokio runtime.
    pub(crate) fn block_on<F: Future>(&self, future: F) -> Result<F::Output> {
        if tokio::runtime::Handle::try_current().is_ok() {
            error!("Blocking operation called from inside an async runtime");
            return Err(JsonApiError::Mode(
                "blocking operations cannot run inside an async runtime; use a cooperative session".into(),
            ));
        }
        match &self.inner.runtime {
            Some(runtime) => Ok(runtime.block_on(future)),
            None => Err(JsonApiError::Mode("no runtime in a cooperative session".into())),
        }
    }

    // =========================================================================
    // TRANSPORT
    // =========================================================================

    async fn fetch_json(&self, url: &str) -> Result<Value> {
        self.ensure_open()?;
        info!(url, "Fetching document");
        let response = self.inner.transport.fetch_json(url).await?;
        if !HttpMethod::Get.expected_statuses().contains(&response.status) {
            warn!(url, status = response.status, "Fetch failed");
            return Err(JsonApiError::from_response(
                Some(response.status),
                &format!("Error {}", response.status),
                response.body.as_ref(),
            ));
        }
        response
            .body
            .ok_or_else(|| JsonApiError::validation(None, format!("empty response from {url}")))
    }

    pub(crate) async fn http_request(
        &self,
        method: HttpMethod,
        url: &str,
        body: &Value,
    ) -> Result<TransportResponse> {
        self.ensure_open()?;
        debug!(%method, url, payload = %body, "Sending request");
        let response = self.inner.transport.request(method, url, body).await?;
        if !method.expected_statuses().contains(&response.status) {
            warn!(%method, url, status = response.status, "Request failed");
            return Err(JsonApiError::from_response(
                Some(response.status),
                &format!("Could not {method} ({})", response.status),
                response.body.as_ref(),
            ));
        }
        debug!(%method, url, status = response.status, "Request succeeded");
        Ok(response)
    }

    // =========================================================================
    // DOCUMENT PARSING & REGISTRATION
    // =========================================================================

    /// Parses a document body without fetching anything.
    ///
    /// With `no_cache` the resources are not registered and the document is not cached.
    pub fn read(&self, json: Value, url: &str, no_cache: bool) -> Result<Document> {
        let registration = if no_cache {
            Registration::Skip
        } else {
            Registration::Merge
        };
        self.read_inner(json, url, registration)
    }

    pub(crate) fn read_inner(&self, json: Value, url: &str, registration: Registration) -> Result<Document> {
        self.ensure_open()?;
        let Value::Object(body) = json else {
            return Err(JsonApiError::validation(None, "document is not a JSON object"));
        };
        let has_data = body.contains_key("data");
        if let Some(errors) = body.get("errors") {
            if has_data {
                error!(url, "Document contains both data and errors");
            }
            let errors = errors.as_array().cloned().unwrap_or_default();
            return Err(JsonApiError::Document {
                status: None,
                message: format!("Error document: {}", crate::error::error_summary(&errors)),
                errors,
            });
        }
        if !has_data {
            return Err(JsonApiError::validation(None, "document has neither data nor errors"));
        }

        let (primary, is_collection) = match body.get("data") {
            Some(Value::Array(items)) => (items.iter().collect::<Vec<_>>(), true),
            Some(Value::Null) | None => (Vec::new(), false),
            Some(item @ Value::Object(_)) => (vec![item], false),
            Some(other) => {
                return Err(JsonApiError::validation(None, format!("invalid primary data: {other}")))
            }
        };
        let included_raw: Vec<&Value> = match body.get("included") {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => Vec::new(),
        };

        let resources = self.build_resources(&primary, registration)?;
        let included = self.build_resources(&included_raw, registration)?;
        let parts = DocumentParts {
            resources,
            included,
            links: Links::parse(body.get("links"), Some(&self.inner.origin)),
            meta: Meta::parse(body.get("meta")),
            jsonapi: body.get("jsonapi").cloned(),
            is_collection,
        };
        let document = Document::new(url, parts, self.downgrade());
        if registration != Registration::Skip && !url.is_empty() {
            self.inner
                .cache
                .lock()
                .documents
                .insert(url.to_string(), document.clone());
        }
        debug!(url, ?registration, "Document parsed");
        Ok(document)
    }

    fn build_resources(&self, raw: &[&Value], registration: Registration) -> Result<Vec<Resource>> {
        raw.iter()
            .map(|value| {
                let resource = Resource::from_json(
                    self.downgrade(),
                    self.schema(),
                    Some(&self.inner.origin),
                    value,
                )?;
                Ok(self.register(resource, registration))
            })
            .collect()
    }

    /// Enters a freshly parsed resource into the identity map and returns the instance
    /// callers should use.
    pub(crate) fn register(&self, fresh: Resource, registration: Registration) -> Resource {
        let Some(identifier) = fresh.identifier() else {
            return fresh;
        };
        let mut cache = self.inner.cache.lock();
        let canonical = match (registration, cache.by_identifier.get(&identifier).cloned()) {
            (Registration::Skip, _) => return fresh,
            (Registration::Merge, Some(existing)) if existing.same_instance(&fresh) => existing,
            (Registration::Merge, Some(existing)) => {
                if existing.is_dirty() {
                    debug!(%identifier, "Cached instance has local changes, fresh data ignored");
                } else {
                    existing.adopt(&fresh);
                    debug!(%identifier, "Cached instance updated");
                }
                existing
            }
            (Registration::Replace, Some(existing)) => {
                if !existing.same_instance(&fresh) {
                    existing.mark_invalid();
                    debug!(%identifier, "Cached instance superseded");
                }
                cache.by_identifier.insert(identifier, fresh.clone());
                fresh
            }
            (_, None) => {
                cache.by_identifier.insert(identifier, fresh.clone());
                fresh
            }
        };
        if let Some(link) = canonical.self_link_url() {
            cache.by_link.insert(link, canonical.clone());
        }
        canonical
    }

    /// Registers an instance whose state was just replaced in place.
    pub(crate) fn register_existing(&self, resource: &Resource) {
        let Some(identifier) = resource.identifier() else {
            return;
        };
        let mut cache = self.inner.cache.lock();
        if let Some(previous) = cache.by_identifier.insert(identifier, resource.clone()) {
            if !previous.same_instance(resource) {
                previous.mark_invalid();
            }
        }
        if let Some(link) = resource.self_link_url() {
            cache.by_link.insert(link, resource.clone());
        }
    }

    pub(crate) fn remove_resource(&self, resource: &Resource) {
        let mut cache = self.inner.cache.lock();
        if let Some(identifier) = resource.identifier() {
            cache.by_identifier.remove(&identifier);
        }
        cache.by_link.retain(|_, r| !r.same_instance(resource));
        cache.pending.retain(|r| !r.same_instance(resource));
    }

    pub(crate) fn forget_pending(&self, resource: &Resource) {
        self.inner
            .cache
            .lock()
            .pending
            .retain(|r| !r.same_instance(resource));
    }

    // =========================================================================
    // FETCHING
    // =========================================================================

    /// Fetches a document, serving it from the document cache when allowed.
    pub(crate) async fn fetch_document(&self, url: &str, registration: Registration) -> Result<Document> {
        self.ensure_open()?;
        if registration == Registration::Merge {
            let cached = self.inner.cache.lock().documents.get(url).cloned();
            if let Some(document) = cached {
                debug!(url, "Document cache hit");
                return Ok(document);
            }
        }
        let body = self.fetch_json(url).await?;
        self.read_inner(body, url, registration)
    }

    pub(crate) async fn fetch_by_identifier_inner(
        &self,
        identifier: &ResourceIdentifier,
        cache_only: bool,
        force: bool,
    ) -> Result<Option<Resource>> {
        self.ensure_open()?;
        if !force {
            let cached = self.inner.cache.lock().by_identifier.get(identifier).cloned();
            if let Some(resource) = cached {
                debug!(%identifier, "Resource cache hit");
                return Ok(Some(resource));
            }
        }
        if cache_only {
            return Ok(None);
        }
        let url = self.url_for(&identifier.resource_type, Some(&identifier.id), None);
        let registration = if force {
            Registration::Replace
        } else {
            Registration::Merge
        };
        let document = self.fetch_document(&url, registration).await?;
        document.resource().map(Some)
    }

    fn query_url(&self, resource_type: &str, query: &Query) -> String {
        match query {
            Query::All => self.url_for(resource_type, None, None),
            Query::Id(id) => self.url_for(resource_type, Some(id), None),
            Query::Filtered(modifier) => self.url_for(resource_type, None, Some(modifier)),
        }
    }

    /// Fetches a resource or a collection. Already-fetched URLs are served from the cache.
    #[tracing::instrument(skip(self, query))]
    pub async fn get(&self, resource_type: &str, query: impl Into<Query>) -> Result<Document> {
        self.ensure_cooperative("Session::get")?;
        let url = self.query_url(resource_type, &query.into());
        self.fetch_document(&url, Registration::Merge).await
    }

    pub fn get_blocking(&self, resource_type: &str, query: impl Into<Query>) -> Result<Document> {
        self.ensure_blocking("Session::get_blocking")?;
        let url = self.query_url(resource_type, &query.into());
        self.block_on(self.fetch_document(&url, Registration::Merge))?
    }

    /// Fetches the first page and walks every following page.
    #[tracing::instrument(skip(self, query))]
    pub async fn iterate(&self, resource_type: &str, query: impl Into<Query>) -> Result<Pages> {
        self.get(resource_type, query).await?.iter()
    }

    pub fn iterate_blocking(
        &self,
        resource_type: &str,
        query: impl Into<Query>,
    ) -> Result<crate::document::BlockingPages> {
        self.get_blocking(resource_type, query)?.iter_blocking()
    }

    /// Fetches a document by absolute URL.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_document_by_url(&self, url: &str) -> Result<Document> {
        self.ensure_cooperative("Session::fetch_document_by_url")?;
        self.fetch_document(url, Registration::Merge).await
    }

    pub fn fetch_document_by_url_blocking(&self, url: &str) -> Result<Document> {
        self.ensure_blocking("Session::fetch_document_by_url_blocking")?;
        self.block_on(self.fetch_document(url, Registration::Merge))?
    }

    /// Returns the cached instance, or fetches the resource's canonical URL.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_by_identifier(
        &self,
        identifier: &ResourceIdentifier,
        options: FetchOptions,
    ) -> Result<Option<Resource>> {
        self.ensure_cooperative("Session::fetch_by_identifier")?;
        self.fetch_by_identifier_inner(identifier, options.cache_only, options.force)
            .await
    }

    pub fn fetch_by_identifier_blocking(
        &self,
        identifier: &ResourceIdentifier,
        options: FetchOptions,
    ) -> Result<Option<Resource>> {
        self.ensure_blocking("Session::fetch_by_identifier_blocking")?;
        self.block_on(self.fetch_by_identifier_inner(identifier, options.cache_only, options.force))?
    }

    /// A cached resource by its `self` link.
    pub fn resource_by_link(&self, url: &str) -> Option<Resource> {
        self.inner.cache.lock().by_link.get(url).cloned()
    }

    /// A cached resource by identifier, never touching the network.
    pub fn cached(&self, identifier: &ResourceIdentifier) -> Option<Resource> {
        self.inner.cache.lock().by_identifier.get(identifier).cloned()
    }

    // =========================================================================
    // CREATION & COMMIT
    // =========================================================================

    /// Creates a local resource without id.
    ///
    /// Field names are converted to JSON:API spelling unless the schema declares them
    /// verbatim. Names declared as relationships take identifier values; dotted names
    /// (or `__`) build nested attribute maps.
    pub fn create<I, K>(&self, resource_type: &str, fields: I) -> Result<Resource>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.ensure_open()?;
        let schema = self.schema();
        let mut attributes = AttributeTree::build(resource_type, None, schema);
        let mut relationships = RelationshipSet::build(resource_type, None, schema, None)?;

        for (name, value) in fields {
            let name: String = name.into();
            if let Some(key) = relationships.resolve_name(&name) {
                if let Some(relationship) = relationships.get_mut(&key) {
                    relationship.set(&key, RelationshipValue::from_json(&value)?)?;
                }
                continue;
            }
            let key = if schema.find_spec(resource_type, &name).is_some() {
                name
            } else {
                jsonify_name(&name)
            };
            attributes.set(&key, value)?;
        }

        let resource = Resource::new_local(self.downgrade(), resource_type, attributes, relationships);
        self.inner.cache.lock().pending.push(resource.clone());
        debug!(resource_type, "Created local resource");
        Ok(resource)
    }

    /// [`Session::create`] followed by a commit.
    #[tracing::instrument(skip(self, fields))]
    pub async fn create_and_commit<I, K>(&self, resource_type: &str, fields: I) -> Result<Resource>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.ensure_cooperative("Session::create_and_commit")?;
        let resource = self.create(resource_type, fields)?;
        resource.commit_inner(CommitOptions::default()).await
    }

    pub fn create_and_commit_blocking<I, K>(&self, resource_type: &str, fields: I) -> Result<Resource>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.ensure_blocking("Session::create_and_commit_blocking")?;
        let resource = self.create(resource_type, fields)?;
        self.block_on(resource.commit_inner(CommitOptions::default()))?
    }

    /// Cached and pending resources with local changes.
    pub fn dirty_resources(&self) -> Vec<Resource> {
        let cache = self.inner.cache.lock();
        let mut dirty: Vec<Resource> = cache
            .by_identifier
            .values()
            .filter(|r| r.is_dirty())
            .cloned()
            .collect();
        dirty.extend(cache.pending.iter().filter(|r| r.is_dirty()).cloned());
        dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty_resources().is_empty()
    }

    /// Commits every dirty resource, one at a time. Stops at the first failure; resources
    /// committed before it stay committed.
    #[tracing::instrument(skip(self))]
    pub async fn commit_all(&self) -> Result<()> {
        self.ensure_cooperative("Session::commit_all")?;
        self.commit_all_inner().await
    }

    pub fn commit_all_blocking(&self) -> Result<()> {
        self.ensure_blocking("Session::commit_all_blocking")?;
        self.block_on(self.commit_all_inner())?
    }

    async fn commit_all_inner(&self) -> Result<()> {
        let dirty = self.dirty_resources();
        info!(count = dirty.len(), "Committing dirty resources");
        for resource in dirty {
            resource.commit_inner(CommitOptions::default()).await?;
        }
        Ok(())
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Invalidates every cached document and resource and empties the caches.
    pub fn invalidate(&self) {
        let map = std::mem::take(&mut *self.inner.cache.lock());
        for document in map.documents.values() {
            document.mark_invalid();
        }
        for resource in map
            .by_identifier
            .values()
            .chain(map.by_link.values())
            .chain(map.pending.iter())
        {
            resource.mark_invalid();
        }
        info!(
            documents = map.documents.len(),
            resources = map.by_identifier.len(),
            "Session invalidated"
        );
    }

    /// Invalidates everything and refuses further network operations.
    pub fn close(&self) {
        self.invalidate();
        self.inner.closed.store(true, Ordering::Release);
        info!(url = %self.inner.url_prefix, "Session closed");
    }

    /// Commits every dirty resource, then closes the session.
    pub async fn commit_and_close(&self) -> Result<()> {
        self.commit_all().await?;
        self.close();
        Ok(())
    }

    pub fn commit_and_close_blocking(&self) -> Result<()> {
        self.commit_all_blocking()?;
        self.close();
        Ok(())
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use serde_json::json;

    fn session(mock: &MockTransport) -> Session {
        Session::new(SessionConfig::new("http://localhost:8080/api"), mock.transport()).unwrap()
    }

    #[test]
    fn test_url_for() {
        let mock = MockTransport::new();
        let s = session(&mock);
        assert_eq!(s.url_for("leases", None, None), "http://localhost:8080/api/leases");
        assert_eq!(s.url_for("leases", Some("1"), None), "http://localhost:8080/api/leases/1");
        let m = Modifier::raw("include=lease-items");
        assert_eq!(
            s.url_for("leases", None, Some(&m)),
            "http://localhost:8080/api/leases?include=lease-items"
        );

        let slashed = Session::new(
            SessionConfig::new("http://localhost:8080/api/").with_trailing_slash(true),
            mock.transport(),
        )
        .unwrap();
        assert_eq!(slashed.url_for("leases", Some("1"), None), "http://localhost:8080/api/leases/1/");
    }

    #[test]
    fn test_invalid_server_url() {
        let mock = MockTransport::new();
        let err = Session::new(SessionConfig::new("not a url"), mock.transport()).unwrap_err();
        assert!(matches!(err, JsonApiError::Url(_)));
    }

    #[test]
    fn test_read_registers_and_merges() {
        let mock = MockTransport::new();
        let s = session(&mock);
        let first = s
            .read(json!({"data": {"type": "leases", "id": "1", "attributes": {"lease-id": "a"}}}), "", false)
            .unwrap()
            .resource()
            .unwrap();
        let second = s
            .read(json!({"data": {"type": "leases", "id": "1", "attributes": {"lease-id": "b"}}}), "", false)
            .unwrap()
            .resource()
            .unwrap();
        assert!(first.same_instance(&second));
        assert_eq!(first.attribute("lease_id").unwrap(), json!("b"));
    }

    #[test]
    fn test_merge_keeps_local_changes() {
        let mock = MockTransport::new();
        let s = session(&mock);
        let lease = s
            .read(json!({"data": {"type": "leases", "id": "1", "attributes": {"lease-id": "a"}}}), "", false)
            .unwrap()
            .resource()
            .unwrap();
        lease.set("lease_id", json!("local")).unwrap();
        s.read(json!({"data": {"type": "leases", "id": "1", "attributes": {"lease-id": "b"}}}), "", false)
            .unwrap();
        assert_eq!(lease.attribute("lease-id").unwrap(), json!("local"));
    }

    #[test]
    fn test_no_cache_read_is_not_registered() {
        let mock = MockTransport::new();
        let s = session(&mock);
        s.read(json!({"data": {"type": "leases", "id": "1"}}), "http://x/leases/1", true)
            .unwrap();
        assert!(s.cached(&ResourceIdentifier::new("leases", "1")).is_none());
    }

    #[test]
    fn test_no_cache_read_leaves_cached_instance_alone() {
        let mock = MockTransport::new();
        let s = session(&mock);
        let id = ResourceIdentifier::new("leases", "1");
        let cached = s
            .read(json!({"data": {"type": "leases", "id": "1", "attributes": {"v": 1}}}), "", false)
            .unwrap()
            .resource()
            .unwrap();
        let detached = s
            .read(json!({"data": {"type": "leases", "id": "1", "attributes": {"v": 2}}}), "", true)
            .unwrap()
            .resource()
            .unwrap();

        assert!(!detached.same_instance(&cached));
        assert!(cached.is_valid());
        assert_eq!(cached.attribute("v").unwrap(), json!(1));
        assert!(s.cached(&id).unwrap().same_instance(&cached));
    }

    #[test]
    fn test_query_from_builders() {
        let mock = MockTransport::new();
        let s = session(&mock);
        let filtered: Query = Filter::new().eq("active-status", "active").into();
        let Query::Filtered(modifier) = filtered else {
            panic!("expected a filtered query");
        };
        assert_eq!(
            s.url_for("leases", None, Some(&modifier)),
            "http://localhost:8080/api/leases?filter[active-status]=active"
        );

        let included: Query = Inclusion::new(["lease-items"]).into();
        assert!(matches!(included, Query::Filtered(_)));
    }

    #[test]
    fn test_included_and_self_links_registered() {
        let mock = MockTransport::new();
        let s = session(&mock);
        let doc = s
            .read(
                json!({
                    "data": [],
                    "included": [{"type": "people", "id": "9", "links": {"self": "/api/people/9"}}]
                }),
                "",
                false,
            )
            .unwrap();
        assert!(doc.is_collection());
        assert_eq!(doc.included().unwrap().len(), 1);
        let person = s.resource_by_link("http://localhost:8080/api/people/9").unwrap();
        assert!(person.same_instance(&s.cached(&ResourceIdentifier::new("people", "9")).unwrap()));
    }

    #[test]
    fn test_invalidate_poisons_everything() {
        let mock = MockTransport::new();
        let s = session(&mock);
        let doc = s
            .read(json!({"data": {"type": "leases", "id": "1", "attributes": {"x": 1}}}), "http://x/1", false)
            .unwrap();
        let lease = doc.resource().unwrap();
        s.invalidate();
        assert!(lease.attribute("x").unwrap_err().is_invalidated());
        assert!(doc.resources().unwrap_err().is_invalidated());
        assert!(s.cached(&ResourceIdentifier::new("leases", "1")).is_none());
    }

    #[test]
    fn test_create_with_relationship_and_nested_fields() {
        let mock = MockTransport::new();
        let schema = crate::schema::ModelSchema::new(json!({
            "leases": {"properties": {
                "lease-id": {"type": ["string", "null"]},
                "user-account": {"relation": "to-one", "resource": ["user-accounts"]},
                "valid-for": {"type": "object", "properties": {"start-datetime": {"type": ["string", "null"]}}}
            }}
        }))
        .unwrap();
        let s = Session::with_schema(
            SessionConfig::new("http://localhost/api"),
            mock.transport(),
            Arc::new(schema),
        )
        .unwrap();
        let lease = s
            .create(
                "leases",
                [
                    ("lease_id", json!("1")),
                    ("user_account", json!("u1")),
                    ("valid_for__start_datetime", json!("2020-01-01")),
                ],
            )
            .unwrap();
        assert_eq!(lease.attribute("valid-for.start-datetime").unwrap(), json!("2020-01-01"));
        assert_eq!(
            lease.relationship("user_account").unwrap().as_identifier_payload().unwrap(),
            json!({"id": "u1", "type": "user-accounts"})
        );
        assert!(lease.is_dirty());
        assert_eq!(s.dirty_resources().len(), 1);
    }
}
