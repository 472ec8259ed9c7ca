//! Top-level JSON:API documents and pagination.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::stream::{self, Stream};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{JsonApiError, Result};
use crate::links::{Links, Meta};
use crate::resource::Resource;
use crate::session::{Registration, Session, SessionInner};

/// A parsed document: primary resources, included resources, links and meta.
///
/// Cheap to clone; clones share state. A document becomes unusable once its session is
/// invalidated or closed.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

struct DocumentInner {
    url: String,
    resources: Vec<Resource>,
    included: Vec<Resource>,
    links: Links,
    meta: Meta,
    jsonapi: Option<Value>,
    is_collection: bool,
    invalid: AtomicBool,
    session: Weak<SessionInner>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.inner.url)
            .field("resources", &self.inner.resources.len())
            .field("included", &self.inner.included.len())
            .finish()
    }
}

/// Parsed members of a document, before it is tied to a session.
pub(crate) struct DocumentParts {
    pub(crate) resources: Vec<Resource>,
    pub(crate) included: Vec<Resource>,
    pub(crate) links: Links,
    pub(crate) meta: Meta,
    pub(crate) jsonapi: Option<Value>,
    pub(crate) is_collection: bool,
}

impl Document {
    pub(crate) fn new(url: &str, parts: DocumentParts, session: Weak<SessionInner>) -> Self {
        Self {
            inner: Arc::new(DocumentInner {
                url: url.to_string(),
                resources: parts.resources,
                included: parts.included,
                links: parts.links,
                meta: parts.meta,
                jsonapi: parts.jsonapi,
                is_collection: parts.is_collection,
                invalid: AtomicBool::new(false),
                session,
            }),
        }
    }

    fn checked(&self) -> Result<&DocumentInner> {
        if self.inner.invalid.load(Ordering::Acquire) {
            return Err(JsonApiError::Invalidated(format!("document {}", self.inner.url)));
        }
        Ok(&self.inner)
    }

    pub(crate) fn mark_invalid(&self) {
        self.inner.invalid.store(true, Ordering::Release);
    }

    pub fn is_valid(&self) -> bool {
        !self.inner.invalid.load(Ordering::Acquire)
    }

    /// The URL the document was read from; empty when parsed from a literal.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Whether the primary data was an array.
    pub fn is_collection(&self) -> bool {
        self.inner.is_collection
    }

    pub fn resources(&self) -> Result<Vec<Resource>> {
        Ok(self.checked()?.resources.clone())
    }

    /// The primary resource. Warns when the document holds more than one.
    pub fn resource(&self) -> Result<Resource> {
        let inner = self.checked()?;
        if inner.resources.len() > 1 {
            warn!(url = %inner.url, count = inner.resources.len(), "More than 1 resource, use resources() instead");
        }
        inner
            .resources
            .first()
            .cloned()
            .ok_or_else(|| JsonApiError::MissingResource(inner.url.clone()))
    }

    pub fn included(&self) -> Result<Vec<Resource>> {
        Ok(self.checked()?.included.clone())
    }

    pub fn links(&self) -> Result<&Links> {
        Ok(&self.checked()?.links)
    }

    pub fn meta(&self) -> Result<&Meta> {
        Ok(&self.checked()?.meta)
    }

    pub fn jsonapi(&self) -> Result<Option<&Value>> {
        Ok(self.checked()?.jsonapi.as_ref())
    }

    fn next_url(&self) -> Option<String> {
        self.inner.links.next().map(|l| l.url.clone())
    }

    fn session(&self) -> Result<Session> {
        Session::upgrade(&self.inner.session)
    }

    /// Fetches the page named by the `next` link.
    #[tracing::instrument(skip(self), fields(url = %self.inner.url))]
    pub async fn next_page(&self) -> Result<Option<Document>> {
        self.checked()?;
        let session = self.session()?;
        session.ensure_cooperative("Document::next_page")?;
        match self.next_url() {
            Some(url) => Ok(Some(session.fetch_document(&url, Registration::Merge).await?)),
            None => Ok(None),
        }
    }

    pub fn next_page_blocking(&self) -> Result<Option<Document>> {
        self.checked()?;
        let session = self.session()?;
        session.ensure_blocking("Document::next_page_blocking")?;
        match self.next_url() {
            Some(url) => Ok(Some(
                session.block_on(session.fetch_document(&url, Registration::Merge))??,
            )),
            None => Ok(None),
        }
    }

    /// Iterates the primary resources of this page and every following page.
    pub fn iter(&self) -> Result<Pages> {
        let inner = self.checked()?;
        self.session()?.ensure_cooperative("Document::iter")?;
        Ok(Pages {
            session: inner.session.clone(),
            current: inner.resources.iter().cloned().collect(),
            next: self.next_url(),
        })
    }

    /// Blocking counterpart of [`Document::iter`].
    pub fn iter_blocking(&self) -> Result<BlockingPages> {
        let inner = self.checked()?;
        let session = self.session()?;
        session.ensure_blocking("Document::iter_blocking")?;
        Ok(BlockingPages {
            session,
            pages: Pages {
                session: inner.session.clone(),
                current: inner.resources.iter().cloned().collect(),
                next: self.next_url(),
            },
        })
    }
}

/// Lazy, single-pass walk over a paginated collection.
///
/// Follows `links.next` once the current page is exhausted and stops at the first page
/// without a `next` link or without resources. A failed fetch is reported once and ends
/// the walk.
pub struct Pages {
    session: Weak<SessionInner>,
    current: VecDeque<Resource>,
    next: Option<String>,
}

impl Pages {
    pub async fn next(&mut self) -> Result<Option<Resource>> {
        loop {
            if let Some(resource) = self.current.pop_front() {
                return Ok(Some(resource));
            }
            let Some(url) = self.next.take() else {
                return Ok(None);
            };
            let session = Session::upgrade(&self.session)?;
            debug!(url = %url, "Following next page");
            let page = session.fetch_document(&url, Registration::Merge).await?;
            let resources = page.resources()?;
            if resources.is_empty() {
                debug!(url = %url, "Empty page, stopping");
                return Ok(None);
            }
            self.current = resources.into();
            self.next = page.next_url();
        }
    }

    /// Drains every remaining page.
    pub async fn collect(mut self) -> Result<Vec<Resource>> {
        let mut out = Vec::new();
        while let Some(resource) = self.next().await? {
            out.push(resource);
        }
        Ok(out)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Resource>> {
        stream::unfold(self, |mut pages| async move {
            match pages.next().await {
                Ok(Some(resource)) => Some((Ok(resource), pages)),
                Ok(None) => None,
                Err(e) => Some((Err(e), pages)),
            }
        })
    }
}

/// [`Pages`] driven on the session's private runtime.
pub struct BlockingPages {
    session: Session,
    pages: Pages,
}

impl Iterator for BlockingPages {
    type Item = Result<Resource>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.session.block_on(self.pages.next()) {
            Ok(Ok(Some(resource))) => Some(Ok(resource)),
            Ok(Ok(None)) => None,
            Ok(Err(e)) | Err(e) => Some(Err(e)),
        }
    }
}
