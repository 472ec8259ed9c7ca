//! The HTTP boundary consumed by the session.
//!
//! A [`Transport`] only moves JSON in and out; status interpretation, error extraction and
//! document parsing stay with the session.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Status codes treated as success for this method.
    pub fn expected_statuses(&self) -> &'static [u16] {
        match self {
            HttpMethod::Get => &[200],
            HttpMethod::Post | HttpMethod::Patch => &[200, 201, 202, 204],
            HttpMethod::Delete => &[200, 202, 204],
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw outcome of one HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Parsed JSON body, `None` for an empty body.
    pub body: Option<Value>,
    /// `Location` header, if the server sent one.
    pub location: Option<String>,
}

impl TransportResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self {
            status,
            body,
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Statuses whose body may carry a resource representation.
    pub fn has_resources(&self) -> bool {
        matches!(self.status, 200 | 201)
    }
}

/// The HTTP collaborator.
///
/// Implementations issue the request and decode the body; they report network failures as
/// [`JsonApiError::Transport`](crate::JsonApiError::Transport) and return every HTTP status,
/// successful or not, as a [`TransportResponse`].
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// `GET url` with `Accept: application/vnd.api+json`.
    async fn fetch_json(&self, url: &str) -> Result<TransportResponse>;

    /// A write request. `body` is `Value::Null` for DELETE.
    async fn request(&self, method: HttpMethod, url: &str, body: &Value)
        -> Result<TransportResponse>;
}
