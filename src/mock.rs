//! # Mock Transport
//!
//! Utilities for testing code built on a [`Session`](crate::Session) without a server.
//!
//! Register canned responses with [`MockTransport::expect_fetch`] and
//! [`MockTransport::expect_request`], hand [`MockTransport::transport`] to the session, then
//! call [`MockTransport::verify`] to assert every expectation was consumed.
//!
//! Expectations are matched by method and URL, first registered first served, so the order
//! in which independent resources are committed does not matter.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{JsonApiError, Result};
use crate::transport::{HttpMethod, Transport, TransportResponse};

// =============================================================================
// EXPECTATIONS
// =============================================================================

type Responder = Box<dyn Fn(&Value) -> TransportResponse + Send + Sync>;

enum Reply {
    Canned(Result<TransportResponse>),
    Computed(Responder),
}

struct Expectation {
    method: HttpMethod,
    url: String,
    reply: Reply,
}

/// One call the mock received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub url: String,
    /// `Value::Null` for GET and DELETE.
    pub body: Value,
}

/// A scripted [`Transport`].
///
/// # Example
/// ```
/// use jsonapi_session::mock::MockTransport;
/// use jsonapi_session::{Session, SessionConfig};
/// use serde_json::json;
///
/// let mock = MockTransport::new();
/// mock.expect_fetch("http://localhost/api/leases/1")
///     .return_ok(json!({"data": {"type": "leases", "id": "1"}}));
///
/// let session = Session::new(SessionConfig::new("http://localhost/api"), mock.transport()).unwrap();
/// let lease = session.get_blocking("leases", "1").unwrap().resource().unwrap();
/// assert_eq!(lease.id().as_deref(), Some("1"));
/// mock.verify();
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The transport to hand to a session.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    /// Expects a GET of `url`.
    pub fn expect_fetch(&self, url: impl Into<String>) -> ExpectationBuilder {
        self.expect_request(HttpMethod::Get, url)
    }

    /// Expects a POST, PATCH or DELETE to `url`.
    pub fn expect_request(&self, method: HttpMethod, url: impl Into<String>) -> ExpectationBuilder {
        ExpectationBuilder {
            method,
            url: url.into(),
            expectations: self.expectations.clone(),
        }
    }

    /// Every call received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Calls received with `method`.
    pub fn requests_with(&self, method: HttpMethod) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    /// Panics unless every expectation was consumed.
    pub fn verify(&self) {
        let remaining = self.expectations.lock();
        if !remaining.is_empty() {
            let pending: Vec<String> = remaining
                .iter()
                .map(|e| format!("{} {}", e.method, e.url))
                .collect();
            panic!(
                "Not all expectations were met. {} remaining: {:?}",
                remaining.len(),
                pending
            );
        }
    }

    fn respond(&self, method: HttpMethod, url: &str, body: &Value) -> Result<TransportResponse> {
        self.requests.lock().push(RecordedRequest {
            method,
            url: url.to_string(),
            body: body.clone(),
        });
        let expectation = {
            let mut expectations = self.expectations.lock();
            let position = expectations
                .iter()
                .position(|e| e.method == method && e.url == url);
            position.and_then(|i| expectations.remove(i))
        };
        match expectation.map(|e| e.reply) {
            Some(Reply::Canned(response)) => response,
            Some(Reply::Computed(responder)) => Ok(responder(body)),
            None => Err(JsonApiError::Transport(format!("unexpected {method} {url}"))),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch_json(&self, url: &str) -> Result<TransportResponse> {
        self.respond(HttpMethod::Get, url, &Value::Null)
    }

    async fn request(&self, method: HttpMethod, url: &str, body: &Value) -> Result<TransportResponse> {
        self.respond(method, url, body)
    }
}

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

/// Completes an expectation with the response to return.
pub struct ExpectationBuilder {
    method: HttpMethod,
    url: String,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl ExpectationBuilder {
    fn push(self, response: Result<TransportResponse>) {
        self.push_reply(Reply::Canned(response));
    }

    fn push_reply(self, reply: Reply) {
        self.expectations.lock().push_back(Expectation {
            method: self.method,
            url: self.url,
            reply,
        });
    }

    /// Responds with the method's usual success status: 200 for GET and PATCH, 201 for
    /// POST, 204 (no body) for DELETE.
    pub fn return_ok(self, body: Value) {
        let response = match self.method {
            HttpMethod::Get | HttpMethod::Patch => TransportResponse::new(200, Some(body)),
            HttpMethod::Post => TransportResponse::new(201, Some(body)),
            HttpMethod::Delete => TransportResponse::new(204, None),
        };
        self.push(Ok(response));
    }

    /// Responds with an explicit status and body.
    pub fn return_status(self, status: u16, body: Value) {
        self.push(Ok(TransportResponse::new(status, Some(body))));
    }

    /// Responds with a status and no body.
    pub fn return_empty(self, status: u16) {
        self.push(Ok(TransportResponse::new(status, None)));
    }

    /// Responds with a status, an optional body and a `Location` header.
    pub fn return_with_location(self, status: u16, body: Option<Value>, location: impl Into<String>) {
        self.push(Ok(TransportResponse::new(status, body).with_location(location)));
    }

    /// Fails the call at the transport level.
    pub fn return_err(self, error: JsonApiError) {
        self.push(Err(error));
    }

    /// Builds the response from the request body, e.g. to echo a POSTed resource back.
    pub fn respond_with<F>(self, responder: F)
    where
        F: Fn(&Value) -> TransportResponse + Send + Sync + 'static,
    {
        self.push_reply(Reply::Computed(Box::new(responder)));
    }
}
