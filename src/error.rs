//! # Session Errors
//!
//! This module defines the error taxonomy shared by every part of the session.
//! By centralizing error definitions, callers can branch on *what* went wrong
//! (a server refusal, a schema violation, a misuse of the execution mode) rather
//! than on message strings.
//!
//! | Category | Variants | Raised by |
//! |----------|----------|-----------|
//! | Server / document | `Document`, `Transport`, `MissingResource` | fetch, commit, document parsing |
//! | Shape | `Validation`, `Relationship` | schema checks, malformed documents |
//! | Misuse | `Mode`, `Type`, `Invalidated`, `FieldNotFound` | session and resource accessors |
//!
//! No error is retried internally. A failed commit leaves the resource dirty and
//! untouched, so the caller may simply commit again.

use serde_json::Value;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, JsonApiError>;

/// Errors that can occur while reading or writing JSON:API resources.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum JsonApiError {
    /// The server answered with an unexpected status, or the document carried an
    /// `errors` member.
    #[error("Document error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Document {
        status: Option<u16>,
        message: String,
        errors: Vec<Value>,
    },

    /// The transport collaborator could not complete the exchange.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Attribute data was rejected by the schema, or a document is structurally invalid.
    #[error("Validation error{}: {}", resource_type.as_ref().map(|t| format!(" ({t})")).unwrap_or_default(), messages.join("; "))]
    Validation {
        resource_type: Option<String>,
        messages: Vec<String>,
    },

    /// A blocking operation was called on a cooperative session, or vice versa.
    #[error("Mode error: {0}")]
    Mode(String),

    /// A relationship value could not be turned into a typed identifier.
    #[error("Type error: {0}")]
    Type(String),

    /// The object was superseded or its session was closed.
    #[error("Access to invalidated {0}")]
    Invalidated(String),

    /// Neither an attribute nor a relationship carries this name.
    #[error("No such field {resource_type}.{name}")]
    FieldNotFound { resource_type: String, name: String },

    /// A relationship operation that its variant does not support.
    #[error("Relationship error: {0}")]
    Relationship(String),

    /// A document expected to hold a primary resource holds none.
    #[error("No resource in document {0}")]
    MissingResource(String),

    #[error("Invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The private runtime backing blocking mode could not be started.
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl JsonApiError {
    pub(crate) fn validation(resource_type: Option<&str>, message: impl Into<String>) -> Self {
        JsonApiError::Validation {
            resource_type: resource_type.map(str::to_string),
            messages: vec![message.into()],
        }
    }

    /// Builds a document error from a server response body.
    pub(crate) fn from_response(status: Option<u16>, prefix: &str, body: Option<&Value>) -> Self {
        let errors = body
            .and_then(|b| b.get("errors"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        JsonApiError::Document {
            status,
            message: format!("{prefix}: {}", error_summary(&errors)),
            errors,
        }
    }

    /// HTTP status attached to the error, when the server supplied one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            JsonApiError::Document { status, .. } => *status,
            _ => None,
        }
    }

    /// Server-supplied error objects, empty for client-side errors.
    pub fn server_errors(&self) -> &[Value] {
        match self {
            JsonApiError::Document { errors, .. } => errors,
            _ => &[],
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, JsonApiError::Document { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, JsonApiError::Validation { .. })
    }

    pub fn is_mode(&self) -> bool {
        matches!(self, JsonApiError::Mode(_))
    }

    pub fn is_invalidated(&self) -> bool {
        matches!(self, JsonApiError::Invalidated(_))
    }
}

/// Best-effort message from a JSON:API `errors` array: each `detail`, else `title`.
pub(crate) fn error_summary(errors: &[Value]) -> String {
    let parts: Vec<&str> = errors
        .iter()
        .filter_map(|e| {
            e.get("detail")
                .and_then(Value::as_str)
                .or_else(|| e.get("title").and_then(Value::as_str))
        })
        .collect();
    if parts.is_empty() {
        "?".to_string()
    } else {
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_prefers_detail_then_title() {
        let errors = vec![
            json!({"detail": "lease not found", "title": "Not Found"}),
            json!({"title": "Gone"}),
            json!({"code": "x"}),
        ];
        assert_eq!(error_summary(&errors), "lease not found; Gone");
        assert_eq!(error_summary(&[]), "?");
    }

    #[test]
    fn test_from_response_keeps_status_and_errors() {
        let body = json!({"errors": [{"detail": "nope", "status": "404"}]});
        let err = JsonApiError::from_response(Some(404), "Error 404", Some(&body));
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.server_errors().len(), 1);
        assert!(err.to_string().contains("nope"));
        assert!(err.is_document());
    }
}
