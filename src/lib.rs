//! # JSON:API Session
//!
//! > **A cached, mutation-tracking client session for JSON:API servers.**
//!
//! A [`Session`] fetches JSON:API documents, turns every resource object into a shared
//! [`Resource`] handle, and keeps one instance per `(type, id)` for its whole lifetime.
//! Local changes are tracked field by field, so a commit sends only what changed.
//!
//! ## Core Concepts
//!
//! ### Identity map
//! Reading the same resource twice, whether directly, through a relationship or as an
//! included resource, yields the same handle. A resource with local changes is never
//! overwritten by a later read.
//!
//! ### Dirty tracking
//! Attributes live in an [`AttributeTree`](attributes::AttributeTree) whose nodes know
//! their parent; setting a nested value marks every enclosing map dirty. Relationships
//! track their own dirty flag. [`Resource::commit`] POSTs new resources, PATCHes the diff
//! of existing ones and DELETEs those marked for deletion.
//!
//! ### Relationships
//! A relationship is one of four shapes: to-one, to-many, link-only or meta-only
//! ([`relationship::Relationship`]). Targets are resolved lazily through the identity map
//! or the `related` link.
//!
//! ### Execution modes
//! Every network operation is an `async fn`. Sessions built in
//! [`ExecutionMode::Blocking`] additionally drive them to completion through `*_blocking`
//! methods on a private runtime. Using the wrong flavour is a [`JsonApiError::Mode`].
//!
//! ### Schemas
//! With a [`ModelSchema`](schema::ModelSchema) the session shapes attributes (declared
//! properties first, defaults filled in), knows which properties are relationships, and
//! validates attributes before every POST or PATCH.
//!
//! ## Module Tour
//!
//! - [`session`]: identity map, document parsing, transport coordination.
//! - [`resource`] and [`document`]: the handles callers work with.
//! - [`attributes`] and [`relationship`]: per-resource state with dirty tracking.
//! - [`modifier`]: filter, include, sort and sparse fieldset query builders.
//! - [`transport`]: the HTTP seam; [`mock`] is a scripted implementation for tests.
//! - [`schema`], [`config`], [`error`], [`tracing`]: the supporting cast.
//!
//! ## Quick Start
//!
//! ```
//! use jsonapi_session::mock::MockTransport;
//! use jsonapi_session::{CommitOptions, HttpMethod, Session, SessionConfig};
//! use serde_json::json;
//!
//! let mock = MockTransport::new();
//! mock.expect_fetch("http://localhost/api/leases/1").return_ok(json!({
//!     "data": {"type": "leases", "id": "1", "attributes": {"active-status": "pending"}}
//! }));
//! mock.expect_request(HttpMethod::Patch, "http://localhost/api/leases/1").return_ok(json!({
//!     "data": {"type": "leases", "id": "1", "attributes": {"active-status": "active"}}
//! }));
//!
//! let session = Session::new(SessionConfig::new("http://localhost/api"), mock.transport()).unwrap();
//! let lease = session.get_blocking("leases", "1").unwrap().resource().unwrap();
//! lease.set("active_status", json!("active")).unwrap();
//! lease.commit_blocking(CommitOptions::default()).unwrap();
//!
//! assert!(!lease.is_dirty());
//! mock.verify();
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! RUST_LOG=debug cargo test
//! ```

pub mod attributes;
pub mod config;
pub mod document;
pub mod error;
pub mod identifier;
pub mod links;
pub mod mock;
pub mod modifier;
pub mod naming;
pub mod relationship;
pub mod resource;
pub mod schema;
pub mod session;
pub mod tracing;
pub mod transport;

pub use config::{ExecutionMode, SessionConfig};
pub use document::{BlockingPages, Document, Pages};
pub use error::{JsonApiError, Result};
pub use identifier::{RelatedValue, RelationshipValue, ResourceIdentifier};
pub use links::{Link, Links, Meta};
pub use modifier::{ExtraFields, Fields, Filter, FilterOperator, Inclusion, Modifier, Sort};
pub use resource::{CommitOptions, Field, RelationshipRef, Resource};
pub use schema::{ModelSchema, NoSchema, Schema};
pub use session::{FetchOptions, Query, Session};
pub use transport::{HttpMethod, Transport, TransportResponse};
