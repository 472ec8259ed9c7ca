//! # Observability
//!
//! Every network-touching operation runs in a `tracing` span, and sessions log their
//! decisions with structured fields (`resource_type`, `id`, `url`, `status`, `method`).
//!
//! ## Levels
//!
//! | Level | What |
//! |-------|------|
//! | `info` | fetches, commits, deletes, session open/close/invalidate |
//! | `debug` | request payloads, cache hits, identity-map registration decisions |
//! | `warn` | data not declared by the schema, cardinality conflicts, failed requests |
//! | `error` | mode mismatches, documents carrying both `data` and `errors` |
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo test
//! RUST_LOG=jsonapi_session=debug cargo test -- --nocapture
//! ```
//!
//! With `RUST_LOG=debug` a PATCH shows up as:
//!
//! ```text
//! INFO commit: Committing resource resource_type=leases method=PATCH url=http://localhost/api/leases/1
//! DEBUG commit: Sending request method=PATCH url=... payload={"data":{"type":"leases","id":"1",...}}
//! DEBUG commit: Request succeeded method=PATCH url=... status=200
//! ```

/// Installs a compact subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
