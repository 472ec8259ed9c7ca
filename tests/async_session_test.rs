//! Cooperative-mode scenarios: relationship resolution, pagination, accepted commits.

use futures::TryStreamExt;
use jsonapi_session::mock::MockTransport;
use jsonapi_session::{
    CommitOptions, HttpMethod, Modifier, Query, ResourceIdentifier, Session, SessionConfig,
};
use serde_json::{json, Value};

const API: &str = "http://localhost:8080/api";

fn setup() -> (MockTransport, Session) {
    jsonapi_session::tracing::setup_tracing();
    let mock = MockTransport::new();
    let session = Session::new(SessionConfig::new(API).cooperative(), mock.transport()).unwrap();
    (mock, session)
}

fn page(ids: &[u32], next: Option<String>) -> Value {
    let data: Vec<Value> = ids
        .iter()
        .map(|id| json!({"type": "leases", "id": id.to_string(), "attributes": {"lease-id": id.to_string()}}))
        .collect();
    match next {
        Some(next) => json!({"data": data, "links": {"next": next}}),
        None => json!({"data": data}),
    }
}

#[tokio::test]
async fn test_link_relationship_needs_fetch() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases/1")).return_ok(json!({
        "data": {
            "type": "leases",
            "id": "1",
            "relationships": {
                "lease-items": {"links": {"related": "/api/leases/1/lease-items"}}
            }
        }
    }));
    mock.expect_fetch(format!("{API}/leases/1/lease-items")).return_ok(json!({
        "data": [
            {"type": "lease-items", "id": "i1", "attributes": {"sku": "A-1"}},
            {"type": "lease-items", "id": "i2", "attributes": {"sku": "B-2"}}
        ]
    }));

    let lease = session.get("leases", "1").await.unwrap().resource().unwrap();
    let items = lease.relationship("lease_items").unwrap();
    assert_eq!(items.kind().unwrap(), "link");

    let err = items.resources().unwrap_err();
    assert!(err.is_mode());

    let fetched = items.fetch().await.unwrap();
    assert_eq!(fetched.len(), 2);

    let resolved = items.resources().unwrap();
    assert_eq!(resolved[1].attribute("sku").unwrap(), json!("B-2"));
    assert!(!items.is_single().unwrap());
    assert!(items.document().unwrap().unwrap().is_collection());

    let cached = session
        .cached(&ResourceIdentifier::new("lease-items", "i1"))
        .unwrap();
    assert!(cached.same_instance(&resolved[0]));
    mock.verify();
}

#[tokio::test]
async fn test_iterate_walks_every_page() {
    let (mock, session) = setup();
    let pages = 3u32;
    let per_page = 2u32;
    let first = format!("{API}/leases?page[size]={per_page}");
    for n in 0..pages {
        let url = if n == 0 {
            first.clone()
        } else {
            format!("{API}/leases?page[number]={}&page[size]={per_page}", n + 1)
        };
        let next = (n + 1 < pages)
            .then(|| format!("{API}/leases?page[number]={}&page[size]={per_page}", n + 2));
        let ids: Vec<u32> = (0..per_page).map(|i| n * per_page + i + 1).collect();
        mock.expect_fetch(url).return_ok(page(&ids, next));
    }

    let all = session
        .iterate("leases", Modifier::raw(format!("page[size]={per_page}")))
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    let ids: Vec<String> = all.iter().map(|r| r.id().unwrap()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6"]);
    assert_eq!(mock.requests().len(), pages as usize);
    mock.verify();
}

#[tokio::test]
async fn test_iteration_stops_at_empty_page() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases"))
        .return_ok(page(&[1], Some(format!("{API}/leases?page[number]=2"))));
    mock.expect_fetch(format!("{API}/leases?page[number]=2"))
        .return_ok(page(&[], Some(format!("{API}/leases?page[number]=3"))));

    let stream = session.iterate("leases", Query::All).await.unwrap().into_stream();
    let all: Vec<_> = stream.try_collect().await.unwrap();

    assert_eq!(all.len(), 1);
    mock.verify();
}

#[tokio::test]
async fn test_next_page() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases"))
        .return_ok(page(&[1], Some(format!("{API}/leases?page[number]=2"))));
    mock.expect_fetch(format!("{API}/leases?page[number]=2"))
        .return_ok(page(&[2], None));

    let first = session.get("leases", Query::All).await.unwrap();
    let second = first.next_page().await.unwrap().unwrap();

    assert_eq!(second.resource().unwrap().id().as_deref(), Some("2"));
    assert!(second.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn test_accepted_commit_reads_location() {
    let (mock, session) = setup();
    mock.expect_request(HttpMethod::Post, format!("{API}/leases"))
        .return_with_location(202, None, format!("{API}/jobs/7"));
    mock.expect_fetch(format!("{API}/jobs/7")).return_ok(json!({
        "data": {"type": "jobs", "id": "7", "attributes": {"state": "queued"}}
    }));

    let lease = session.create("leases", [("lease_id", json!("9"))]).unwrap();
    let job = lease.commit(CommitOptions::default()).await.unwrap();

    assert_eq!(job.resource_type(), "jobs");
    assert_eq!(job.attribute("state").unwrap(), json!("queued"));
    assert_eq!(lease.id(), None);
    mock.verify();
}

#[tokio::test]
async fn test_accepted_commit_with_body() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases/1"))
        .return_ok(json!({"data": {"type": "leases", "id": "1", "attributes": {"active-status": "active"}}}));
    mock.expect_request(HttpMethod::Patch, format!("{API}/leases/1")).return_status(
        202,
        json!({"data": {"type": "jobs", "id": "8", "attributes": {"state": "running"}}}),
    );

    let lease = session.get("leases", "1").await.unwrap().resource().unwrap();
    lease.set("active_status", json!("terminated")).unwrap();
    let job = lease.commit(CommitOptions::default()).await.unwrap();

    assert_eq!(job.identifier(), Some(ResourceIdentifier::new("jobs", "8")));
    assert!(!lease.is_dirty());
}

#[tokio::test]
async fn test_async_create_and_commit_all() {
    let (mock, session) = setup();
    mock.expect_request(HttpMethod::Post, format!("{API}/leases"))
        .return_ok(json!({"data": {"type": "leases", "id": "1", "attributes": {"lease-id": "1"}}}));
    mock.expect_request(HttpMethod::Post, format!("{API}/leases"))
        .return_ok(json!({"data": {"type": "leases", "id": "2", "attributes": {"lease-id": "2"}}}));

    let first = session
        .create_and_commit("leases", [("lease_id", json!("1"))])
        .await
        .unwrap();
    assert_eq!(first.id().as_deref(), Some("1"));

    let second = session.create("leases", [("lease_id", json!("2"))]).unwrap();
    session.commit_and_close().await.unwrap();

    assert!(session.is_closed());
    assert!(!second.is_valid());
    mock.verify();
}

#[tokio::test]
async fn test_blocking_call_on_cooperative_session_is_mode_error() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases/1"))
        .return_ok(json!({"data": {"type": "leases", "id": "1"}}));

    assert!(session.get_blocking("leases", "1").unwrap_err().is_mode());

    let lease = session.get("leases", "1").await.unwrap().resource().unwrap();
    assert!(lease.commit_blocking(CommitOptions::default()).unwrap_err().is_mode());
    assert!(lease.refresh_blocking().unwrap_err().is_mode());
}

#[tokio::test]
async fn test_blocking_session_inside_runtime_is_mode_error() {
    let mock = MockTransport::new();
    let session = Session::new(SessionConfig::new(API), mock.transport()).unwrap();

    let err = session.get_blocking("leases", "1").unwrap_err();

    assert!(err.is_mode());
    assert!(mock.requests().is_empty());
    drop(session);
}

#[tokio::test]
async fn test_fetch_by_identifier_options() {
    let (mock, session) = setup();
    let id = ResourceIdentifier::new("leases", "1");
    mock.expect_fetch(format!("{API}/leases/1"))
        .return_ok(json!({"data": {"type": "leases", "id": "1", "attributes": {"v": 1}}}));
    mock.expect_fetch(format!("{API}/leases/1"))
        .return_ok(json!({"data": {"type": "leases", "id": "1", "attributes": {"v": 2}}}));

    let cache_only = jsonapi_session::FetchOptions { cache_only: true, force: false };
    assert!(session.fetch_by_identifier(&id, cache_only).await.unwrap().is_none());

    let first = session
        .fetch_by_identifier(&id, Default::default())
        .await
        .unwrap()
        .unwrap();
    let hit = session.fetch_by_identifier(&id, cache_only).await.unwrap().unwrap();
    assert!(hit.same_instance(&first));

    let forced = jsonapi_session::FetchOptions { cache_only: false, force: true };
    let fresh = session.fetch_by_identifier(&id, forced).await.unwrap().unwrap();

    assert!(!fresh.same_instance(&first));
    assert!(!first.is_valid());
    assert_eq!(fresh.attribute("v").unwrap(), json!(2));
    mock.verify();
}
