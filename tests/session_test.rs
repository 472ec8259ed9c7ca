//! Blocking-mode scenarios run against the scripted transport.

use std::sync::Arc;

use jsonapi_session::mock::MockTransport;
use jsonapi_session::{
    CommitOptions, Field, Filter, HttpMethod, ModelSchema, Query, ResourceIdentifier, Session,
    SessionConfig, TransportResponse,
};
use serde_json::{json, Value};

const API: &str = "http://localhost:8080/api";

fn setup() -> (MockTransport, Session) {
    jsonapi_session::tracing::setup_tracing();
    let mock = MockTransport::new();
    let session = Session::new(SessionConfig::new(API), mock.transport()).unwrap();
    (mock, session)
}

fn lease(id: &str, status: &str) -> Value {
    json!({
        "type": "leases",
        "id": id,
        "attributes": {"lease-id": id, "active-status": status}
    })
}

#[test]
fn test_identity_map_across_documents() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases/1"))
        .return_ok(json!({"data": lease("1", "active")}));
    mock.expect_fetch(format!("{API}/leases"))
        .return_ok(json!({"data": [lease("1", "active"), lease("2", "pending")]}));

    let single = session.get_blocking("leases", "1").unwrap().resource().unwrap();
    let again = session.get_blocking("leases", "1").unwrap().resource().unwrap();
    let collection = session.get_blocking("leases", Query::All).unwrap().resources().unwrap();

    assert!(single.same_instance(&again));
    assert!(single.same_instance(&collection[0]));
    assert_eq!(collection.len(), 2);
    // second GET of leases/1 served from the document cache
    assert_eq!(mock.requests_with(HttpMethod::Get).len(), 2);
    mock.verify();
}

#[test]
fn test_create_and_commit_posts_full_payload() {
    let (mock, session) = setup();
    mock.expect_request(HttpMethod::Post, format!("{API}/leases"))
        .return_ok(json!({"data": lease("1", "pending")}));

    let created = session
        .create("leases", [("lease_id", json!("1")), ("active_status", json!("pending"))])
        .unwrap();
    assert!(created.is_dirty());
    created.commit_blocking(CommitOptions::default()).unwrap();

    let posted = &mock.requests_with(HttpMethod::Post)[0];
    assert_eq!(
        posted.body,
        json!({"data": {
            "type": "leases",
            "attributes": {"lease-id": "1", "active-status": "pending"},
            "relationships": {}
        }})
    );
    assert_eq!(created.id().as_deref(), Some("1"));
    assert!(!created.is_dirty());
    let cached = session.cached(&ResourceIdentifier::new("leases", "1")).unwrap();
    assert!(cached.same_instance(&created));
    assert!(!session.is_dirty());
    mock.verify();
}

#[test]
fn test_created_attributes_survive_server_echo() {
    let (mock, session) = setup();
    mock.expect_request(HttpMethod::Post, format!("{API}/leases"))
        .respond_with(|body| {
            let mut data = body["data"].clone();
            data["id"] = json!("42");
            TransportResponse::new(201, Some(json!({ "data": data })))
        });

    let fields = [
        ("lease_id", json!("42")),
        ("active_status", Value::Null),
        ("valid_for__start_datetime", json!("2026-01-01T00:00:00Z")),
        ("valid_for__end_datetime", Value::Null),
    ];
    let created = session.create("leases", fields.clone()).unwrap();
    created.commit_blocking(CommitOptions::default()).unwrap();

    let posted = &mock.requests_with(HttpMethod::Post)[0];
    assert_eq!(
        posted.body["data"]["attributes"],
        json!({"lease-id": "42", "valid-for": {"start-datetime": "2026-01-01T00:00:00Z"}})
    );
    assert_eq!(created.id().as_deref(), Some("42"));
    for (name, value) in fields.into_iter().filter(|(_, v)| !v.is_null()) {
        assert_eq!(created.attribute(name).unwrap(), value, "{name}");
    }
    assert!(!created.is_dirty());
    mock.verify();
}

#[test]
fn test_patch_sends_only_the_diff() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases/1"))
        .return_ok(json!({"data": lease("1", "active")}));
    mock.expect_request(HttpMethod::Patch, format!("{API}/leases/1"))
        .return_ok(json!({"data": lease("1", "terminated")}));

    let lease = session.get_blocking("leases", "1").unwrap().resource().unwrap();
    assert!(!lease.is_dirty());
    lease.set("active_status", json!("terminated")).unwrap();
    assert!(lease.is_dirty());
    assert_eq!(lease.dirty_fields().unwrap(), vec!["active-status".to_string()]);

    lease.commit_blocking(CommitOptions::default()).unwrap();

    let patched = &mock.requests_with(HttpMethod::Patch)[0];
    assert_eq!(patched.body["data"]["attributes"], json!({"active-status": "terminated"}));
    assert_eq!(patched.body["data"]["id"], json!("1"));
    assert!(!lease.is_dirty());
    assert_eq!(lease.attribute("active-status").unwrap(), json!("terminated"));
    mock.verify();
}

#[test]
fn test_validation_fails_before_any_request() {
    let mock = MockTransport::new();
    let schema = ModelSchema::new(json!({
        "leases": {
            "type": "object",
            "properties": {"lease-id": {"type": "string"}}
        }
    }))
    .unwrap();
    let session = Session::with_schema(SessionConfig::new(API), mock.transport(), Arc::new(schema)).unwrap();

    let lease = session.create("leases", [("lease_id", json!(5))]).unwrap();
    let err = lease.commit_blocking(CommitOptions::default()).unwrap_err();

    assert!(err.is_validation());
    assert!(mock.requests().is_empty());
}

#[test]
fn test_not_found_maps_to_document_error() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases/9")).return_status(
        404,
        json!({"errors": [{"title": "Not Found", "detail": "lease 9 does not exist"}]}),
    );

    let err = session.get_blocking("leases", "9").unwrap_err();

    assert!(err.is_document());
    assert_eq!(err.status_code(), Some(404));
    assert_eq!(err.server_errors().len(), 1);
    assert!(err.to_string().contains("lease 9 does not exist"));
}

#[test]
fn test_malformed_and_error_documents() {
    let (_mock, session) = setup();

    let err = session.read(json!({"meta": {"total": 0}}), "", false).unwrap_err();
    assert!(err.is_validation());

    let err = session
        .read(json!({"data": lease("1", "active"), "errors": [{"title": "Partial"}]}), "", false)
        .unwrap_err();
    assert!(err.is_document());
    assert!(session.cached(&ResourceIdentifier::new("leases", "1")).is_none());

    let empty = session.read(json!({"data": null}), "", false).unwrap();
    assert!(empty.resources().unwrap().is_empty());
    assert!(empty.resource().is_err());
}

#[test]
fn test_delete_detaches_resource() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases/1"))
        .return_ok(json!({"data": lease("1", "active")}));
    mock.expect_request(HttpMethod::Delete, format!("{API}/leases/1"))
        .return_ok(Value::Null);

    let lease = session.get_blocking("leases", "1").unwrap().resource().unwrap();
    lease.delete().unwrap();
    assert!(lease.is_dirty());
    lease.commit_blocking(CommitOptions::default()).unwrap();

    assert!(!lease.is_delete_requested());
    assert!(session.cached(&ResourceIdentifier::new("leases", "1")).is_none());
    assert_eq!(mock.requests_with(HttpMethod::Delete)[0].body, Value::Null);
    mock.verify();
}

#[test]
fn test_refresh_discards_local_changes() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases/1"))
        .return_ok(json!({"data": lease("1", "active")}));
    mock.expect_fetch(format!("{API}/leases/1"))
        .return_ok(json!({"data": lease("1", "expired")}));

    let lease = session.get_blocking("leases", "1").unwrap().resource().unwrap();
    lease.set("active_status", json!("local edit")).unwrap();
    lease.refresh_blocking().unwrap();

    assert_eq!(lease.attribute("active_status").unwrap(), json!("expired"));
    assert!(!lease.is_dirty());
    mock.verify();
}

#[test]
fn test_create_with_nested_fields() {
    let (mock, session) = setup();
    mock.expect_request(HttpMethod::Post, format!("{API}/leases"))
        .return_ok(json!({"data": {"type": "leases", "id": "3"}}));

    let lease = session
        .create_and_commit_blocking(
            "leases",
            [("lease_id", json!("3")), ("valid_for__start_datetime", json!("2020-01-01"))],
        )
        .unwrap();

    let posted = &mock.requests_with(HttpMethod::Post)[0];
    assert_eq!(
        posted.body["data"]["attributes"],
        json!({"lease-id": "3", "valid-for": {"start-datetime": "2020-01-01"}})
    );
    assert_eq!(lease.id().as_deref(), Some("3"));
}

#[test]
fn test_commit_all_commits_every_dirty_resource() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases"))
        .return_ok(json!({"data": [lease("1", "active"), lease("2", "active")]}));
    mock.expect_request(HttpMethod::Patch, format!("{API}/leases/1"))
        .return_ok(json!({"data": lease("1", "expired")}));
    mock.expect_request(HttpMethod::Patch, format!("{API}/leases/2"))
        .return_ok(json!({"data": lease("2", "expired")}));
    mock.expect_request(HttpMethod::Post, format!("{API}/leases"))
        .return_ok(json!({"data": lease("3", "pending")}));

    for lease in session.get_blocking("leases", Query::All).unwrap().resources().unwrap() {
        lease.set("active_status", json!("expired")).unwrap();
    }
    session.create("leases", [("active_status", json!("pending"))]).unwrap();
    assert_eq!(session.dirty_resources().len(), 3);

    session.commit_all_blocking().unwrap();

    assert!(!session.is_dirty());
    mock.verify();
}

#[test]
fn test_included_resources_resolve_relationships() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases/1")).return_ok(json!({
        "data": {
            "type": "leases",
            "id": "1",
            "attributes": {"lease-id": "1"},
            "relationships": {
                "user-account": {"data": {"type": "user-accounts", "id": "u1"}},
                "lease-items": {"data": [{"type": "lease-items", "id": "i1"}]}
            }
        },
        "included": [
            {"type": "user-accounts", "id": "u1", "attributes": {"name": "Jones"}},
            {"type": "lease-items", "id": "i1", "attributes": {"sku": "A-1"}}
        ]
    }));

    let lease = session.get_blocking("leases", "1").unwrap().resource().unwrap();

    let owner = lease.relationship("user_account").unwrap().resource().unwrap().unwrap();
    assert_eq!(owner.attribute("name").unwrap(), json!("Jones"));
    let items = lease.related("lease_items").unwrap();
    assert_eq!(items.len(), 1);
    assert!(matches!(lease.get("user_account").unwrap(), Field::Relationship(_)));
    assert!(matches!(lease.get("lease_id").unwrap(), Field::Attribute(_)));
    // everything came from the included section
    assert_eq!(mock.requests().len(), 1);
    mock.verify();
}

#[test]
fn test_relationship_assignment_is_committed() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases/1")).return_ok(json!({
        "data": {
            "type": "leases",
            "id": "1",
            "relationships": {"user-account": {"data": {"type": "user-accounts", "id": "u1"}}}
        }
    }));
    mock.expect_request(HttpMethod::Patch, format!("{API}/leases/1"))
        .return_ok(json!({"data": null}));

    let lease = session.get_blocking("leases", "1").unwrap().resource().unwrap();
    lease
        .relationship("user_account")
        .unwrap()
        .set(ResourceIdentifier::new("user-accounts", "u2"))
        .unwrap();
    lease.commit_blocking(CommitOptions::default()).unwrap();

    let patched = &mock.requests_with(HttpMethod::Patch)[0];
    assert_eq!(
        patched.body["data"]["relationships"],
        json!({"user-account": {"data": {"id": "u2", "type": "user-accounts"}}})
    );
    assert!(!lease.is_dirty());
}

#[test]
fn test_resource_can_target_itself() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/people/1")).return_ok(json!({
        "data": {
            "type": "people",
            "id": "1",
            "relationships": {
                "best-friend": {"data": null},
                "friends": {"data": []}
            }
        }
    }));
    mock.expect_request(HttpMethod::Patch, format!("{API}/people/1"))
        .return_ok(json!({"data": null}));

    let person = session.get_blocking("people", "1").unwrap().resource().unwrap();
    let best_friend = person.relationship("best_friend").unwrap();
    best_friend.set(&person).unwrap();
    person.relationship("friends").unwrap().add(&person).unwrap();

    assert!(best_friend.resources().unwrap()[0].same_instance(&person));
    person.commit_blocking(CommitOptions::default()).unwrap();

    let patched = &mock.requests_with(HttpMethod::Patch)[0];
    assert_eq!(
        patched.body["data"]["relationships"]["best-friend"],
        json!({"data": {"id": "1", "type": "people"}})
    );
    assert_eq!(
        patched.body["data"]["relationships"]["friends"],
        json!({"data": [{"id": "1", "type": "people"}]})
    );
}

#[test]
fn test_filtered_query_url() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases?filter[active-status]=active"))
        .return_ok(json!({"data": []}));

    let document = session
        .get_blocking("leases", Filter::new().eq("active-status", "active"))
        .unwrap();

    assert!(document.is_collection());
    mock.verify();
}

#[test]
fn test_blocking_pagination() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases")).return_ok(json!({
        "data": [lease("1", "active")],
        "links": {"next": format!("{API}/leases?page[number]=2")}
    }));
    mock.expect_fetch(format!("{API}/leases?page[number]=2"))
        .return_ok(json!({"data": [lease("2", "active")]}));

    let ids: Vec<String> = session
        .iterate_blocking("leases", Query::All)
        .unwrap()
        .map(|r| r.unwrap().id().unwrap())
        .collect();

    assert_eq!(ids, vec!["1", "2"]);
    mock.verify();
}

#[test]
fn test_close_rejects_further_use() {
    let (mock, session) = setup();
    mock.expect_fetch(format!("{API}/leases/1"))
        .return_ok(json!({"data": lease("1", "active")}));
    let lease = session.get_blocking("leases", "1").unwrap().resource().unwrap();

    session.close();

    assert!(lease.attribute("lease-id").unwrap_err().is_invalidated());
    assert!(session.get_blocking("leases", "1").unwrap_err().is_invalidated());
}

#[test]
fn test_async_call_on_blocking_session_is_mode_error() {
    let (_mock, session) = setup();
    let err = futures::executor::block_on(session.get("leases", "1")).unwrap_err();
    assert!(err.is_mode());
}
