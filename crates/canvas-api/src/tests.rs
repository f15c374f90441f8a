//! Router tests against an in-memory `SqliteStore`.

use std::sync::Arc;

use axum::{
  Router,
  body::{Body, to_bytes},
  http::{Request, StatusCode},
};
use canvas_core::{
  access::{Permission, PermissionSet},
  resource::{Document, NewResource, Payload, ResourceKind},
  store::RecordStore,
  user::{NewUser, Role},
};
use canvas_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{api_router, caller::CALLER_HEADER};

async fn setup() -> (Arc<SqliteStore>, Router) {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  for id in ["alice", "bob"] {
    store
      .create_user(
        NewUser::new(id, format!("{id}@example.com"), Role::User).with_id(id),
        Some("admin"),
      )
      .await
      .unwrap();
  }
  let router = api_router(store.clone());
  (store, router)
}

async fn send(
  router: &Router,
  method: &str,
  uri: &str,
  caller: Option<&str>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(caller) = caller {
    builder = builder.header(CALLER_HEADER, caller);
  }
  let body = match body {
    Some(json) => {
      builder = builder.header("content-type", "application/json");
      Body::from(json.to_string())
    }
    None => Body::empty(),
  };

  let resp = router
    .clone()
    .oneshot(builder.body(body).unwrap())
    .await
    .unwrap();
  let status = resp.status();
  let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let json = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, json)
}

async fn save_doc(store: &SqliteStore, id: &str, title: &str, owner: &str) {
  let payload = Payload::Document(Document {
    title:     title.into(),
    content:   String::new(),
    mime_type: "text/markdown".into(),
    tags:      vec![],
  });
  store.save(NewResource::with_id(id, payload), owner).await.unwrap();
}

// ─── Caller ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_caller_is_unauthorized() {
  let (_, router) = setup().await;
  let (status, body) = send(&router, "GET", "/resources/document", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert!(body["error"].as_str().unwrap().contains("x-user-id"));
}

#[tokio::test]
async fn unknown_caller_is_unauthorized() {
  let (store, router) = setup().await;
  save_doc(&store, "doc-1", "Plan", "alice").await;

  let (status, _) =
    send(&router, "GET", "/resources/document/doc-1", Some("mallory"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, _) = send(&router, "GET", "/activity", Some("mallory"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ─── Users ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn only_admins_create_users() {
  let (_, router) = setup().await;
  let carol = json!({ "username": "carol", "email": "carol@example.com" });

  let (status, _) =
    send(&router, "POST", "/users", Some("alice"), Some(carol.clone())).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, body) =
    send(&router, "POST", "/users", Some("admin"), Some(carol.clone())).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["username"], "carol");
  assert_eq!(body["role"], "user");

  let (status, _) = send(&router, "POST", "/users", Some("admin"), Some(carol)).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (_, log) = send(&router, "GET", "/activity?limit=1", Some("admin"), None).await;
  assert_eq!(log[0]["action"], "user_created");
  assert_eq!(log[0]["details"]["username"], "carol");

  let id = body["id"].as_str().unwrap();
  let (status, fetched) =
    send(&router, "GET", &format!("/users/{id}"), Some("alice"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(fetched["email"], "carol@example.com");

  let (status, _) = send(&router, "GET", "/users/nobody", Some("alice"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Resources ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn save_then_get_own_resource() {
  let (_, router) = setup().await;

  let (status, saved) = send(
    &router,
    "POST",
    "/resources/rdf_entity",
    Some("alice"),
    Some(json!({ "id": "e1", "data": { "entity_type": "person", "label": "Ada" } })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(saved["kind"], "rdf_entity");
  assert_eq!(saved["owner_id"], "alice");
  assert_eq!(saved["data"]["label"], "Ada");

  let (status, fetched) =
    send(&router, "GET", "/resources/rdf_entity/e1", Some("alice"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(fetched, saved);
}

#[tokio::test]
async fn boundary_rejects_unknown_kind_and_malformed_payload() {
  let (store, router) = setup().await;

  let (status, _) = send(
    &router,
    "POST",
    "/resources/spreadsheet",
    Some("alice"),
    Some(json!({ "data": {} })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = send(
    &router,
    "POST",
    "/resources/agent_config",
    Some("alice"),
    Some(json!({ "data": { "name": "helper", "model": "m", "temperature": 7.5 } })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = send(
    &router,
    "POST",
    "/resources/document",
    Some("alice"),
    Some(json!({ "data": { "title": "x", "colour": "red" } })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let log = store.recent_activity("alice", 10).await.unwrap();
  assert!(log.iter().all(|e| !e.action.ends_with("_saved")));
}

#[tokio::test]
async fn permission_denied_and_not_found_map_to_distinct_statuses() {
  let (store, router) = setup().await;
  save_doc(&store, "doc-1", "Plan", "alice").await;

  let (status, body) =
    send(&router, "GET", "/resources/document/doc-1", Some("bob"), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert!(body["error"].is_string());

  let (status, _) =
    send(&router, "GET", "/resources/document/nope", Some("bob"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sharing_over_http() {
  let (store, router) = setup().await;
  save_doc(&store, "doc-1", "Plan", "alice").await;

  let (status, entry) = send(
    &router,
    "PUT",
    "/resources/document/doc-1/acl",
    Some("alice"),
    Some(json!({ "user_id": "bob", "permissions": ["read"] })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(entry["permissions"], json!(["read"]));

  let (status, _) =
    send(&router, "GET", "/resources/document/doc-1", Some("bob"), None).await;
  assert_eq!(status, StatusCode::OK);

  let (status, _) =
    send(&router, "DELETE", "/resources/document/doc-1", Some("bob"), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, entries) =
    send(&router, "GET", "/resources/document/doc-1/acl", Some("bob"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(entries.as_array().unwrap().len(), 1);

  let (status, _) = send(
    &router,
    "PUT",
    "/resources/document/doc-1/acl",
    Some("alice"),
    Some(json!({ "user_id": "bob", "permissions": ["admin"] })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) =
    send(&router, "DELETE", "/resources/document/doc-1", Some("alice"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn list_is_scoped_to_the_caller() {
  let (store, router) = setup().await;
  save_doc(&store, "a1", "Alpha", "alice").await;
  save_doc(&store, "b1", "Beta", "bob").await;
  store
    .set_permissions(
      ResourceKind::Document,
      "a1",
      "bob",
      PermissionSet::from([Permission::Read]),
      "alice",
    )
    .await
    .unwrap();

  let (status, body) =
    send(&router, "GET", "/resources/document", Some("bob"), None).await;
  assert_eq!(status, StatusCode::OK);
  let ids: Vec<&str> = body
    .as_array()
    .unwrap()
    .iter()
    .map(|r| r["id"].as_str().unwrap())
    .collect();
  assert_eq!(ids, vec!["b1"]);
}

// ─── Activity & search ────────────────────────────────────────────────────────

#[tokio::test]
async fn activity_lists_the_callers_entries() {
  let (store, router) = setup().await;
  save_doc(&store, "doc-1", "Plan", "alice").await;

  let (status, body) = send(&router, "GET", "/activity?limit=1", Some("alice"), None).await;
  assert_eq!(status, StatusCode::OK);
  let entries = body.as_array().unwrap();
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0]["action"], "document_saved");
  assert_eq!(entries[0]["resource_id"], "doc-1");
}

#[tokio::test]
async fn search_filters_by_read_access() {
  let (store, router) = setup().await;
  save_doc(&store, "mine", "Quarterly plan", "bob").await;
  save_doc(&store, "theirs", "Secret plan", "alice").await;

  let (status, body) =
    send(&router, "GET", "/search?q=PLAN&kinds=document", Some("bob"), None).await;
  assert_eq!(status, StatusCode::OK);
  let hits = body.as_array().unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0]["id"], "mine");

  let (status, body) =
    send(&router, "GET", "/search?q=plan&kinds=document,document", Some("bob"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body.as_array().unwrap().len(), 1);

  let (status, body) =
    send(&router, "GET", "/search?q=plan&limit=0", Some("bob"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert!(body.as_array().unwrap().is_empty());

  let (status, _) =
    send(&router, "GET", "/search?q=plan&kinds=agent_config", Some("bob"), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) =
    send(&router, "GET", "/search?q=plan&kinds=bogus", Some("bob"), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}
