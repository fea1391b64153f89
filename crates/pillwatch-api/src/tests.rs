//! Router tests driven through `tower::ServiceExt::oneshot` against an
//! in-memory SQLite store.

use std::sync::{Arc, Mutex};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use chrono::NaiveDate;
use pillwatch_core::{clock::ManualClock, user::UserId};
use pillwatch_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{api_router, api_router_with_delete_hook};

/// Wednesday 2024-05-15, 07:00.
fn clock() -> Arc<ManualClock> {
  let now = NaiveDate::from_ymd_opt(2024, 5, 15)
    .unwrap()
    .and_hms_opt(7, 0, 0)
    .unwrap();
  Arc::new(ManualClock::new(now))
}

async fn app() -> Router {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  api_router(store, clock())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  let resp = app
    .clone()
    .oneshot(builder.body(body).unwrap())
    .await
    .unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let json = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
  };
  (status, json)
}

async fn create_user(app: &Router, id: &str, role: &str, phone: &str) {
  let (status, _) = send(
    app,
    "PUT",
    &format!("/users/{id}"),
    Some(json!({ "first_name": id, "phone": phone, "role": role })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
}

fn lisinopril() -> Value {
  json!({
    "name": "Lisinopril",
    "schedule": { "times": ["08:00", "20:00"], "pills_per_dose": [1, 1], "days": ["M", "W", "F"] }
  })
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn user_round_trip() {
  let app = app().await;
  create_user(&app, "user_1", "elder", "555-0100").await;

  let (status, body) = send(&app, "GET", "/users/user_1", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["role"], "elder");

  let (status, body) = send(&app, "GET", "/users?phone=555-0100", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["user_id"], "user_1");

  let (status, _) = send(&app, "DELETE", "/users/user_1", None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, body) = send(&app, "GET", "/users/user_1", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn delete_hook_sees_only_removed_users() {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let deleted = Arc::new(Mutex::new(Vec::<UserId>::new()));
  let seen = deleted.clone();
  let app = api_router_with_delete_hook(
    store,
    clock(),
    Arc::new(move |id: &UserId| seen.lock().unwrap().push(id.clone())),
  );
  create_user(&app, "user_1", "elder", "").await;

  let (status, _) = send(&app, "DELETE", "/users/ghost", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (status, _) = send(&app, "DELETE", "/users/user_1", None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  assert_eq!(*deleted.lock().unwrap(), vec![UserId::from("user_1")]);
}

#[tokio::test]
async fn phone_lookup_requires_parameter() {
  let app = app().await;
  let (status, _) = send(&app, "GET", "/users", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ─── Elders ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn caretaker_adds_elder_by_phone() {
  let app = app().await;
  create_user(&app, "carer", "caretaker", "").await;
  create_user(&app, "elder", "elder", "555-0101").await;

  let (status, body) = send(
    &app,
    "POST",
    "/users/carer/elders",
    Some(json!({ "phone": "555-0101" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["user_id"], "elder");

  let (_, body) = send(&app, "GET", "/users/carer/elders", None).await;
  assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn elder_cannot_add_elders() {
  let app = app().await;
  create_user(&app, "a", "elder", "").await;
  create_user(&app, "b", "elder", "").await;

  let (status, _) = send(&app, "POST", "/users/a/elders", Some(json!({ "elder_id": "b" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = send(&app, "POST", "/users/a/elders", Some(json!({}))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ─── Medications and schedule ────────────────────────────────────────────────

#[tokio::test]
async fn schedule_reflects_weekday_pattern() {
  let app = app().await;
  create_user(&app, "user_1", "elder", "").await;
  let (status, _) = send(&app, "POST", "/users/user_1/medications", Some(lisinopril())).await;
  assert_eq!(status, StatusCode::CREATED);

  // Default date is the clock's today, a Wednesday.
  let (status, body) = send(&app, "GET", "/users/user_1/schedule", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["date"], "2024-05-15");
  let doses = body["doses"].as_array().unwrap();
  assert_eq!(doses.len(), 2);
  assert_eq!(doses[0]["time"], "08:00");
  assert_eq!(doses[1]["time"], "20:00");

  let (_, body) = send(&app, "GET", "/users/user_1/schedule?date=2024-05-14", None).await;
  assert!(body["doses"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_schedule_is_rejected() {
  let app = app().await;
  create_user(&app, "user_1", "elder", "").await;
  let body = json!({
    "name": "DrugX",
    "schedule": { "times": ["08:00", "20:00"], "pills_per_dose": [1], "days": ["Everyday"] }
  });
  let (status, _) = send(&app, "POST", "/users/user_1/medications", Some(body)).await;
  assert!(status.is_client_error());

  let (_, meds) = send(&app, "GET", "/users/user_1/medications", None).await;
  assert!(meds.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn replace_and_remove_medication() {
  let app = app().await;
  create_user(&app, "user_1", "elder", "").await;
  let (_, added) = send(&app, "POST", "/users/user_1/medications", Some(lisinopril())).await;
  let med_id = added["medication"]["medication_id"].as_str().unwrap().to_owned();
  let uri = format!("/users/user_1/medications/{med_id}");

  let daily = json!({ "times": ["09:00"], "pills_per_dose": [2], "days": ["Everyday"] });
  let (status, body) = send(&app, "PUT", &uri, Some(daily)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["schedule"]["pills_per_dose"], json!([2]));

  let (status, _) = send(&app, "DELETE", &uri, None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = send(&app, "DELETE", &uri, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_user_routes_return_404() {
  let app = app().await;
  for uri in [
    "/users/ghost/medications",
    "/users/ghost/schedule",
    "/users/ghost/history",
    "/users/ghost/elders",
  ] {
    let (status, _) = send(&app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
  }
}

#[tokio::test]
async fn history_starts_empty() {
  let app = app().await;
  create_user(&app, "user_1", "elder", "").await;
  let (status, body) = send(&app, "GET", "/users/user_1/history?date=2024-05-15", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([]));
}
