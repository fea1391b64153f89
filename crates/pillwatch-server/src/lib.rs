//! HTTP server for Pillwatch.
//!
//! Serves the JSON API under `/api`, the identity-provider hook, and the
//! notification session endpoints, all behind the operator's Basic-auth
//! credential. `/health` is open.

pub mod auth;
pub mod error;
pub mod identity;
pub mod notifier;
pub mod session;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Json, Router,
  extract::{FromRef, Path, State},
  http::StatusCode,
  middleware,
  response::IntoResponse,
  routing::{get, post},
};
use chrono::TimeDelta;
use chrono_tz::Tz;
use pillwatch_api::ApiError;
use pillwatch_core::{
  clock::{Clock, LocalClock},
  notify::Notifier,
  schedule::ClockTime,
  scheduler::SchedulerConfig,
  store::MedicationStore,
  user::UserId,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, Authenticated};
use identity::IdentityEvent;
use notifier::NotifierSettings;
use session::{SessionRegistry, SessionStatus};

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 5232 }

/// Runtime server configuration, deserialised from `config.toml` and
/// `PILLWATCH_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  pub store_path:         PathBuf,
  pub auth_username:      String,
  pub auth_password_hash: String,
  #[serde(default)]
  pub scheduler:          SchedulerSettings,
  #[serde(default)]
  pub notifier:           NotifierSettings,
}

/// The `[scheduler]` config table.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerSettings {
  pub check_interval_secs:     u64,
  pub reminder_threshold_mins: i64,
  pub grace_period_mins:       i64,
  pub catch_up_hours:          i64,
  /// IANA zone for local time; the host's zone when unset.
  pub timezone:                Option<Tz>,
}

impl Default for SchedulerSettings {
  fn default() -> Self {
    Self {
      check_interval_secs:     60,
      reminder_threshold_mins: 5,
      grace_period_mins:       1,
      catch_up_hours:          24,
      timezone:                None,
    }
  }
}

impl SchedulerSettings {
  pub fn scheduler_config(&self) -> Result<SchedulerConfig> {
    if self.check_interval_secs == 0 {
      return Err(Error::Config("scheduler.check_interval_secs must be positive".into()));
    }
    if self.reminder_threshold_mins < 0 || self.grace_period_mins < 0 || self.catch_up_hours < 0 {
      return Err(Error::Config("scheduler durations must not be negative".into()));
    }
    Ok(SchedulerConfig {
      check_interval:     Duration::from_secs(self.check_interval_secs),
      reminder_threshold: TimeDelta::minutes(self.reminder_threshold_mins),
      grace_period:       TimeDelta::minutes(self.grace_period_mins),
      catch_up:           TimeDelta::hours(self.catch_up_hours),
    })
  }

  pub fn clock(&self) -> LocalClock {
    match self.timezone {
      Some(tz) => LocalClock::Zone(tz),
      None => LocalClock::System,
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, N> {
  pub store:    Arc<S>,
  pub auth:     Arc<AuthConfig>,
  pub sessions: Arc<SessionRegistry<S, N>>,
  pub clock:    Arc<dyn Clock>,
}

impl<S, N> Clone for AppState<S, N> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      auth:     self.auth.clone(),
      sessions: self.sessions.clone(),
      clock:    self.clock.clone(),
    }
  }
}

impl<S, N> FromRef<AppState<S, N>> for Arc<AuthConfig> {
  fn from_ref(state: &AppState<S, N>) -> Self { state.auth.clone() }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full axum [`Router`] for the server.
pub fn router<S, N>(state: AppState<S, N>) -> Router
where
  S: MedicationStore + 'static,
  N: Notifier + 'static,
{
  let sessions = state.sessions.clone();
  let api = pillwatch_api::api_router_with_delete_hook(
    state.store.clone(),
    state.clock.clone(),
    Arc::new(move |id: &UserId| {
      sessions.forget(id);
    }),
  )
  .layer(middleware::from_fn_with_state(state.auth.clone(), auth::require_auth));

  Router::new()
    .route("/health", get(health::<S, N>))
    .route("/hooks/identity", post(identity_hook::<S, N>))
    .route(
      "/sessions/{id}",
      get(session_status::<S, N>)
        .put(session_start::<S, N>)
        .delete(session_stop::<S, N>),
    )
    .route("/sessions/{id}/taken", post(session_taken::<S, N>))
    .with_state(state)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// `GET /health` — unauthenticated.
async fn health<S, N>(State(state): State<AppState<S, N>>) -> impl IntoResponse
where
  S: MedicationStore + 'static,
  N: Notifier + 'static,
{
  Json(json!({ "status": "ok", "sessions": state.sessions.active_count() }))
}

/// `POST /hooks/identity`
async fn identity_hook<S, N>(
  _auth: Authenticated,
  State(state): State<AppState<S, N>>,
  Json(event): Json<IdentityEvent>,
) -> Result<impl IntoResponse>
where
  S: MedicationStore + 'static,
  N: Notifier + 'static,
{
  let outcome = identity::apply(state.store.as_ref(), &event)
    .await
    .map_err(ApiError::from_store)?;
  if outcome == identity::HookOutcome::Deleted {
    state.sessions.forget(&event.data.id);
  }
  Ok(Json(json!({ "outcome": outcome })))
}

async fn require_user<S: MedicationStore>(store: &S, id: &UserId) -> Result<()> {
  store
    .get_user(id)
    .await
    .map_err(ApiError::from_store)?
    .map(|_| ())
    .ok_or_else(|| Error::NotFound(format!("user {id} not found")))
}

/// `GET /sessions/{id}`
async fn session_status<S, N>(
  _auth: Authenticated,
  State(state): State<AppState<S, N>>,
  Path(id): Path<UserId>,
) -> Result<Json<SessionStatus>>
where
  S: MedicationStore + 'static,
  N: Notifier + 'static,
{
  require_user(state.store.as_ref(), &id).await?;
  Ok(Json(state.sessions.status(&id)))
}

/// `PUT /sessions/{id}` — enable notifications (restarting any session).
async fn session_start<S, N>(
  _auth: Authenticated,
  State(state): State<AppState<S, N>>,
  Path(id): Path<UserId>,
) -> Result<Json<SessionStatus>>
where
  S: MedicationStore + 'static,
  N: Notifier + 'static,
{
  require_user(state.store.as_ref(), &id).await?;
  Ok(Json(state.sessions.start(&id)))
}

/// `DELETE /sessions/{id}` — disable notifications.
async fn session_stop<S, N>(
  _auth: Authenticated,
  State(state): State<AppState<S, N>>,
  Path(id): Path<UserId>,
) -> Result<StatusCode>
where
  S: MedicationStore + 'static,
  N: Notifier + 'static,
{
  if state.sessions.stop(&id) {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(Error::NotFound(format!("no active session for {id}")))
  }
}

#[derive(Debug, Deserialize)]
pub struct TakenBody {
  pub medication_name: String,
  pub time:            ClockTime,
}

/// `POST /sessions/{id}/taken` — relay of a "marked taken" reminder click.
///
/// The named medication must be on the user's schedule at `time`.
async fn session_taken<S, N>(
  _auth: Authenticated,
  State(state): State<AppState<S, N>>,
  Path(id): Path<UserId>,
  Json(body): Json<TakenBody>,
) -> Result<impl IntoResponse>
where
  S: MedicationStore + 'static,
  N: Notifier + 'static,
{
  require_user(state.store.as_ref(), &id).await?;
  if body.medication_name.trim().is_empty() {
    return Err(Error::BadRequest("medication_name is empty".into()));
  }
  let medications = state
    .store
    .list_user_medications(&id)
    .await
    .map_err(ApiError::from_store)?;
  let scheduled = medications.iter().any(|m| {
    m.medication.name == body.medication_name && m.schedule.times().contains(&body.time)
  });
  if !scheduled {
    return Err(Error::NotFound(format!(
      "{id} has no {} dose at {}",
      body.medication_name, body.time
    )));
  }
  let record = state.sessions.mark_taken(&id, &body.medication_name, body.time);
  Ok((StatusCode::CREATED, Json(record)))
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use chrono::NaiveDate;
  use pillwatch_core::clock::ManualClock;
  use pillwatch_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use serde_json::Value;
  use tower::ServiceExt as _;

  use super::*;
  use crate::notifier::LogNotifier;

  type TestState = AppState<SqliteStore, LogNotifier>;

  async fn make_state(password: &str) -> TestState {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    let now = NaiveDate::from_ymd_opt(2024, 5, 15)
      .unwrap()
      .and_hms_opt(7, 0, 0)
      .unwrap();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(now));

    AppState {
      sessions: Arc::new(SessionRegistry::new(
        store.clone(),
        Arc::new(LogNotifier),
        clock.clone(),
        SchedulerConfig::default(),
      )),
      store,
      auth: Arc::new(AuthConfig {
        username:      "operator".to_string(),
        password_hash: hash,
      }),
      clock,
    }
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn call(
    state: &TestState,
    method: &str,
    uri: &str,
    authed: bool,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if authed {
      builder = builder.header(header::AUTHORIZATION, auth_header("operator", "secret"));
    }
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let resp = router(state.clone())
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
  }

  async fn created_user(state: &TestState) {
    let hook = json!({
      "type": "user.created",
      "data": { "id": "user_1", "first_name": "Ada", "email_addresses": [], "phone_numbers": [] }
    });
    let (status, body) = call(state, "POST", "/hooks/identity", true, Some(hook)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "upserted");
  }

  /// `user_1` takes DrugX daily at 08:00.
  async fn scheduled_drug_x(state: &TestState) {
    let drug = json!({
      "name": "DrugX",
      "schedule": { "times": ["08:00"], "pills_per_dose": [1], "days": ["Everyday"] }
    });
    let (status, _) = call(state, "POST", "/api/users/user_1/medications", true, Some(drug)).await;
    assert_eq!(status, StatusCode::CREATED);
  }

  #[tokio::test]
  async fn health_is_open() {
    let state = make_state("secret").await;
    let (status, body) = call(&state, "GET", "/health", false, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
  }

  #[tokio::test]
  async fn api_requires_auth() {
    let state = make_state("secret").await;
    let (status, _) = call(&state, "GET", "/api/users/user_1", false, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&state, "GET", "/api/users/user_1", true, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn identity_hook_creates_api_visible_user() {
    let state = make_state("secret").await;
    let (status, _) = call(&state, "POST", "/hooks/identity", false, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    created_user(&state).await;
    let (status, body) = call(&state, "GET", "/api/users/user_1", true, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Ada");
  }

  #[tokio::test]
  async fn session_lifecycle() {
    let state = make_state("secret").await;
    let (status, _) = call(&state, "PUT", "/sessions/ghost", true, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    created_user(&state).await;
    scheduled_drug_x(&state).await;
    let (status, body) = call(&state, "PUT", "/sessions/user_1", true, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], true);
    assert_eq!(body["check_interval_secs"], 60);

    let taken = json!({ "medication_name": "DrugX", "time": "08:00" });
    let (status, _) = call(&state, "POST", "/sessions/user_1/taken", true, Some(taken)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = call(&state, "GET", "/sessions/user_1", true, None).await;
    assert_eq!(body["taken"][0]["medication_name"], "DrugX");
    assert_eq!(body["taken"][0]["time"], "08:00");

    let (status, _) = call(&state, "DELETE", "/sessions/user_1", true, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&state, "DELETE", "/sessions/user_1", true, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn taken_relay_rejects_bad_time() {
    let state = make_state("secret").await;
    created_user(&state).await;
    let taken = json!({ "medication_name": "DrugX", "time": "8am" });
    let (status, _) = call(&state, "POST", "/sessions/user_1/taken", true, Some(taken)).await;
    assert!(status.is_client_error());
  }

  #[tokio::test]
  async fn taken_relay_rejects_unscheduled_doses() {
    let state = make_state("secret").await;
    created_user(&state).await;
    scheduled_drug_x(&state).await;

    for taken in [
      json!({ "medication_name": "DrugY", "time": "08:00" }),
      json!({ "medication_name": "DrugX", "time": "09:00" }),
    ] {
      let (status, _) = call(&state, "POST", "/sessions/user_1/taken", true, Some(taken)).await;
      assert_eq!(status, StatusCode::NOT_FOUND);
    }
    let (_, body) = call(&state, "GET", "/sessions/user_1", true, None).await;
    assert_eq!(body["taken"], json!([]));
  }

  #[tokio::test]
  async fn deleting_identity_stops_session() {
    let state = make_state("secret").await;
    created_user(&state).await;
    scheduled_drug_x(&state).await;
    call(&state, "PUT", "/sessions/user_1", true, None).await;
    let taken = json!({ "medication_name": "DrugX", "time": "08:00" });
    call(&state, "POST", "/sessions/user_1/taken", true, Some(taken)).await;
    assert!(state.sessions.is_active(&"user_1".into()));

    let hook = json!({ "type": "user.deleted", "data": { "id": "user_1" } });
    let (_, body) = call(&state, "POST", "/hooks/identity", true, Some(hook)).await;
    assert_eq!(body["outcome"], "deleted");
    assert!(!state.sessions.is_active(&"user_1".into()));

    // A user re-created under the same id starts with a clean log.
    created_user(&state).await;
    let (_, body) = call(&state, "GET", "/sessions/user_1", true, None).await;
    assert_eq!(body["taken"], json!([]));
  }

  #[tokio::test]
  async fn deleting_user_through_api_stops_session() {
    let state = make_state("secret").await;
    created_user(&state).await;
    scheduled_drug_x(&state).await;
    call(&state, "PUT", "/sessions/user_1", true, None).await;
    let taken = json!({ "medication_name": "DrugX", "time": "08:00" });
    call(&state, "POST", "/sessions/user_1/taken", true, Some(taken)).await;

    let (status, _) = call(&state, "DELETE", "/api/users/user_1", true, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!state.sessions.is_active(&"user_1".into()));
    assert!(state.sessions.status(&"user_1".into()).taken.is_empty());
  }

  #[test]
  fn scheduler_settings_convert_and_validate() {
    let settings = SchedulerSettings::default();
    assert_eq!(settings.scheduler_config().unwrap(), SchedulerConfig::default());

    let zero = SchedulerSettings {
      check_interval_secs: 0,
      ..SchedulerSettings::default()
    };
    assert!(zero.scheduler_config().is_err());
  }

  #[test]
  fn config_defaults_fill_optional_tables() {
    let cfg: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str(
        r#"
          store_path = "~/pillwatch.db"
          auth_username = "operator"
          auth_password_hash = "x"

          [scheduler]
          grace_period_mins = 2
          timezone = "America/New_York"
        "#,
        config::FileFormat::Toml,
      ))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.port, 5232);
    assert_eq!(cfg.scheduler.grace_period_mins, 2);
    assert_eq!(cfg.scheduler.check_interval_secs, 60);
    assert_eq!(cfg.scheduler.timezone, Some(chrono_tz::America::New_York));
    assert_eq!(cfg.notifier.kind, notifier::NotifierKind::Log);
  }
}
