//! Handlers for `/users` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/users?phone=` | 404 if no user has that phone |
//! | `GET`    | `/users/{id}` | 404 if not found |
//! | `PUT`    | `/users/{id}` | Body: [`UserProfile`]; creates or overwrites |
//! | `DELETE` | `/users/{id}` | Also removes relationships and history |
//! | `GET`    | `/users/{id}/elders` | Elders this caretaker cares for |
//! | `POST`   | `/users/{id}/elders` | Body: `{"elder_id":..}` or `{"phone":..}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use pillwatch_core::{
  store::MedicationStore,
  user::{User, UserId, UserProfile},
};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

// ─── Lookup ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PhoneParams {
  pub phone: Option<String>,
}

/// `GET /users?phone=<phone>`
pub async fn find_by_phone<S: MedicationStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<PhoneParams>,
) -> Result<Json<User>, ApiError> {
  let phone = params
    .phone
    .filter(|p| !p.trim().is_empty())
    .ok_or_else(|| ApiError::BadRequest("missing `phone` query parameter".into()))?;
  let user = state
    .store
    .find_user_by_phone(&phone)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("no user with phone {phone}")))?;
  Ok(Json(user))
}

/// `GET /users/{id}`
pub async fn get_one<S: MedicationStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<UserId>,
) -> Result<Json<User>, ApiError> {
  Ok(Json(require_user(&state, &id).await?))
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// `PUT /users/{id}`
pub async fn upsert<S: MedicationStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<UserId>,
  Json(profile): Json<UserProfile>,
) -> Result<Json<User>, ApiError> {
  let user = state
    .store
    .upsert_user(&id, profile)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(user_id = %id, "user profile saved");
  Ok(Json(user))
}

/// `DELETE /users/{id}`
pub async fn delete_one<S: MedicationStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<UserId>,
) -> Result<StatusCode, ApiError> {
  if state.store.delete_user(&id).await.map_err(ApiError::from_store)? {
    tracing::info!(user_id = %id, "user deleted");
    if let Some(hook) = &state.on_user_deleted {
      hook(&id);
    }
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("user {id} not found")))
  }
}

// ─── Elders ──────────────────────────────────────────────────────────────────

/// `GET /users/{id}/elders`
pub async fn list_elders<S: MedicationStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<UserId>,
) -> Result<Json<Vec<User>>, ApiError> {
  let elders = state
    .store
    .list_elders(&id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(elders))
}

/// Exactly one of the two fields must be set.
#[derive(Debug, Deserialize)]
pub struct AddElderBody {
  pub elder_id: Option<UserId>,
  pub phone:    Option<String>,
}

/// `POST /users/{id}/elders` — responds with the elder.
pub async fn add_elder<S: MedicationStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<UserId>,
  Json(body): Json<AddElderBody>,
) -> Result<impl IntoResponse, ApiError> {
  let elder = match (body.elder_id, body.phone) {
    (Some(elder_id), None) => require_user(&state, &elder_id).await?,
    (None, Some(phone)) => state
      .store
      .find_user_by_phone(&phone)
      .await
      .map_err(ApiError::from_store)?
      .ok_or_else(|| ApiError::NotFound(format!("no user with phone {phone}")))?,
    _ => {
      return Err(ApiError::BadRequest(
        "expected exactly one of `elder_id` or `phone`".into(),
      ));
    }
  };

  state
    .store
    .add_elder(&id, &elder.user_id)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(caretaker = %id, elder = %elder.user_id, "elder added");
  Ok((StatusCode::CREATED, Json(elder)))
}

pub(crate) async fn require_user<S: MedicationStore>(
  state: &ApiState<S>,
  id: &UserId,
) -> Result<User, ApiError> {
  state
    .store
    .get_user(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))
}
