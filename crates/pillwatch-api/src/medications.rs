//! Handlers for `/users/{id}/medications` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/users/{id}/medications` | Ordered by name |
//! | `POST`   | `/users/{id}/medications` | Body: `{"name":..,"schedule":{..}}` |
//! | `PUT`    | `/users/{id}/medications/{med_id}` | Body: schedule; replaces it |
//! | `DELETE` | `/users/{id}/medications/{med_id}` | 404 if the user does not take it |
//!
//! Schedules are validated while the body is deserialised, so a malformed
//! one is rejected by the extractor before any handler code runs.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use pillwatch_core::{
  medication::UserMedication,
  schedule::MedicationSchedule,
  store::MedicationStore,
  user::UserId,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError, users::require_user};

/// `GET /users/{id}/medications`
pub async fn list<S: MedicationStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<UserId>,
) -> Result<Json<Vec<UserMedication>>, ApiError> {
  require_user(&state, &id).await?;
  let meds = state
    .store
    .list_user_medications(&id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(meds))
}

#[derive(Debug, Deserialize)]
pub struct AddBody {
  pub name:     String,
  pub schedule: MedicationSchedule,
}

/// `POST /users/{id}/medications`
pub async fn add<S: MedicationStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<UserId>,
  Json(body): Json<AddBody>,
) -> Result<impl IntoResponse, ApiError> {
  require_user(&state, &id).await?;
  let medication = state
    .store
    .find_or_create_medication(&body.name)
    .await
    .map_err(ApiError::from_store)?;
  let taken = state
    .store
    .set_schedule(&id, medication.medication_id, body.schedule)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(user_id = %id, medication = %taken.medication.name, "medication added");
  Ok((StatusCode::CREATED, Json(taken)))
}

/// `PUT /users/{id}/medications/{med_id}`
pub async fn replace_schedule<S: MedicationStore>(
  State(state): State<ApiState<S>>,
  Path((id, med_id)): Path<(UserId, Uuid)>,
  Json(schedule): Json<MedicationSchedule>,
) -> Result<Json<UserMedication>, ApiError> {
  let taken = state
    .store
    .set_schedule(&id, med_id, schedule)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(user_id = %id, medication = %taken.medication.name, "schedule replaced");
  Ok(Json(taken))
}

/// `DELETE /users/{id}/medications/{med_id}`
pub async fn remove<S: MedicationStore>(
  State(state): State<ApiState<S>>,
  Path((id, med_id)): Path<(UserId, Uuid)>,
) -> Result<StatusCode, ApiError> {
  if state
    .store
    .remove_medication(&id, med_id)
    .await
    .map_err(ApiError::from_store)?
  {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("user {id} does not take medication {med_id}")))
  }
}
