//! Evaluated schedules and adherence history.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users/{id}/schedule[?date=YYYY-MM-DD]` | Doses due that day; default today |
//! | `GET`  | `/users/{id}/history[?date=YYYY-MM-DD]` | Status events; all dates if omitted |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::NaiveDate;
use pillwatch_core::{
  evaluator::{ScheduledDose, doses_for_date},
  status::MedicationStatusEvent,
  store::MedicationStore,
  user::UserId,
};
use serde::{Deserialize, Serialize};

use crate::{ApiState, error::ApiError, users::require_user};

#[derive(Debug, Deserialize)]
pub struct DateParams {
  pub date: Option<NaiveDate>,
}

/// One user's doses for one day, in time order.
#[derive(Debug, Serialize, Deserialize)]
pub struct DaySchedule {
  pub user_id: UserId,
  pub date:    NaiveDate,
  pub doses:   Vec<ScheduledDose>,
}

/// `GET /users/{id}/schedule[?date=]`
///
/// Works the same for a caretaker looking at an elder: pass the elder's id.
pub async fn for_date<S: MedicationStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<UserId>,
  Query(params): Query<DateParams>,
) -> Result<Json<DaySchedule>, ApiError> {
  require_user(&state, &id).await?;
  let date = params.date.unwrap_or_else(|| state.clock.today());
  let meds = state
    .store
    .list_user_medications(&id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(DaySchedule {
    doses: doses_for_date(&meds, date),
    user_id: id,
    date,
  }))
}

/// `GET /users/{id}/history[?date=]`
pub async fn history<S: MedicationStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<UserId>,
  Query(params): Query<DateParams>,
) -> Result<Json<Vec<MedicationStatusEvent>>, ApiError> {
  require_user(&state, &id).await?;
  let events = state
    .store
    .list_status_events(&id, params.date)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(events))
}
