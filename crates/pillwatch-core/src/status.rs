//! Medication status events — the persisted TOOK_MEDICATION outcomes.
//!
//! Events are append-only. The store assigns `event_id` and `recorded_at`
//! and refuses a second event for the same user, medication, date and slot.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{schedule::ClockTime, user::UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseStatus {
  Taken,
  Missed,
}

impl DoseStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      DoseStatus::Taken => "taken",
      DoseStatus::Missed => "missed",
    }
  }
}

/// Input to [`crate::store::MedicationStore::record_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStatusEvent {
  pub user_id:        UserId,
  pub medication_id:  Uuid,
  pub date:           NaiveDate,
  pub scheduled_time: ClockTime,
  /// `None` for missed doses.
  pub actual_time:    Option<ClockTime>,
  pub status:         DoseStatus,
}

impl NewStatusEvent {
  pub fn taken(
    user_id: UserId,
    medication_id: Uuid,
    date: NaiveDate,
    scheduled_time: ClockTime,
    actual_time: ClockTime,
  ) -> Self {
    Self {
      user_id,
      medication_id,
      date,
      scheduled_time,
      actual_time: Some(actual_time),
      status: DoseStatus::Taken,
    }
  }

  pub fn missed(
    user_id: UserId,
    medication_id: Uuid,
    date: NaiveDate,
    scheduled_time: ClockTime,
  ) -> Self {
    Self {
      user_id,
      medication_id,
      date,
      scheduled_time,
      actual_time: None,
      status: DoseStatus::Missed,
    }
  }
}

/// A persisted status event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationStatusEvent {
  pub event_id:       Uuid,
  pub user_id:        UserId,
  pub medication_id:  Uuid,
  pub date:           NaiveDate,
  pub scheduled_time: ClockTime,
  pub actual_time:    Option<ClockTime>,
  pub status:         DoseStatus,
  pub recorded_at:    DateTime<Utc>,
}
