//! Error types for `pillwatch-core`.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::{schedule::ClockTime, user::UserId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("invalid clock time: {0:?} (expected HH:MM)")]
  InvalidClockTime(String),

  #[error("unknown day code: {0:?}")]
  UnknownDayCode(String),

  #[error("day set is empty")]
  EmptyDaySet,

  #[error("day set mixes \"Everyday\" with individual days")]
  MixedDaySet,

  #[error("a schedule needs at least one dose time")]
  EmptySchedule,

  #[error("{times} dose times but {pills} pill counts")]
  LengthMismatch { times: usize, pills: usize },

  #[error("frequency {frequency} does not match {times} dose times")]
  FrequencyMismatch { frequency: usize, times: usize },

  #[error("pill count for dose {index} must be at least 1")]
  ZeroPillCount { index: usize },

  #[error("unknown role: {0:?} (expected elder or caretaker)")]
  UnknownRole(String),

  #[error("user not found: {0}")]
  UserNotFound(UserId),

  #[error("medication not found: {0}")]
  MedicationNotFound(Uuid),

  #[error("user {0} is not a caretaker")]
  NotACaretaker(UserId),

  #[error("a user cannot be their own caretaker")]
  SelfCare,

  #[error("medication name is empty")]
  EmptyMedicationName,

  #[error("status already recorded for medication {medication_id} on {date} at {time}")]
  DuplicateStatusEvent {
    medication_id: Uuid,
    date:          NaiveDate,
    time:          ClockTime,
  },
}

impl Error {
  /// The failure refers to a user or medication that does not exist.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Error::UserNotFound(_) | Error::MedicationNotFound(_))
  }

  /// The failure conflicts with state that is already stored.
  pub fn is_conflict(&self) -> bool { matches!(self, Error::DuplicateStatusEvent { .. }) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
