//! The `MedicationStore` trait.
//!
//! Implemented by storage backends (e.g. `pillwatch-store-sqlite`). The API
//! and the scheduler runtime depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  Error,
  medication::{Medication, UserMedication},
  schedule::MedicationSchedule,
  status::{MedicationStatusEvent, NewStatusEvent},
  user::{User, UserId, UserProfile},
};

/// Implemented by backend error types so callers can tell a broken rule
/// (unknown user, duplicate event, ...) from a backend fault.
pub trait StoreError {
  /// The domain rule this failure violated, if any.
  fn domain(&self) -> Option<&Error>;
}

/// Abstraction over a medication store backend.
///
/// Users and medications are nodes; TAKES (carrying the schedule),
/// CARES_FOR and TOOK_MEDICATION are relationships between them. Status
/// events are append-only.
pub trait MedicationStore: Send + Sync {
  type Error: std::error::Error + StoreError + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Create the user, or overwrite its profile if it already exists.
  ///
  /// Name, email and phone are always overwritten. `age`, `sex` and `role`
  /// are only overwritten when the profile carries a value.
  fn upsert_user<'a>(
    &'a self,
    user_id: &'a UserId,
    profile: UserProfile,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + 'a;

  fn get_user<'a>(
    &'a self,
    user_id: &'a UserId,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  fn find_user_by_phone<'a>(
    &'a self,
    phone: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Delete the user together with its relationships and status events.
  /// Returns `false` if there was no such user.
  fn delete_user<'a>(
    &'a self,
    user_id: &'a UserId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Caretakers ────────────────────────────────────────────────────────

  /// Record that `caretaker_id` cares for `elder_id`. Idempotent.
  fn add_elder<'a>(
    &'a self,
    caretaker_id: &'a UserId,
    elder_id: &'a UserId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn list_elders<'a>(
    &'a self,
    caretaker_id: &'a UserId,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + 'a;

  // ── Medications ───────────────────────────────────────────────────────

  /// Return the medication with this name, creating it if necessary.
  fn find_or_create_medication<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Medication, Self::Error>> + Send + 'a;

  /// Create or replace the TAKES relationship between a user and a medication.
  fn set_schedule<'a>(
    &'a self,
    user_id: &'a UserId,
    medication_id: Uuid,
    schedule: MedicationSchedule,
  ) -> impl Future<Output = Result<UserMedication, Self::Error>> + Send + 'a;

  /// All medications the user takes, ordered by name.
  fn list_user_medications<'a>(
    &'a self,
    user_id: &'a UserId,
  ) -> impl Future<Output = Result<Vec<UserMedication>, Self::Error>> + Send + 'a;

  /// Returns `false` if the user did not take the medication.
  fn remove_medication<'a>(
    &'a self,
    user_id: &'a UserId,
    medication_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Status events ─────────────────────────────────────────────────────

  /// Append a status event. A second event for the same user, medication,
  /// date and scheduled time is rejected.
  fn record_status(
    &self,
    event: NewStatusEvent,
  ) -> impl Future<Output = Result<MedicationStatusEvent, Self::Error>> + Send + '_;

  /// Status events for a user, optionally restricted to one date, ordered by
  /// date then scheduled time.
  fn list_status_events<'a>(
    &'a self,
    user_id: &'a UserId,
    date: Option<NaiveDate>,
  ) -> impl Future<Output = Result<Vec<MedicationStatusEvent>, Self::Error>> + Send + 'a;
}
