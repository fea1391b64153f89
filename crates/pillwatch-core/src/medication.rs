//! Medications and the per-user TAKES relationship.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schedule::MedicationSchedule;

/// A medication node. Names are unique; the id is assigned the first time a
/// name is seen and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
  pub medication_id: Uuid,
  pub name:          String,
}

/// A medication together with the schedule one user takes it on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMedication {
  pub medication: Medication,
  pub schedule:   MedicationSchedule,
}
