//! Schedule evaluation — which doses are due on a given day.
//!
//! Pure functions only. The output is recomputed on every call and never
//! stored.

use chrono::{Datelike as _, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{medication::UserMedication, schedule::ClockTime};

/// One concrete dose due on a particular day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledDose {
  pub medication_id:   Uuid,
  pub medication_name: String,
  pub time:            ClockTime,
  pub pill_count:      u32,
}

/// Expand every schedule active on `weekday` into its doses, sorted by time
/// of day. Doses at the same time keep their input order.
pub fn doses_on(medications: &[UserMedication], weekday: Weekday) -> Vec<ScheduledDose> {
  let mut doses: Vec<ScheduledDose> = medications
    .iter()
    .filter(|m| m.schedule.is_active_on(weekday))
    .flat_map(|m| {
      m.schedule.doses().map(move |(time, pill_count)| ScheduledDose {
        medication_id: m.medication.medication_id,
        medication_name: m.medication.name.clone(),
        time,
        pill_count,
      })
    })
    .collect();

  doses.sort_by_key(|d| d.time);
  doses
}

/// [`doses_on`] for the weekday of `date`.
pub fn doses_for_date(medications: &[UserMedication], date: NaiveDate) -> Vec<ScheduledDose> {
  doses_on(medications, date.weekday())
}
