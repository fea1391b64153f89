//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, dates `YYYY-MM-DD`, clock times `HH:MM`
//! and UUIDs hyphenated lowercase. Schedules are stored as compact JSON and
//! re-validated when read back.

use chrono::{DateTime, NaiveDate, Utc};
use pillwatch_core::{
  medication::{Medication, UserMedication},
  schedule::{ClockTime, MedicationSchedule},
  status::{DoseStatus, MedicationStatusEvent},
  user::{Role, User, UserId},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(date: NaiveDate) -> String { date.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn decode_time(s: &str) -> Result<ClockTime> { Ok(s.parse()?) }

pub fn decode_status(s: &str) -> Result<DoseStatus> {
  match s {
    "taken" => Ok(DoseStatus::Taken),
    "missed" => Ok(DoseStatus::Missed),
    other => Err(Error::UnknownStatus(other.to_owned())),
  }
}

pub fn encode_schedule(schedule: &MedicationSchedule) -> Result<String> {
  Ok(serde_json::to_string(schedule)?)
}

pub fn decode_schedule(s: &str) -> Result<MedicationSchedule> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str =
  "user_id, first_name, last_name, email, phone, age, sex, role, created_at";

/// Raw values read directly from a `users` row, in [`USER_COLUMNS`] order.
pub struct RawUser {
  pub user_id:    String,
  pub first_name: String,
  pub last_name:  String,
  pub email:      String,
  pub phone:      String,
  pub age:        Option<u32>,
  pub sex:        Option<String>,
  pub role:       Option<String>,
  pub created_at: String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(0)?,
      first_name: row.get(1)?,
      last_name:  row.get(2)?,
      email:      row.get(3)?,
      phone:      row.get(4)?,
      age:        row.get(5)?,
      sex:        row.get(6)?,
      role:       row.get(7)?,
      created_at: row.get(8)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    let role = self.role.as_deref().map(str::parse::<Role>).transpose()?;
    Ok(User {
      user_id: UserId::new(self.user_id),
      first_name: self.first_name,
      last_name: self.last_name,
      email: self.email,
      phone: self.phone,
      age: self.age,
      sex: self.sex,
      role,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// A `takes` row joined with its medication.
pub struct RawUserMedication {
  pub medication_id: String,
  pub name:          String,
  pub schedule_json: String,
}

impl RawUserMedication {
  pub fn into_user_medication(self) -> Result<UserMedication> {
    Ok(UserMedication {
      medication: Medication {
        medication_id: decode_uuid(&self.medication_id)?,
        name:          self.name,
      },
      schedule:   decode_schedule(&self.schedule_json)?,
    })
  }
}

pub const EVENT_COLUMNS: &str = "event_id, user_id, medication_id, date, scheduled_time, \
                                 actual_time, status, recorded_at";

/// Raw values read directly from a `took_medication` row.
pub struct RawStatusEvent {
  pub event_id:       String,
  pub user_id:        String,
  pub medication_id:  String,
  pub date:           String,
  pub scheduled_time: String,
  pub actual_time:    Option<String>,
  pub status:         String,
  pub recorded_at:    String,
}

impl RawStatusEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:       row.get(0)?,
      user_id:        row.get(1)?,
      medication_id:  row.get(2)?,
      date:           row.get(3)?,
      scheduled_time: row.get(4)?,
      actual_time:    row.get(5)?,
      status:         row.get(6)?,
      recorded_at:    row.get(7)?,
    })
  }

  pub fn into_event(self) -> Result<MedicationStatusEvent> {
    Ok(MedicationStatusEvent {
      event_id:       decode_uuid(&self.event_id)?,
      user_id:        UserId::new(self.user_id),
      medication_id:  decode_uuid(&self.medication_id)?,
      date:           decode_date(&self.date)?,
      scheduled_time: decode_time(&self.scheduled_time)?,
      actual_time:    self.actual_time.as_deref().map(decode_time).transpose()?,
      status:         decode_status(&self.status)?,
      recorded_at:    decode_dt(&self.recorded_at)?,
    })
  }
}
