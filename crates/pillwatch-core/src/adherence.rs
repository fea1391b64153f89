//! The session-local adherence log: which doses were marked taken.
//!
//! Records are written when a "marked taken" message is relayed from a
//! reminder and read by the scheduler when it resolves a dose. Anything
//! older than [`RETENTION_HOURS`] is pruned on write and ignored on read.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::schedule::ClockTime;

pub const RETENTION_HOURS: i64 = 24;

/// A dose marked as taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdherenceRecord {
  pub medication_name: String,
  /// The day of the dose; the day before the click when a late dose is
  /// marked taken after midnight.
  pub date:            NaiveDate,
  /// The scheduled slot, not the moment of the click.
  pub time:            ClockTime,
  /// Local time of the click.
  pub taken_at:        NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct AdherenceLog {
  records: Vec<AdherenceRecord>,
}

impl AdherenceLog {
  pub fn new() -> Self { Self::default() }

  /// Append a record for `now`'s date, then drop expired records.
  pub fn record_taken(&mut self, medication_name: &str, time: ClockTime, now: NaiveDateTime) {
    self.record_taken_on(medication_name, time, now.date(), now);
  }

  /// Append a record for the dose on `date`, clicked at `now`, then drop
  /// expired records.
  pub fn record_taken_on(
    &mut self,
    medication_name: &str,
    time: ClockTime,
    date: NaiveDate,
    now: NaiveDateTime,
  ) -> &AdherenceRecord {
    self.prune(now);
    self.records.push(AdherenceRecord {
      medication_name: medication_name.to_owned(),
      date,
      time,
      taken_at: now,
    });
    &self.records[self.records.len() - 1]
  }

  /// Whether the dose was marked taken today.
  pub fn is_taken(&self, medication_name: &str, time: ClockTime, now: NaiveDateTime) -> bool {
    self.find(medication_name, time, now.date(), now).is_some()
  }

  /// The unexpired record for a dose on `date`, if any.
  pub fn find(
    &self,
    medication_name: &str,
    time: ClockTime,
    date: NaiveDate,
    now: NaiveDateTime,
  ) -> Option<&AdherenceRecord> {
    self.records.iter().find(|r| {
      r.medication_name == medication_name
        && r.time == time
        && r.date == date
        && !is_expired(r, now)
    })
  }

  /// When the dose on `date` was marked taken.
  pub fn taken_at(
    &self,
    medication_name: &str,
    time: ClockTime,
    date: NaiveDate,
    now: NaiveDateTime,
  ) -> Option<NaiveDateTime> {
    self.find(medication_name, time, date, now).map(|r| r.taken_at)
  }

  pub fn prune(&mut self, now: NaiveDateTime) { self.records.retain(|r| !is_expired(r, now)); }

  pub fn len(&self) -> usize { self.records.len() }

  pub fn is_empty(&self) -> bool { self.records.is_empty() }

  pub fn records(&self) -> &[AdherenceRecord] { &self.records }
}

fn is_expired(record: &AdherenceRecord, now: NaiveDateTime) -> bool {
  now - record.taken_at > TimeDelta::hours(RETENTION_HOURS)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn t(s: &str) -> ClockTime { s.parse().unwrap() }

  fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, day)
      .unwrap()
      .and_hms_opt(hour, minute, 0)
      .unwrap()
  }

  #[test]
  fn taken_today_is_reported() {
    let mut log = AdherenceLog::new();
    log.record_taken("DrugX", t("08:00"), at(15, 7, 58));
    assert!(log.is_taken("DrugX", t("08:00"), at(15, 8, 2)));
  }

  #[test]
  fn name_and_time_must_both_match() {
    let mut log = AdherenceLog::new();
    log.record_taken("DrugX", t("08:00"), at(15, 7, 58));
    assert!(!log.is_taken("DrugY", t("08:00"), at(15, 8, 2)));
    assert!(!log.is_taken("DrugX", t("20:00"), at(15, 8, 2)));
  }

  #[test]
  fn yesterdays_record_is_not_today() {
    let mut log = AdherenceLog::new();
    log.record_taken("DrugX", t("08:00"), at(15, 7, 58));
    assert!(!log.is_taken("DrugX", t("08:00"), at(16, 7, 59)));
    assert!(log.find("DrugX", t("08:00"), at(15, 0, 0).date(), at(16, 7, 0)).is_some());
  }

  #[test]
  fn records_older_than_a_day_are_never_returned() {
    let mut log = AdherenceLog::new();
    log.record_taken("DrugX", t("23:45"), at(15, 23, 40));
    let later = at(16, 23, 41);
    assert!(log.find("DrugX", t("23:45"), at(15, 0, 0).date(), later).is_none());
  }

  #[test]
  fn record_can_target_the_previous_day() {
    let mut log = AdherenceLog::new();
    let record = log.record_taken_on("Late", t("23:45"), at(15, 0, 0).date(), at(16, 0, 5));
    assert_eq!(record.date, at(15, 0, 0).date());
    assert_eq!(log.taken_at("Late", t("23:45"), at(15, 0, 0).date(), at(16, 0, 16)), Some(at(16, 0, 5)));
    assert!(!log.is_taken("Late", t("23:45"), at(16, 23, 40)));
  }

  #[test]
  fn recording_prunes_expired_entries() {
    let mut log = AdherenceLog::new();
    log.record_taken("Old", t("08:00"), at(14, 8, 0));
    log.record_taken("Fresh", t("08:00"), at(15, 8, 1));
    assert_eq!(log.len(), 1);
    assert_eq!(log.records()[0].medication_name, "Fresh");
  }
}
