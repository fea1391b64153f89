//! Medication schedules — clock times, weekday sets and the validated
//! per-medication dosing plan.
//!
//! All three types are validated on construction *and* on deserialisation,
//! so a malformed schedule never reaches the evaluator.

use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike as _, Weekday};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── ClockTime ───────────────────────────────────────────────────────────────

/// A 24-hour wall-clock time with minute precision (`"08:00"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(NaiveTime);

impl ClockTime {
  pub fn new(hour: u32, minute: u32) -> Result<Self> {
    NaiveTime::from_hms_opt(hour, minute, 0)
      .map(Self)
      .ok_or_else(|| Error::InvalidClockTime(format!("{hour}:{minute}")))
  }

  /// Truncate a time of day to whole minutes.
  pub fn from_time(time: NaiveTime) -> Self {
    Self(time.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(time))
  }

  pub fn hour(self) -> u32 { self.0.hour() }

  pub fn minute(self) -> u32 { self.0.minute() }

  pub fn minutes_since_midnight(self) -> u32 { self.hour() * 60 + self.minute() }

  /// This time of day on `date`.
  pub fn on(self, date: NaiveDate) -> NaiveDateTime { date.and_time(self.0) }

  /// Snap to the nearest quarter hour. Times from 23:53 onward wrap to
  /// 00:00.
  pub fn round_to_quarter_hour(self) -> Self {
    let rounded = (self.minutes_since_midnight() + 7) / 15 * 15 % (24 * 60);
    Self(NaiveTime::MIN + TimeDelta::minutes(i64::from(rounded)))
  }
}

impl fmt::Display for ClockTime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:02}:{:02}", self.hour(), self.minute())
  }
}

impl FromStr for ClockTime {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let invalid = || Error::InvalidClockTime(s.to_owned());
    let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
      return Err(invalid());
    }
    if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
      return Err(invalid());
    }
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    Self::new(hour, minute).map_err(|_| invalid())
  }
}

impl TryFrom<String> for ClockTime {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<ClockTime> for String {
  fn from(t: ClockTime) -> Self { t.to_string() }
}

// ─── DayCode ─────────────────────────────────────────────────────────────────

/// A weekday as stored on a schedule.
///
/// The wire codes are `M T W Th F Sa Su`. Tuesday is `T` and Thursday is
/// `Th`; conversion goes through this enum, never through string prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayCode {
  #[serde(rename = "M")]
  Mon,
  #[serde(rename = "T")]
  Tue,
  #[serde(rename = "W")]
  Wed,
  #[serde(rename = "Th")]
  Thu,
  #[serde(rename = "F")]
  Fri,
  #[serde(rename = "Sa")]
  Sat,
  #[serde(rename = "Su")]
  Sun,
}

impl DayCode {
  pub const ALL: [DayCode; 7] = [
    DayCode::Mon,
    DayCode::Tue,
    DayCode::Wed,
    DayCode::Thu,
    DayCode::Fri,
    DayCode::Sat,
    DayCode::Sun,
  ];

  pub fn code(self) -> &'static str {
    match self {
      DayCode::Mon => "M",
      DayCode::Tue => "T",
      DayCode::Wed => "W",
      DayCode::Thu => "Th",
      DayCode::Fri => "F",
      DayCode::Sat => "Sa",
      DayCode::Sun => "Su",
    }
  }
}

impl From<Weekday> for DayCode {
  fn from(w: Weekday) -> Self {
    match w {
      Weekday::Mon => DayCode::Mon,
      Weekday::Tue => DayCode::Tue,
      Weekday::Wed => DayCode::Wed,
      Weekday::Thu => DayCode::Thu,
      Weekday::Fri => DayCode::Fri,
      Weekday::Sat => DayCode::Sat,
      Weekday::Sun => DayCode::Sun,
    }
  }
}

impl fmt::Display for DayCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.code()) }
}

impl FromStr for DayCode {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    DayCode::ALL
      .into_iter()
      .find(|d| d.code() == s)
      .ok_or_else(|| Error::UnknownDayCode(s.to_owned()))
  }
}

// ─── DaySet ──────────────────────────────────────────────────────────────────

const EVERYDAY: &str = "Everyday";

/// The weekdays a schedule is active on.
///
/// Serialised as `["Everyday"]` or a list of day codes such as
/// `["M","W","F"]`. The two forms are never combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub enum DaySet {
  Everyday,
  Days(BTreeSet<DayCode>),
}

impl DaySet {
  /// An explicit day set. Fails on an empty input.
  pub fn days(days: impl IntoIterator<Item = DayCode>) -> Result<Self> {
    let set: BTreeSet<DayCode> = days.into_iter().collect();
    if set.is_empty() {
      return Err(Error::EmptyDaySet);
    }
    Ok(Self::Days(set))
  }

  pub fn is_everyday(&self) -> bool { matches!(self, Self::Everyday) }

  pub fn contains(&self, weekday: Weekday) -> bool {
    match self {
      Self::Everyday => true,
      Self::Days(days) => days.contains(&DayCode::from(weekday)),
    }
  }

  /// Add a single day. Selecting a day drops the `Everyday` form.
  pub fn with_day(&self, day: DayCode) -> Self {
    match self {
      Self::Everyday => Self::Days(BTreeSet::from([day])),
      Self::Days(days) => {
        let mut days = days.clone();
        days.insert(day);
        Self::Days(days)
      }
    }
  }

  /// Remove a single day. Removing a day from `Everyday` leaves the other
  /// six; removing the last remaining day fails.
  pub fn without_day(&self, day: DayCode) -> Result<Self> {
    let remaining = match self {
      Self::Everyday => DayCode::ALL.into_iter().filter(|d| *d != day).collect(),
      Self::Days(days) => days.iter().copied().filter(|d| *d != day).collect::<Vec<_>>(),
    };
    Self::days(remaining)
  }
}

impl TryFrom<Vec<String>> for DaySet {
  type Error = Error;

  fn try_from(codes: Vec<String>) -> Result<Self> {
    if codes.is_empty() {
      return Err(Error::EmptyDaySet);
    }
    if codes.iter().any(|c| c == EVERYDAY) {
      return if codes.iter().all(|c| c == EVERYDAY) {
        Ok(Self::Everyday)
      } else {
        Err(Error::MixedDaySet)
      };
    }
    let days = codes
      .iter()
      .map(|c| c.parse::<DayCode>())
      .collect::<Result<Vec<_>>>()?;
    Self::days(days)
  }
}

impl From<DaySet> for Vec<String> {
  fn from(set: DaySet) -> Self {
    match set {
      DaySet::Everyday => vec![EVERYDAY.to_owned()],
      DaySet::Days(days) => days.into_iter().map(|d| d.code().to_owned()).collect(),
    }
  }
}

// ─── MedicationSchedule ──────────────────────────────────────────────────────

/// Slot time used when the daily frequency changes (08:00).
pub fn default_dose_time() -> ClockTime { ClockTime(NaiveTime::MIN + TimeDelta::hours(8)) }

/// How and when a user takes one medication.
///
/// `times` and `pills_per_dose` are index-aligned and their common length is
/// the daily frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ScheduleParts", into = "ScheduleParts")]
pub struct MedicationSchedule {
  times:          Vec<ClockTime>,
  pills_per_dose: Vec<u32>,
  days:           DaySet,
}

impl MedicationSchedule {
  pub fn new(times: Vec<ClockTime>, pills_per_dose: Vec<u32>, days: DaySet) -> Result<Self> {
    if times.is_empty() {
      return Err(Error::EmptySchedule);
    }
    if times.len() != pills_per_dose.len() {
      return Err(Error::LengthMismatch {
        times: times.len(),
        pills: pills_per_dose.len(),
      });
    }
    if let Some(index) = pills_per_dose.iter().position(|p| *p == 0) {
      return Err(Error::ZeroPillCount { index });
    }
    Ok(Self { times, pills_per_dose, days })
  }

  /// A schedule with `frequency` slots, each at 08:00 with one pill.
  pub fn with_frequency(frequency: usize, days: DaySet) -> Result<Self> {
    Self::new(vec![default_dose_time(); frequency], vec![1; frequency], days)
  }

  /// Change the daily frequency. Every slot resets to 08:00 with one pill.
  pub fn set_frequency(&mut self, frequency: usize) -> Result<()> {
    *self = Self::with_frequency(frequency, self.days.clone())?;
    Ok(())
  }

  pub fn set_days(&mut self, days: DaySet) { self.days = days; }

  pub fn times(&self) -> &[ClockTime] { &self.times }

  pub fn pills_per_dose(&self) -> &[u32] { &self.pills_per_dose }

  pub fn days(&self) -> &DaySet { &self.days }

  pub fn frequency(&self) -> usize { self.times.len() }

  pub fn is_active_on(&self, weekday: Weekday) -> bool { self.days.contains(weekday) }

  /// `(time, pill_count)` pairs in slot order.
  pub fn doses(&self) -> impl Iterator<Item = (ClockTime, u32)> + '_ {
    self.times.iter().copied().zip(self.pills_per_dose.iter().copied())
  }
}

/// Wire shape of [`MedicationSchedule`].
#[derive(Serialize, Deserialize)]
struct ScheduleParts {
  times:          Vec<ClockTime>,
  pills_per_dose: Vec<u32>,
  days:           DaySet,
  #[serde(default)]
  frequency:      Option<usize>,
}

impl TryFrom<ScheduleParts> for MedicationSchedule {
  type Error = Error;

  fn try_from(parts: ScheduleParts) -> Result<Self> {
    let schedule = Self::new(parts.times, parts.pills_per_dose, parts.days)?;
    match parts.frequency {
      Some(frequency) if frequency != schedule.frequency() => Err(Error::FrequencyMismatch {
        frequency,
        times: schedule.frequency(),
      }),
      _ => Ok(schedule),
    }
  }
}

impl From<MedicationSchedule> for ScheduleParts {
  fn from(s: MedicationSchedule) -> Self {
    let frequency = Some(s.frequency());
    Self {
      times: s.times,
      pills_per_dose: s.pills_per_dose,
      days: s.days,
      frequency,
    }
  }
}
