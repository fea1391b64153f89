//! Local wall-clock time.
//!
//! Schedules are expressed in the user's local time, so everything that asks
//! "what time is it" goes through a [`Clock`]. Tests substitute a manual one.

use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use chrono_tz::Tz;

pub trait Clock: Send + Sync {
  fn now(&self) -> NaiveDateTime;

  fn today(&self) -> NaiveDate { self.now().date() }
}

/// The host's local time, or a fixed IANA zone.
#[derive(Debug, Clone, Copy, Default)]
pub enum LocalClock {
  #[default]
  System,
  Zone(Tz),
}

impl Clock for LocalClock {
  fn now(&self) -> NaiveDateTime {
    match self {
      LocalClock::System => Local::now().naive_local(),
      LocalClock::Zone(tz) => Utc::now().with_timezone(tz).naive_local(),
    }
  }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<Mutex<NaiveDateTime>>);

impl ManualClock {
  pub fn new(start: NaiveDateTime) -> Self { Self(Arc::new(Mutex::new(start))) }

  pub fn set(&self, to: NaiveDateTime) {
    *self.0.lock().unwrap_or_else(|e| e.into_inner()) = to;
  }

  pub fn advance(&self, by: TimeDelta) {
    let mut now = self.0.lock().unwrap_or_else(|e| e.into_inner());
    *now += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> NaiveDateTime { *self.0.lock().unwrap_or_else(|e| e.into_inner()) }
}
