//! Tick planning for the notification scheduler.
//!
//! A tick looks at the wall-clock window since the previous tick and decides,
//! per scheduled dose, whether to remind, resolve, or do nothing. Planning is
//! pure; the caller performs the returned [`DoseAction`]s.
//!
//! Resolution is keyed to tick windows rather than to a fixed post-grace
//! interval. Consecutive windows `[previous, now)` partition time, so every
//! deadline falls into exactly one window and each dose resolves once, even
//! when a tick arrives late.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::{
  adherence::AdherenceLog,
  evaluator::doses_for_date,
  medication::UserMedication,
  notify::Reminder,
  schedule::ClockTime,
  status::NewStatusEvent,
  user::UserId,
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
  /// Time between ticks.
  pub check_interval:     Duration,
  /// How long before a dose reminders start.
  pub reminder_threshold: TimeDelta,
  /// How long after a dose it may still be marked taken.
  pub grace_period:       TimeDelta,
  /// Oldest deadline a late tick will still resolve.
  pub catch_up:           TimeDelta,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      check_interval:     Duration::from_secs(60),
      reminder_threshold: TimeDelta::minutes(5),
      grace_period:       TimeDelta::minutes(1),
      catch_up:           TimeDelta::hours(24),
    }
  }
}

impl SchedulerConfig {
  fn interval(&self) -> TimeDelta {
    TimeDelta::from_std(self.check_interval).unwrap_or_else(|_| TimeDelta::days(1))
  }
}

// ─── Phases ──────────────────────────────────────────────────────────────────

/// Where `now` sits relative to one scheduled dose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DosePhase {
  /// More than the reminder threshold away.
  Upcoming,
  /// Within the threshold, up to and including the scheduled minute.
  Reminder,
  /// Past the scheduled time, up to and including the grace deadline.
  Grace,
  /// Past the grace deadline.
  Overdue,
}

pub fn dose_phase(
  scheduled: NaiveDateTime,
  now: NaiveDateTime,
  config: &SchedulerConfig,
) -> DosePhase {
  if now < scheduled - config.reminder_threshold {
    DosePhase::Upcoming
  } else if now <= scheduled {
    DosePhase::Reminder
  } else if now <= scheduled + config.grace_period {
    DosePhase::Grace
  } else {
    DosePhase::Overdue
  }
}

/// The day of the `time` dose a click at `now` refers to: the neighbouring
/// day whose reminder-to-deadline span contains `now`, else today.
pub fn dose_date(time: ClockTime, now: NaiveDateTime, config: &SchedulerConfig) -> NaiveDate {
  let today = now.date();
  [Some(today), today.pred_opt(), today.succ_opt()]
    .into_iter()
    .flatten()
    .find(|date| {
      let scheduled = time.on(*date);
      scheduled - config.reminder_threshold <= now && now <= scheduled + config.grace_period
    })
    .unwrap_or(today)
}

// ─── Tick window ─────────────────────────────────────────────────────────────

/// The half-open span `[start, end)` a tick is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickWindow {
  pub start: NaiveDateTime,
  pub end:   NaiveDateTime,
}

impl TickWindow {
  /// The first tick of a session covers one interval back from `now`.
  pub fn first(now: NaiveDateTime, config: &SchedulerConfig) -> Self {
    Self { start: now - config.interval(), end: now }
  }

  /// A later tick covers everything since the previous one, clamped to the
  /// catch-up horizon. If the clock went backwards the window is empty.
  pub fn following(previous: NaiveDateTime, now: NaiveDateTime, config: &SchedulerConfig) -> Self {
    let start = previous.max(now - config.catch_up).min(now);
    Self { start, end: now }
  }

  pub fn contains(&self, at: NaiveDateTime) -> bool { self.start <= at && at < self.end }
}

// ─── Planning ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoseAction {
  Remind(Reminder),
  Resolve(NewStatusEvent),
}

/// Decide what this tick must do for `user_id`'s medications.
///
/// Reminders are only considered for today's doses (the window's end date).
/// Resolutions cover every dose whose deadline lies inside `window`, on any
/// calendar day.
pub fn plan_tick(
  user_id: &UserId,
  medications: &[UserMedication],
  window: &TickWindow,
  log: &AdherenceLog,
  config: &SchedulerConfig,
) -> Vec<DoseAction> {
  let now = window.end;
  let today = now.date();
  let mut actions = Vec::new();

  for dose in doses_for_date(medications, today) {
    let phase = dose_phase(dose.time.on(today), now, config);
    if phase == DosePhase::Reminder && !log.is_taken(&dose.medication_name, dose.time, now) {
      actions.push(DoseAction::Remind(Reminder::for_dose(user_id.clone(), &dose)));
    }
  }

  let first_day = (window.start - config.grace_period).date();
  let last_day = (window.end - config.grace_period).date();
  for date in first_day.iter_days().take_while(|d| *d <= last_day) {
    for dose in doses_for_date(medications, date) {
      let deadline = dose.time.on(date) + config.grace_period;
      if !window.contains(deadline) {
        continue;
      }
      let event = match log.taken_at(&dose.medication_name, dose.time, date, now) {
        Some(taken_at) => NewStatusEvent::taken(
          user_id.clone(),
          dose.medication_id,
          date,
          dose.time,
          ClockTime::from_time(taken_at.time()),
        ),
        None => NewStatusEvent::missed(user_id.clone(), dose.medication_id, date, dose.time),
      };
      actions.push(DoseAction::Resolve(event));
    }
  }

  actions
}
