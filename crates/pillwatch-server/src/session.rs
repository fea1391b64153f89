//! Per-user notification sessions.
//!
//! A session is a tokio task that ticks on a fixed interval, plans the tick
//! with [`plan_tick`] and performs the resulting reminders and status writes.
//! The [`SessionRegistry`] owns every session; starting one for a user that
//! already has one replaces it, and dropping a handle cancels its task.
//!
//! Adherence logs live in the registry, keyed by user, so a "marked taken"
//! relay lands in the same log whether or not a session is running and
//! survives a session restart.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::NaiveDateTime;
use pillwatch_core::{
  adherence::{AdherenceLog, AdherenceRecord},
  clock::Clock,
  notify::Notifier,
  schedule::ClockTime,
  scheduler::{DoseAction, SchedulerConfig, TickWindow, dose_date, plan_tick},
  store::{MedicationStore, StoreError},
  user::UserId,
};
use serde::Serialize;
use tokio::{
  sync::oneshot,
  task::JoinHandle,
  time::{MissedTickBehavior, interval},
};
use tracing::{debug, error, info, warn};

type SharedLog = Arc<Mutex<AdherenceLog>>;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
  m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// What `GET /sessions/{id}` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
  pub user_id:             UserId,
  pub enabled:             bool,
  pub started_at:          Option<NaiveDateTime>,
  pub check_interval_secs: u64,
  /// Unexpired adherence records for this user.
  pub taken:               Vec<AdherenceRecord>,
}

// ─── Handle ──────────────────────────────────────────────────────────────────

struct SessionHandle {
  started_at: NaiveDateTime,
  cancel:     Option<oneshot::Sender<()>>,
  task:       JoinHandle<()>,
}

impl Drop for SessionHandle {
  fn drop(&mut self) {
    if let Some(cancel) = self.cancel.take() {
      let _ = cancel.send(());
    }
    self.task.abort();
  }
}

// ─── Runner ──────────────────────────────────────────────────────────────────

/// The state one session task carries between ticks.
pub struct SessionRunner<S, N> {
  user_id:  UserId,
  store:    Arc<S>,
  notifier: Arc<N>,
  clock:    Arc<dyn Clock>,
  config:   SchedulerConfig,
  log:      SharedLog,
  previous: Option<NaiveDateTime>,
}

impl<S, N> SessionRunner<S, N>
where
  S: MedicationStore + 'static,
  N: Notifier + 'static,
{
  /// Run one tick: plan the window since the previous tick and act on it.
  pub async fn tick(&mut self) {
    let now = self.clock.now();
    let window = match self.previous {
      None => TickWindow::first(now, &self.config),
      Some(previous) => TickWindow::following(previous, now, &self.config),
    };

    // A skipped tick keeps its window; the next tick covers it too.
    let medications = match self.store.list_user_medications(&self.user_id).await {
      Ok(m) => m,
      Err(e) => {
        warn!(user_id = %self.user_id, error = %e, "could not load medications; skipping tick");
        return;
      }
    };
    self.previous = Some(now);

    let actions = {
      let log = lock(&self.log);
      plan_tick(&self.user_id, &medications, &window, &log, &self.config)
    };

    for action in actions {
      match action {
        DoseAction::Remind(reminder) => {
          if let Err(e) = self.notifier.notify(&reminder).await {
            warn!(
              user_id = %self.user_id,
              medication = %reminder.medication_name,
              channel = self.notifier.channel_name(),
              error = %e,
              "reminder delivery failed",
            );
          }
        }
        DoseAction::Resolve(event) => {
          let (medication_id, time, status) = (event.medication_id, event.scheduled_time, event.status);
          match self.store.record_status(event).await {
            Ok(_) => info!(
              user_id = %self.user_id,
              %medication_id,
              %time,
              status = status.as_str(),
              "dose resolved",
            ),
            Err(e) if e.domain().is_some_and(|d| d.is_conflict()) => {
              debug!(user_id = %self.user_id, %medication_id, %time, "dose already resolved");
            }
            Err(e) => error!(
              user_id = %self.user_id,
              %medication_id,
              %time,
              error = %e,
              "could not record dose status",
            ),
          }
        }
      }
    }
  }

  async fn run(mut self, mut cancel: oneshot::Receiver<()>) {
    let mut ticker = interval(self.config.check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        _ = &mut cancel => {
          debug!(user_id = %self.user_id, "session cancelled");
          break;
        }
        _ = ticker.tick() => self.tick().await,
      }
    }
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

pub struct SessionRegistry<S, N> {
  store:    Arc<S>,
  notifier: Arc<N>,
  clock:    Arc<dyn Clock>,
  config:   SchedulerConfig,
  sessions: Mutex<HashMap<UserId, SessionHandle>>,
  logs:     Mutex<HashMap<UserId, SharedLog>>,
}

impl<S, N> SessionRegistry<S, N>
where
  S: MedicationStore + 'static,
  N: Notifier + 'static,
{
  pub fn new(store: Arc<S>, notifier: Arc<N>, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
    Self {
      store,
      notifier,
      clock,
      config,
      sessions: Mutex::new(HashMap::new()),
      logs: Mutex::new(HashMap::new()),
    }
  }

  pub fn config(&self) -> &SchedulerConfig { &self.config }

  fn log_for(&self, user_id: &UserId) -> SharedLog {
    lock(&self.logs).entry(user_id.clone()).or_default().clone()
  }

  /// A runner for `user_id` that has not ticked yet.
  pub fn runner(&self, user_id: &UserId) -> SessionRunner<S, N> {
    SessionRunner {
      user_id:  user_id.clone(),
      store:    self.store.clone(),
      notifier: self.notifier.clone(),
      clock:    self.clock.clone(),
      config:   self.config.clone(),
      log:      self.log_for(user_id),
      previous: None,
    }
  }

  /// Enable notifications for `user_id`. An existing session is cancelled
  /// first. Must be called from within a tokio runtime.
  pub fn start(&self, user_id: &UserId) -> SessionStatus {
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let task = tokio::spawn(self.runner(user_id).run(cancel_rx));
    let handle = SessionHandle {
      started_at: self.clock.now(),
      cancel: Some(cancel_tx),
      task,
    };

    let replaced = lock(&self.sessions).insert(user_id.clone(), handle);
    if replaced.is_some() {
      info!(%user_id, "notification session restarted");
    } else {
      info!(%user_id, "notification session started");
    }
    drop(replaced);
    self.status(user_id)
  }

  /// Disable notifications. Returns whether a session was running.
  pub fn stop(&self, user_id: &UserId) -> bool {
    let removed = lock(&self.sessions).remove(user_id);
    if removed.is_some() {
      info!(%user_id, "notification session stopped");
    }
    removed.is_some()
  }

  pub fn stop_all(&self) {
    let drained: Vec<_> = lock(&self.sessions).drain().collect();
    if !drained.is_empty() {
      info!(count = drained.len(), "stopping all notification sessions");
    }
  }

  pub fn is_active(&self, user_id: &UserId) -> bool { lock(&self.sessions).contains_key(user_id) }

  pub fn active_count(&self) -> usize { lock(&self.sessions).len() }

  pub fn status(&self, user_id: &UserId) -> SessionStatus {
    let started_at = lock(&self.sessions).get(user_id).map(|h| h.started_at);
    let now = self.clock.now();
    let taken = lock(&self.logs)
      .get(user_id)
      .map(|log| {
        let log = lock(log);
        log
          .records()
          .iter()
          .filter(|r| log.find(&r.medication_name, r.time, r.date, now).is_some())
          .cloned()
          .collect()
      })
      .unwrap_or_default();

    SessionStatus {
      user_id: user_id.clone(),
      enabled: started_at.is_some(),
      started_at,
      check_interval_secs: self.config.check_interval.as_secs(),
      taken,
    }
  }

  /// Relay of a "marked taken" click: append to the user's adherence log.
  ///
  /// The record is dated by the dose the click falls next to, so a late dose
  /// marked just after midnight counts for the day before.
  pub fn mark_taken(&self, user_id: &UserId, medication_name: &str, time: ClockTime) -> AdherenceRecord {
    let now = self.clock.now();
    let date = dose_date(time, now, &self.config);
    let log = self.log_for(user_id);
    let mut log = lock(&log);
    let record = log.record_taken_on(medication_name, time, date, now).clone();
    info!(%user_id, medication = medication_name, %time, %date, "dose marked taken");
    record
  }

  /// Drop everything held for `user_id`: its session and its adherence log.
  /// Returns whether a session was running.
  pub fn forget(&self, user_id: &UserId) -> bool {
    let stopped = self.stop(user_id);
    if lock(&self.logs).remove(user_id).is_some() {
      debug!(%user_id, "adherence log dropped");
    }
    stopped
  }
}

impl<S, N> Drop for SessionRegistry<S, N> {
  fn drop(&mut self) { lock(&self.sessions).clear(); }
}

#[cfg(test)]
mod tests {
  use std::{
    convert::Infallible,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
  };

  use chrono::{NaiveDate, TimeDelta};
  use pillwatch_core::{
    clock::ManualClock,
    medication::{Medication, UserMedication},
    notify::Reminder,
    schedule::{DaySet, MedicationSchedule},
    status::{DoseStatus, MedicationStatusEvent, NewStatusEvent},
    user::{Role, User, UserProfile},
  };
  use pillwatch_store_sqlite::SqliteStore;
  use uuid::Uuid;

  use super::*;

  #[derive(Default)]
  struct RecordingNotifier(Mutex<Vec<Reminder>>);

  impl Notifier for RecordingNotifier {
    type Error = Infallible;

    async fn notify(&self, reminder: &Reminder) -> Result<(), Infallible> {
      lock(&self.0).push(reminder.clone());
      Ok(())
    }

    fn channel_name(&self) -> &str { "recording" }
  }

  fn t(s: &str) -> ClockTime { s.parse().unwrap() }

  fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 15)
      .unwrap()
      .and_hms_opt(hour, minute, 0)
      .unwrap()
  }

  struct Fixture {
    store:    Arc<SqliteStore>,
    notifier: Arc<RecordingNotifier>,
    clock:    ManualClock,
    registry: SessionRegistry<SqliteStore, RecordingNotifier>,
    user:     UserId,
  }

  /// One user taking DrugX daily at 08:00.
  async fn seeded_store() -> (SqliteStore, UserId) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let user = UserId::from("user_1");
    store
      .upsert_user(&user, UserProfile {
        first_name: "Ada".into(),
        role: Some(Role::Elder),
        ..UserProfile::default()
      })
      .await
      .unwrap();
    let med = store.find_or_create_medication("DrugX").await.unwrap();
    store
      .set_schedule(
        &user,
        med.medication_id,
        MedicationSchedule::new(vec![t("08:00")], vec![1], DaySet::Everyday).unwrap(),
      )
      .await
      .unwrap();
    (store, user)
  }

  async fn fixture(start: NaiveDateTime) -> Fixture {
    fixture_with(start, SchedulerConfig::default()).await
  }

  /// [`seeded_store`] behind a registry whose clock starts at `start`.
  async fn fixture_with(start: NaiveDateTime, config: SchedulerConfig) -> Fixture {
    let (store, user) = seeded_store().await;
    let store = Arc::new(store);
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = ManualClock::new(start);
    let registry =
      SessionRegistry::new(store.clone(), notifier.clone(), Arc::new(clock.clone()), config);
    Fixture { store, notifier, clock, registry, user }
  }

  /// Delegates to an in-memory store, failing the next medication load when
  /// `fail_next` is set.
  struct FlakyStore {
    inner:     SqliteStore,
    fail_next: AtomicBool,
  }

  impl MedicationStore for FlakyStore {
    type Error = pillwatch_store_sqlite::Error;

    async fn upsert_user(&self, user_id: &UserId, profile: UserProfile) -> Result<User, Self::Error> {
      self.inner.upsert_user(user_id, profile).await
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, Self::Error> {
      self.inner.get_user(user_id).await
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, Self::Error> {
      self.inner.find_user_by_phone(phone).await
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<bool, Self::Error> {
      self.inner.delete_user(user_id).await
    }

    async fn add_elder(&self, caretaker_id: &UserId, elder_id: &UserId) -> Result<(), Self::Error> {
      self.inner.add_elder(caretaker_id, elder_id).await
    }

    async fn list_elders(&self, caretaker_id: &UserId) -> Result<Vec<User>, Self::Error> {
      self.inner.list_elders(caretaker_id).await
    }

    async fn find_or_create_medication(&self, name: &str) -> Result<Medication, Self::Error> {
      self.inner.find_or_create_medication(name).await
    }

    async fn set_schedule(
      &self,
      user_id: &UserId,
      medication_id: Uuid,
      schedule: MedicationSchedule,
    ) -> Result<UserMedication, Self::Error> {
      self.inner.set_schedule(user_id, medication_id, schedule).await
    }

    async fn list_user_medications(&self, user_id: &UserId) -> Result<Vec<UserMedication>, Self::Error> {
      if self.fail_next.swap(false, Ordering::SeqCst) {
        return Err(pillwatch_store_sqlite::Error::DateParse("store unavailable".into()));
      }
      self.inner.list_user_medications(user_id).await
    }

    async fn remove_medication(&self, user_id: &UserId, medication_id: Uuid) -> Result<bool, Self::Error> {
      self.inner.remove_medication(user_id, medication_id).await
    }

    async fn record_status(&self, event: NewStatusEvent) -> Result<MedicationStatusEvent, Self::Error> {
      self.inner.record_status(event).await
    }

    async fn list_status_events(
      &self,
      user_id: &UserId,
      date: Option<NaiveDate>,
    ) -> Result<Vec<MedicationStatusEvent>, Self::Error> {
      self.inner.list_status_events(user_id, date).await
    }
  }

  #[tokio::test]
  async fn tick_in_reminder_window_notifies() {
    let f = fixture(at(7, 56)).await;
    let mut runner = f.registry.runner(&f.user);
    runner.tick().await;

    let sent = lock(&f.notifier.0);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].medication_name, "DrugX");
    assert_eq!(sent[0].user_id, f.user);
  }

  #[tokio::test]
  async fn marked_taken_suppresses_reminder_and_resolves_taken() {
    let f = fixture(at(7, 56)).await;
    let mut runner = f.registry.runner(&f.user);

    f.registry.mark_taken(&f.user, "DrugX", t("08:00"));
    runner.tick().await;
    assert!(lock(&f.notifier.0).is_empty());

    for _ in 0..6 {
      f.clock.advance(TimeDelta::minutes(1));
      runner.tick().await;
    }

    let events = f.store.list_status_events(&f.user, None).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, DoseStatus::Taken);
    assert_eq!(events[0].actual_time, Some(t("07:56")));
  }

  #[tokio::test]
  async fn unmarked_dose_resolves_missed_once() {
    let f = fixture(at(7, 58)).await;
    let mut runner = f.registry.runner(&f.user);

    for _ in 0..10 {
      runner.tick().await;
      f.clock.advance(TimeDelta::minutes(1));
    }

    let events = f.store.list_status_events(&f.user, None).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, DoseStatus::Missed);
    assert_eq!(events[0].actual_time, None);
  }

  #[tokio::test]
  async fn late_tick_after_suspend_still_resolves() {
    let f = fixture(at(7, 59)).await;
    let mut runner = f.registry.runner(&f.user);
    runner.tick().await;

    f.clock.set(at(11, 30));
    runner.tick().await;

    let events = f.store.list_status_events(&f.user, None).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, DoseStatus::Missed);
  }

  #[tokio::test]
  async fn failed_medication_load_keeps_the_window() {
    let (inner, user) = seeded_store().await;
    let store = Arc::new(FlakyStore { inner, fail_next: AtomicBool::new(false) });
    let clock = ManualClock::new(at(8, 0));
    let registry = SessionRegistry::new(
      store.clone(),
      Arc::new(RecordingNotifier::default()),
      Arc::new(clock.clone()),
      SchedulerConfig::default(),
    );
    let mut runner = registry.runner(&user);
    runner.tick().await;

    // The 08:01 deadline passes while the store is down.
    clock.set(at(8, 2));
    store.fail_next.store(true, Ordering::SeqCst);
    runner.tick().await;
    assert!(store.inner.list_status_events(&user, None).await.unwrap().is_empty());

    clock.set(at(8, 3));
    runner.tick().await;
    let events = store.inner.list_status_events(&user, None).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, DoseStatus::Missed);
  }

  #[tokio::test]
  async fn taken_just_after_midnight_counts_for_previous_day() {
    let config = SchedulerConfig {
      grace_period: TimeDelta::minutes(30),
      ..SchedulerConfig::default()
    };
    let f = fixture_with(at(23, 50), config).await;
    let late = f.store.find_or_create_medication("Late").await.unwrap();
    f.store
      .set_schedule(
        &f.user,
        late.medication_id,
        MedicationSchedule::new(vec![t("23:45")], vec![1], DaySet::Everyday).unwrap(),
      )
      .await
      .unwrap();
    let mut runner = f.registry.runner(&f.user);
    runner.tick().await;

    f.clock.advance(TimeDelta::minutes(15));
    let record = f.registry.mark_taken(&f.user, "Late", t("23:45"));
    assert_eq!(record.date, at(0, 0).date());

    f.clock.advance(TimeDelta::minutes(15));
    runner.tick().await;

    let events = f.store.list_status_events(&f.user, None).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].medication_id, late.medication_id);
    assert_eq!(events[0].date, at(0, 0).date());
    assert_eq!(events[0].status, DoseStatus::Taken);
    assert_eq!(events[0].actual_time, Some(t("00:05")));
  }

  #[tokio::test(start_paused = true)]
  async fn forget_drops_session_and_log() {
    let f = fixture(at(7, 0)).await;
    f.registry.start(&f.user);
    f.registry.mark_taken(&f.user, "DrugX", t("08:00"));

    assert!(f.registry.forget(&f.user));
    let status = f.registry.status(&f.user);
    assert!(!status.enabled);
    assert!(status.taken.is_empty());
    assert!(!f.registry.forget(&f.user));
  }

  #[tokio::test]
  async fn adherence_log_survives_restart() {
    let f = fixture(at(7, 0)).await;
    f.registry.start(&f.user);
    f.registry.mark_taken(&f.user, "DrugX", t("08:00"));
    f.registry.stop(&f.user);

    let status = f.registry.status(&f.user);
    assert!(!status.enabled);
    assert_eq!(status.taken.len(), 1);
    assert_eq!(status.taken[0].medication_name, "DrugX");
  }

  #[tokio::test(start_paused = true)]
  async fn start_replaces_existing_session() {
    let f = fixture(at(7, 0)).await;

    let first = f.registry.start(&f.user);
    assert!(first.enabled);
    f.registry.start(&f.user);
    assert_eq!(f.registry.active_count(), 1);

    assert!(f.registry.stop(&f.user));
    assert!(!f.registry.stop(&f.user));
    assert!(!f.registry.is_active(&f.user));
  }

  #[tokio::test(start_paused = true)]
  async fn running_session_resolves_over_time() {
    let f = fixture(at(7, 58)).await;
    f.registry.start(&f.user);

    // Move both clocks forward a minute at a time.
    for _ in 0..6 {
      f.clock.advance(TimeDelta::minutes(1));
      tokio::time::sleep(Duration::from_secs(60)).await;
    }
    // Let any in-flight store write land.
    for _ in 0..200 {
      if !f.store.list_status_events(&f.user, None).await.unwrap().is_empty() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }

    f.registry.stop_all();
    let events = f.store.list_status_events(&f.user, None).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, DoseStatus::Missed);
    assert!(!lock(&f.notifier.0).is_empty());
  }
}
