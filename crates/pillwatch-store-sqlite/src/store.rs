//! [`SqliteStore`] — the SQLite implementation of [`MedicationStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use pillwatch_core::{
  Error as CoreError,
  medication::{Medication, UserMedication},
  schedule::MedicationSchedule,
  status::{MedicationStatusEvent, NewStatusEvent},
  store::MedicationStore,
  user::{Role, User, UserId, UserProfile},
};

use crate::{
  Result,
  encode::{
    EVENT_COLUMNS, RawStatusEvent, RawUser, RawUserMedication, USER_COLUMNS, encode_date,
    encode_dt, encode_schedule, encode_uuid,
  },
  schema::SCHEMA,
};

/// Outcome of a guarded write performed inside one `call`.
enum Write {
  Done,
  MissingUser,
  MissingMedication,
  Duplicate,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A medication store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn user_exists(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM users WHERE user_id = ?1", rusqlite::params![id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

fn medication_name(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT name FROM medications WHERE medication_id = ?1",
      rusqlite::params![id],
      |r| r.get(0),
    )
    .optional()
}

// ─── MedicationStore impl ────────────────────────────────────────────────────

impl MedicationStore for SqliteStore {
  type Error = crate::Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn upsert_user(&self, user_id: &UserId, profile: UserProfile) -> Result<User> {
    let id = user_id.as_str().to_owned();
    let created_at = encode_dt(Utc::now());
    let role = profile.role.map(Role::as_str);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users
             (user_id, first_name, last_name, email, phone, age, sex, role, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
           ON CONFLICT(user_id) DO UPDATE SET
             first_name = excluded.first_name,
             last_name  = excluded.last_name,
             email      = excluded.email,
             phone      = excluded.phone,
             age        = COALESCE(excluded.age, users.age),
             sex        = COALESCE(excluded.sex, users.sex),
             role       = COALESCE(excluded.role, users.role)",
          rusqlite::params![
            id,
            profile.first_name,
            profile.last_name,
            profile.email,
            profile.phone,
            profile.age,
            profile.sex,
            role,
            created_at,
          ],
        )?;
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
              rusqlite::params![id],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .ok_or_else(|| CoreError::UserNotFound(user_id.clone()))?
      .into_user()
  }

  async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
    let id = user_id.as_str().to_owned();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
              rusqlite::params![id],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>> {
    let phone = phone.trim().to_owned();
    if phone.is_empty() {
      return Ok(None);
    }

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {USER_COLUMNS} FROM users WHERE phone = ?1
                 ORDER BY created_at LIMIT 1"
              ),
              rusqlite::params![phone],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn delete_user(&self, user_id: &UserId) -> Result<bool> {
    let id = user_id.as_str().to_owned();

    // TAKES, CARES_FOR and TOOK_MEDICATION rows go with the user via
    // ON DELETE CASCADE.
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM users WHERE user_id = ?1", rusqlite::params![id])?)
      })
      .await?;

    Ok(deleted > 0)
  }

  // ── Caretakers ────────────────────────────────────────────────────────────

  async fn add_elder(&self, caretaker_id: &UserId, elder_id: &UserId) -> Result<()> {
    if caretaker_id == elder_id {
      return Err(CoreError::SelfCare.into());
    }

    let caretaker = self
      .get_user(caretaker_id)
      .await?
      .ok_or_else(|| CoreError::UserNotFound(caretaker_id.clone()))?;
    if !caretaker.is_caretaker() {
      return Err(CoreError::NotACaretaker(caretaker_id.clone()).into());
    }
    if self.get_user(elder_id).await?.is_none() {
      return Err(CoreError::UserNotFound(elder_id.clone()).into());
    }

    let caretaker = caretaker_id.as_str().to_owned();
    let elder = elder_id.as_str().to_owned();
    let at = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO cares_for (caretaker_id, elder_id, created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![caretaker, elder, at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_elders(&self, caretaker_id: &UserId) -> Result<Vec<User>> {
    let id = caretaker_id.as_str().to_owned();

    let (exists, raws): (bool, Vec<RawUser>) = self
      .conn
      .call(move |conn| {
        if !user_exists(conn, &id)? {
          return Ok((false, Vec::new()));
        }
        let columns = USER_COLUMNS
          .split(", ")
          .map(|c| format!("u.{c}"))
          .collect::<Vec<_>>()
          .join(", ");
        let mut stmt = conn.prepare(&format!(
          "SELECT {columns}
           FROM cares_for c
           JOIN users u ON u.user_id = c.elder_id
           WHERE c.caretaker_id = ?1
           ORDER BY u.first_name, u.last_name, u.user_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((true, rows))
      })
      .await?;

    if !exists {
      return Err(CoreError::UserNotFound(caretaker_id.clone()).into());
    }
    raws.into_iter().map(RawUser::into_user).collect()
  }

  // ── Medications ───────────────────────────────────────────────────────────

  async fn find_or_create_medication(&self, name: &str) -> Result<Medication> {
    let name = name.trim().to_owned();
    if name.is_empty() {
      return Err(CoreError::EmptyMedicationName.into());
    }
    let fresh_id = encode_uuid(Uuid::new_v4());

    let (id, name): (String, String) = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO medications (medication_id, name) VALUES (?1, ?2)",
          rusqlite::params![fresh_id, name],
        )?;
        Ok(conn.query_row(
          "SELECT medication_id, name FROM medications WHERE name = ?1",
          rusqlite::params![name],
          |r| Ok((r.get(0)?, r.get(1)?)),
        )?)
      })
      .await?;

    Ok(Medication {
      medication_id: Uuid::parse_str(&id)?,
      name,
    })
  }

  async fn set_schedule(
    &self,
    user_id: &UserId,
    medication_id: Uuid,
    schedule: MedicationSchedule,
  ) -> Result<UserMedication> {
    let user = user_id.as_str().to_owned();
    let med = encode_uuid(medication_id);
    let schedule_json = encode_schedule(&schedule)?;

    let (outcome, name): (Write, Option<String>) = self
      .conn
      .call(move |conn| {
        if !user_exists(conn, &user)? {
          return Ok((Write::MissingUser, None));
        }
        let Some(name) = medication_name(conn, &med)? else {
          return Ok((Write::MissingMedication, None));
        };
        conn.execute(
          "INSERT INTO takes (user_id, medication_id, schedule_json) VALUES (?1, ?2, ?3)
           ON CONFLICT(user_id, medication_id) DO UPDATE SET
             schedule_json = excluded.schedule_json",
          rusqlite::params![user, med, schedule_json],
        )?;
        Ok((Write::Done, Some(name)))
      })
      .await?;

    match (outcome, name) {
      (Write::Done, Some(name)) => Ok(UserMedication {
        medication: Medication { medication_id, name },
        schedule,
      }),
      (Write::MissingUser, _) => Err(CoreError::UserNotFound(user_id.clone()).into()),
      _ => Err(CoreError::MedicationNotFound(medication_id).into()),
    }
  }

  async fn list_user_medications(&self, user_id: &UserId) -> Result<Vec<UserMedication>> {
    let id = user_id.as_str().to_owned();

    let raws: Vec<RawUserMedication> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT m.medication_id, m.name, t.schedule_json
           FROM takes t
           JOIN medications m ON m.medication_id = t.medication_id
           WHERE t.user_id = ?1
           ORDER BY m.name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id], |row| {
            Ok(RawUserMedication {
              medication_id: row.get(0)?,
              name:          row.get(1)?,
              schedule_json: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawUserMedication::into_user_medication)
      .collect()
  }

  async fn remove_medication(&self, user_id: &UserId, medication_id: Uuid) -> Result<bool> {
    let user = user_id.as_str().to_owned();
    let med = encode_uuid(medication_id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM takes WHERE user_id = ?1 AND medication_id = ?2",
          rusqlite::params![user, med],
        )?)
      })
      .await?;

    Ok(removed > 0)
  }

  // ── Status events ─────────────────────────────────────────────────────────

  async fn record_status(&self, event: NewStatusEvent) -> Result<MedicationStatusEvent> {
    let stored = MedicationStatusEvent {
      event_id:       Uuid::new_v4(),
      user_id:        event.user_id,
      medication_id:  event.medication_id,
      date:           event.date,
      scheduled_time: event.scheduled_time,
      actual_time:    event.actual_time,
      status:         event.status,
      recorded_at:    Utc::now(),
    };

    let event_id = encode_uuid(stored.event_id);
    let user = stored.user_id.as_str().to_owned();
    let med = encode_uuid(stored.medication_id);
    let date = encode_date(stored.date);
    let scheduled = stored.scheduled_time.to_string();
    let actual = stored.actual_time.map(|t| t.to_string());
    let status = stored.status.as_str();
    let at = encode_dt(stored.recorded_at);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !user_exists(&tx, &user)? {
          return Ok(Write::MissingUser);
        }
        if medication_name(&tx, &med)?.is_none() {
          return Ok(Write::MissingMedication);
        }
        let duplicate = tx
          .query_row(
            "SELECT 1 FROM took_medication
             WHERE user_id = ?1 AND medication_id = ?2 AND date = ?3 AND scheduled_time = ?4",
            rusqlite::params![user, med, date, scheduled],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if duplicate {
          return Ok(Write::Duplicate);
        }
        tx.execute(
          "INSERT INTO took_medication (
             event_id, user_id, medication_id, date, scheduled_time,
             actual_time, status, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![event_id, user, med, date, scheduled, actual, status, at],
        )?;
        tx.commit()?;
        Ok(Write::Done)
      })
      .await?;

    match outcome {
      Write::Done => Ok(stored),
      Write::MissingUser => Err(CoreError::UserNotFound(stored.user_id).into()),
      Write::MissingMedication => Err(CoreError::MedicationNotFound(stored.medication_id).into()),
      Write::Duplicate => Err(
        CoreError::DuplicateStatusEvent {
          medication_id: stored.medication_id,
          date:          stored.date,
          time:          stored.scheduled_time,
        }
        .into(),
      ),
    }
  }

  async fn list_status_events(
    &self,
    user_id: &UserId,
    date: Option<NaiveDate>,
  ) -> Result<Vec<MedicationStatusEvent>> {
    let id = user_id.as_str().to_owned();
    let date = date.map(encode_date);

    let raws: Vec<RawStatusEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EVENT_COLUMNS} FROM took_medication
           WHERE user_id = ?1 AND (?2 IS NULL OR date = ?2)
           ORDER BY date, scheduled_time, recorded_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id, date], RawStatusEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStatusEvent::into_event).collect()
  }
}
