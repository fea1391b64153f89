//! SQL schema for the Pillwatch SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,   -- identity provider id
    first_name  TEXT NOT NULL DEFAULT '',
    last_name   TEXT NOT NULL DEFAULT '',
    email       TEXT NOT NULL DEFAULT '',
    phone       TEXT NOT NULL DEFAULT '',
    age         INTEGER,
    sex         TEXT,
    role        TEXT,               -- 'elder' | 'caretaker' | NULL before onboarding
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS medications (
    medication_id TEXT PRIMARY KEY,
    name          TEXT NOT NULL UNIQUE
);

-- TAKES: one schedule per (user, medication).
CREATE TABLE IF NOT EXISTS takes (
    user_id       TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    medication_id TEXT NOT NULL REFERENCES medications(medication_id),
    schedule_json TEXT NOT NULL,
    PRIMARY KEY (user_id, medication_id)
);

-- CARES_FOR: caretaker -> elder.
CREATE TABLE IF NOT EXISTS cares_for (
    caretaker_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    elder_id     TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    created_at   TEXT NOT NULL,
    PRIMARY KEY (caretaker_id, elder_id),
    CHECK (caretaker_id != elder_id)
);

-- TOOK_MEDICATION: append-only. Never updated; rows only disappear with
-- their user.
CREATE TABLE IF NOT EXISTS took_medication (
    event_id       TEXT PRIMARY KEY,
    user_id        TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    medication_id  TEXT NOT NULL REFERENCES medications(medication_id),
    date           TEXT NOT NULL,   -- YYYY-MM-DD
    scheduled_time TEXT NOT NULL,   -- HH:MM
    actual_time    TEXT,            -- HH:MM, NULL when missed
    status         TEXT NOT NULL,   -- 'taken' | 'missed'
    recorded_at    TEXT NOT NULL,
    UNIQUE (user_id, medication_id, date, scheduled_time)
);

CREATE INDEX IF NOT EXISTS users_phone_idx     ON users(phone);
CREATE INDEX IF NOT EXISTS took_user_date_idx  ON took_medication(user_id, date);

PRAGMA user_version = 1;
";
