//! Users and the elder/caretaker roles.
//!
//! Identity is owned by an external provider. A user is keyed by the
//! provider's opaque id; this crate never mints ids of its own for people.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The identity provider's id for a user (e.g. `user_2ab…`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for UserId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for UserId {
  fn from(s: String) -> Self { Self(s) }
}

/// Which side of a care relationship a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Elder,
  Caretaker,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Role::Elder => "elder",
      Role::Caretaker => "caretaker",
    }
  }
}

impl FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "elder" => Ok(Role::Elder),
      "caretaker" => Ok(Role::Caretaker),
      _ => Err(Error::UnknownRole(s.to_owned())),
    }
  }
}

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:    UserId,
  pub first_name: String,
  pub last_name:  String,
  pub email:      String,
  pub phone:      String,
  pub age:        Option<u32>,
  pub sex:        Option<String>,
  /// `None` until the user has completed onboarding.
  pub role:       Option<Role>,
  pub created_at: DateTime<Utc>,
}

impl User {
  pub fn display_name(&self) -> String {
    let full = format!("{} {}", self.first_name, self.last_name);
    let full = full.trim();
    if full.is_empty() {
      self.user_id.to_string()
    } else {
      full.to_owned()
    }
  }

  pub fn is_caretaker(&self) -> bool { self.role == Some(Role::Caretaker) }
}

/// Input to [`crate::store::MedicationStore::upsert_user`].
///
/// Identity fields (names, email, phone) always overwrite the stored values.
/// Onboarding fields (`age`, `sex`, `role`) only overwrite when `Some`, so an
/// identity-provider update never erases what the user entered during
/// onboarding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name:  String,
  #[serde(default)]
  pub email:      String,
  #[serde(default)]
  pub phone:      String,
  pub age:        Option<u32>,
  pub sex:        Option<String>,
  pub role:       Option<Role>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn user(first: &str, last: &str) -> User {
    User {
      user_id:    "user_1".into(),
      first_name: first.into(),
      last_name:  last.into(),
      email:      String::new(),
      phone:      String::new(),
      age:        None,
      sex:        None,
      role:       Some(Role::Elder),
      created_at: Utc::now(),
    }
  }

  #[test]
  fn display_name_joins_names() {
    assert_eq!(user("Ada", "Lovelace").display_name(), "Ada Lovelace");
    assert_eq!(user("Ada", "").display_name(), "Ada");
  }

  #[test]
  fn display_name_falls_back_to_id() {
    assert_eq!(user("", "").display_name(), "user_1");
  }

  #[test]
  fn role_uses_lowercase_wire_names() {
    let json = serde_json::to_string(&Role::Caretaker).unwrap();
    assert_eq!(json, "\"caretaker\"");
  }

  #[test]
  fn role_parses_case_insensitively() {
    assert_eq!("Caretaker".parse::<Role>().unwrap(), Role::Caretaker);
    assert_eq!(Role::Elder.as_str().parse::<Role>().unwrap(), Role::Elder);
    assert!("nurse".parse::<Role>().is_err());
  }
}
