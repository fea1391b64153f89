//! Identity-provider user lifecycle hook (`POST /hooks/identity`).
//!
//! `user.created` and `user.updated` upsert the user's identity fields,
//! `user.deleted` removes the user, and anything else is acknowledged and
//! ignored. Only the first email address and phone number are kept.

use pillwatch_core::{
  store::MedicationStore,
  user::{UserId, UserProfile},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// The envelope the identity provider posts.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEvent {
  #[serde(rename = "type")]
  pub kind: String,
  pub data: IdentityUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityUser {
  pub id:              UserId,
  #[serde(default)]
  pub first_name:      Option<String>,
  #[serde(default)]
  pub last_name:       Option<String>,
  #[serde(default)]
  pub email_addresses: Vec<EmailAddress>,
  #[serde(default)]
  pub phone_numbers:   Vec<PhoneNumber>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailAddress {
  pub email_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhoneNumber {
  pub phone_number: String,
}

impl IdentityUser {
  /// Identity fields only; onboarding fields stay `None` so they are kept.
  pub fn profile(&self) -> UserProfile {
    UserProfile {
      first_name: self.first_name.clone().unwrap_or_default(),
      last_name: self.last_name.clone().unwrap_or_default(),
      email: self
        .email_addresses
        .first()
        .map(|e| e.email_address.clone())
        .unwrap_or_default(),
      phone: self
        .phone_numbers
        .first()
        .map(|p| p.phone_number.clone())
        .unwrap_or_default(),
      ..UserProfile::default()
    }
  }
}

/// What the hook did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HookOutcome {
  Upserted,
  Deleted,
  Ignored,
}

pub async fn apply<S: MedicationStore>(
  store: &S,
  event: &IdentityEvent,
) -> Result<HookOutcome, S::Error> {
  let id = &event.data.id;
  match event.kind.as_str() {
    "user.created" | "user.updated" => {
      store.upsert_user(id, event.data.profile()).await?;
      info!(user_id = %id, event = %event.kind, "identity synced");
      Ok(HookOutcome::Upserted)
    }
    "user.deleted" => {
      let existed = store.delete_user(id).await?;
      info!(user_id = %id, existed, "identity deleted");
      Ok(HookOutcome::Deleted)
    }
    other => {
      debug!(event = other, "ignoring identity event");
      Ok(HookOutcome::Ignored)
    }
  }
}
