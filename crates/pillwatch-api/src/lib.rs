//! JSON REST API for Pillwatch.
//!
//! Exposes an axum [`Router`] backed by any
//! [`pillwatch_core::store::MedicationStore`]. Auth, TLS and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", pillwatch_api::api_router(store.clone(), clock.clone()))
//! ```

pub mod error;
pub mod medications;
pub mod schedule;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, put},
};
use pillwatch_core::{clock::Clock, store::MedicationStore, user::UserId};

pub use error::ApiError;

/// Called after `DELETE /users/{id}` removed a user.
pub type UserDeletedHook = Arc<dyn Fn(&UserId) + Send + Sync>;

/// State shared by every API handler.
pub struct ApiState<S> {
  pub store:           Arc<S>,
  /// Local time, used when a request does not name a date.
  pub clock:           Arc<dyn Clock>,
  pub on_user_deleted: Option<UserDeletedHook>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:           self.store.clone(),
      clock:           self.clock.clone(),
      on_user_deleted: self.on_user_deleted.clone(),
    }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, clock: Arc<dyn Clock>) -> Router<()>
where
  S: MedicationStore + 'static,
{
  router_with_state(ApiState { store, clock, on_user_deleted: None })
}

/// Like [`api_router`], calling `on_user_deleted` for every deleted user so
/// the host can drop state it keeps per user.
pub fn api_router_with_delete_hook<S>(
  store: Arc<S>,
  clock: Arc<dyn Clock>,
  on_user_deleted: UserDeletedHook,
) -> Router<()>
where
  S: MedicationStore + 'static,
{
  router_with_state(ApiState { store, clock, on_user_deleted: Some(on_user_deleted) })
}

fn router_with_state<S>(state: ApiState<S>) -> Router<()>
where
  S: MedicationStore + 'static,
{
  Router::new()
    // Users
    .route("/users", get(users::find_by_phone::<S>))
    .route(
      "/users/{id}",
      get(users::get_one::<S>)
        .put(users::upsert::<S>)
        .delete(users::delete_one::<S>),
    )
    .route(
      "/users/{id}/elders",
      get(users::list_elders::<S>).post(users::add_elder::<S>),
    )
    // Medications
    .route(
      "/users/{id}/medications",
      get(medications::list::<S>).post(medications::add::<S>),
    )
    .route(
      "/users/{id}/medications/{med_id}",
      put(medications::replace_schedule::<S>).delete(medications::remove::<S>),
    )
    // Evaluated schedule and history
    .route("/users/{id}/schedule", get(schedule::for_date::<S>))
    .route("/users/{id}/history", get(schedule::history::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
