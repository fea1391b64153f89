//! SQLite backend for the Pillwatch medication store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The graph of users, medications and
//! their relationships is kept in plain edge tables.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
