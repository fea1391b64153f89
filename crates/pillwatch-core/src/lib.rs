//! Core types and trait definitions for Pillwatch.
//!
//! Schedules, the dose evaluator, the adherence log and the tick planner are
//! pure and live here, together with the store and notifier traits. This
//! crate has no HTTP or database dependencies.

// Native `async fn` in trait impls; the traits spell out `Send` futures.
#![allow(async_fn_in_trait)]

pub mod adherence;
pub mod clock;
pub mod error;
pub mod evaluator;
pub mod medication;
pub mod notify;
pub mod schedule;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod user;

pub use error::{Error, Result};
