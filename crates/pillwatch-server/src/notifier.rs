//! Reminder delivery channels.
//!
//! `log` writes reminders through `tracing`; `webhook` POSTs them as JSON.
//! [`ConfiguredNotifier`] picks one from the `[notifier]` config table.

use pillwatch_core::notify::{Notifier, Reminder};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("webhook request failed: {0}")]
  Http(#[from] reqwest::Error),
}

// ─── Settings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
  #[default]
  Log,
  Webhook,
}

/// The `[notifier]` config table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifierSettings {
  #[serde(default)]
  pub kind:        NotifierKind,
  pub webhook_url: Option<String>,
}

// ─── Log ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  type Error = NotifyError;

  async fn notify(&self, reminder: &Reminder) -> Result<(), NotifyError> {
    info!(
      user_id = %reminder.user_id,
      medication = %reminder.medication_name,
      time = %reminder.time,
      pills = reminder.pill_count,
      tag = %reminder.tag,
      "{}",
      reminder.title,
    );
    Ok(())
  }

  fn channel_name(&self) -> &str { "log" }
}

// ─── Webhook ─────────────────────────────────────────────────────────────────

/// POSTs each reminder as JSON to a fixed URL. Non-2xx responses are errors.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
  url:    String,
  /// Shared HTTP client (connection pooling).
  client: reqwest::Client,
}

impl WebhookNotifier {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      url:    url.into(),
      client: reqwest::Client::new(),
    }
  }

  pub fn url(&self) -> &str { &self.url }
}

impl Notifier for WebhookNotifier {
  type Error = NotifyError;

  async fn notify(&self, reminder: &Reminder) -> Result<(), NotifyError> {
    self
      .client
      .post(&self.url)
      .json(reminder)
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }

  fn channel_name(&self) -> &str { "webhook" }
}

// ─── Configured ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum ConfiguredNotifier {
  Log(LogNotifier),
  Webhook(WebhookNotifier),
}

impl ConfiguredNotifier {
  pub fn from_settings(settings: &NotifierSettings) -> crate::Result<Self> {
    match settings.kind {
      NotifierKind::Log => Ok(Self::Log(LogNotifier)),
      NotifierKind::Webhook => {
        let url = settings
          .webhook_url
          .as_deref()
          .filter(|u| !u.trim().is_empty())
          .ok_or_else(|| {
            crate::Error::Config("notifier.kind = \"webhook\" requires notifier.webhook_url".into())
          })?;
        Ok(Self::Webhook(WebhookNotifier::new(url)))
      }
    }
  }
}

impl Notifier for ConfiguredNotifier {
  type Error = NotifyError;

  async fn notify(&self, reminder: &Reminder) -> Result<(), NotifyError> {
    match self {
      Self::Log(n) => n.notify(reminder).await,
      Self::Webhook(n) => n.notify(reminder).await,
    }
  }

  fn channel_name(&self) -> &str {
    match self {
      Self::Log(n) => n.channel_name(),
      Self::Webhook(n) => n.channel_name(),
    }
  }
}
