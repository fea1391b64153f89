//! Async HTTP client wrapping the pillwatch server.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use pillwatch_core::{
  adherence::AdherenceRecord,
  evaluator::ScheduledDose,
  medication::UserMedication,
  schedule::ClockTime,
  status::MedicationStatusEvent,
  user::{User, UserId},
};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;

/// Connection settings for the pillwatch server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// `GET /api/users/{id}/schedule` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct DaySchedule {
  pub date:  NaiveDate,
  pub doses: Vec<ScheduledDose>,
}

/// Async HTTP client for the pillwatch JSON API and session relay.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn base(&self) -> &str { self.config.base_url.trim_end_matches('/') }

  fn url(&self, path: &str) -> String { format!("{}/api{}", self.base(), path) }

  fn session_url(&self, user_id: &UserId, suffix: &str) -> String {
    format!("{}/sessions/{}{}", self.base(), user_id, suffix)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str, date: Option<NaiveDate>) -> Result<T> {
    let mut req = self.auth(self.client.get(self.url(path)));
    if let Some(date) = date {
      req = req.query(&[("date", date.to_string())]);
    }
    let resp = req.send().await.with_context(|| format!("GET {path} failed"))?;
    checked(resp, "GET", path)
      .await?
      .json()
      .await
      .with_context(|| format!("deserialising {path}"))
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  /// `GET /api/users/{id}`
  pub async fn get_user(&self, user_id: &UserId) -> Result<User> {
    self.get_json(&format!("/users/{user_id}"), None).await
  }

  /// `GET /api/users/{id}/elders`
  pub async fn list_elders(&self, user_id: &UserId) -> Result<Vec<User>> {
    self.get_json(&format!("/users/{user_id}/elders"), None).await
  }

  // ── Medications ───────────────────────────────────────────────────────────

  /// `GET /api/users/{id}/medications`
  pub async fn list_medications(&self, user_id: &UserId) -> Result<Vec<UserMedication>> {
    self.get_json(&format!("/users/{user_id}/medications"), None).await
  }

  /// `GET /api/users/{id}/schedule[?date=]`
  pub async fn schedule(&self, user_id: &UserId, date: Option<NaiveDate>) -> Result<DaySchedule> {
    self.get_json(&format!("/users/{user_id}/schedule"), date).await
  }

  /// `GET /api/users/{id}/history[?date=]`
  pub async fn history(
    &self,
    user_id: &UserId,
    date: Option<NaiveDate>,
  ) -> Result<Vec<MedicationStatusEvent>> {
    self.get_json(&format!("/users/{user_id}/history"), date).await
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  /// `POST /sessions/{id}/taken`
  pub async fn mark_taken(
    &self,
    user_id: &UserId,
    medication_name: &str,
    time: ClockTime,
  ) -> Result<AdherenceRecord> {
    let path = format!("/sessions/{user_id}/taken");
    let resp = self
      .auth(self.client.post(self.session_url(user_id, "/taken")))
      .json(&json!({ "medication_name": medication_name, "time": time }))
      .send()
      .await
      .with_context(|| format!("POST {path} failed"))?;
    checked(resp, "POST", &path)
      .await?
      .json()
      .await
      .context("deserialising adherence record")
  }
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn checked(resp: Response, method: &str, path: &str) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let message = resp
    .json::<serde_json::Value>()
    .await
    .ok()
    .and_then(|v| v["error"].as_str().map(str::to_owned))
    .unwrap_or_default();
  Err(anyhow!("{method} {path} → {status} {message}"))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client(base_url: &str) -> ApiClient {
    ApiClient::new(ApiConfig {
      base_url: base_url.into(),
      username: String::new(),
      password: String::new(),
    })
    .unwrap()
  }

  #[test]
  fn urls_split_api_and_session_paths() {
    let c = client("http://localhost:5232/");
    assert_eq!(c.url("/users/u1"), "http://localhost:5232/api/users/u1");
    assert_eq!(
      c.session_url(&"u1".into(), "/taken"),
      "http://localhost:5232/sessions/u1/taken"
    );
  }

  #[test]
  fn day_schedule_parses_server_body() {
    let body = serde_json::json!({
      "user_id": "u1",
      "date": "2024-05-15",
      "doses": [{
        "medication_id": "6f1c2a4e-8d3b-4c1e-9a7f-2b5d8e0c4a11",
        "medication_name": "DrugX",
        "time": "08:00",
        "pill_count": 2
      }]
    });
    let day: DaySchedule = serde_json::from_value(body).unwrap();
    assert_eq!(day.doses.len(), 1);
    assert_eq!(day.doses[0].time.to_string(), "08:00");
  }
}
