//! openFDA drug-name lookup used when adding a medication.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

pub const OPENFDA_BASE_URL: &str = "https://api.fda.gov";

/// Queries shorter than this never hit the network.
pub const MIN_QUERY_LEN: usize = 3;

const RESULT_LIMIT: usize = 5;

/// One product from the NDC directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DrugMatch {
  #[serde(default)]
  pub brand_name:   String,
  #[serde(default)]
  pub generic_name: String,
}

impl DrugMatch {
  /// Brand name, or the generic name when the brand is blank.
  pub fn display_name(&self) -> &str {
    if self.brand_name.trim().is_empty() {
      &self.generic_name
    } else {
      &self.brand_name
    }
  }
}

#[derive(Deserialize)]
struct NdcResponse {
  #[serde(default)]
  results: Vec<DrugMatch>,
}

#[derive(Clone)]
pub struct FdaClient {
  client:   Client,
  base_url: String,
}

impl FdaClient {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(15))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url: base_url.into() })
  }

  /// Search brand and generic names. At most five results.
  pub async fn search(&self, query: &str) -> Result<Vec<DrugMatch>> {
    let Some(url) = self.search_url(query)? else {
      return Ok(Vec::new());
    };
    let resp = self
      .client
      .get(url)
      .send()
      .await
      .context("openFDA request failed")?;

    // openFDA answers "no matches" with a 404.
    if resp.status() == StatusCode::NOT_FOUND {
      return Ok(Vec::new());
    }
    if !resp.status().is_success() {
      return Err(anyhow!("openFDA → {}", resp.status()));
    }
    let body: NdcResponse = resp.json().await.context("deserialising openFDA results")?;
    Ok(body.results)
  }

  /// `None` when the query is too short to search.
  fn search_url(&self, query: &str) -> Result<Option<Url>> {
    let term: String = query
      .trim()
      .chars()
      .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-'))
      .collect();
    if term.chars().count() < MIN_QUERY_LEN {
      return Ok(None);
    }
    let mut url = Url::parse(&format!("{}/drug/ndc.json", self.base_url.trim_end_matches('/')))
      .context("invalid openFDA base URL")?;
    // `+` separates the two clauses and must not be percent-encoded.
    url.set_query(Some(&format!(
      "search=(brand_name:\"{term}\"+generic_name:\"{term}\")&limit={RESULT_LIMIT}"
    )));
    Ok(Some(url))
  }
}
