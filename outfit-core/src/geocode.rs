//! City autocomplete backed by the Open-Meteo geocoding search.
//! Free, no API key required.

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::model::Suggestion;

const MIN_QUERY_CHARS: usize = 2;
const MAX_RESULTS: usize = 5;

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    results: Vec<GeoResult>,
}

#[derive(Debug, Deserialize)]
struct GeoResult {
    name: String,
    country: Option<String>,
    admin1: Option<String>,
    latitude: f64,
    longitude: f64,
}

impl From<GeoResult> for Suggestion {
    fn from(r: GeoResult) -> Self {
        Suggestion {
            label: format!(
                "{}, {} ({})",
                r.name,
                r.country.unwrap_or_default(),
                r.admin1.unwrap_or_default()
            ),
            lat: r.latitude,
            lon: r.longitude,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Geocoder {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl Geocoder {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: "https://geocoding-api.open-meteo.com".to_string(),
            timeout: Duration::from_secs(3),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether `query` is long enough to be worth a lookup.
    pub fn accepts(query: &str) -> bool {
        query.chars().count() >= MIN_QUERY_CHARS
    }

    /// Up to five suggestions; empty for short queries or on any failure.
    pub async fn suggest(&self, query: &str) -> Vec<Suggestion> {
        if !Self::accepts(query) {
            return Vec::new();
        }

        match self.search(query).await {
            Ok(suggestions) => suggestions,
            Err(e) => {
                tracing::warn!(query, error = %format!("{e:#}"), "Geocoding lookup failed");
                Vec::new()
            }
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<Suggestion>> {
        let url = format!("{}/v1/search", self.base_url);
        let res = self
            .http
            .get(&url)
            .query(&[
                ("name", query),
                ("count", "5"),
                ("language", "en"),
                ("format", "json"),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to send geocoding request")?;

        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("Geocoding request failed with status {status}"));
        }

        let body: GeoResponse = res.json().await.context("Failed to parse geocoding JSON")?;

        Ok(body.results.into_iter().take(MAX_RESULTS).map(Suggestion::from).collect())
    }
}
