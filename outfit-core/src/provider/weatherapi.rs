use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::{
    model::{Coordinates, WeatherContext},
    provider::{ProviderId, round_half_even, title_case, truncate_body},
};

use super::WeatherProvider;

/// WeatherAPI.com current conditions, queried by "lat,lon".
#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: Option<String>,
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl WeatherApiProvider {
    pub fn new(http: Client, api_key: Option<String>) -> Self {
        Self {
            api_key,
            http,
            base_url: "http://api.weatherapi.com".to_string(),
            timeout: Duration::from_secs(5),
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
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    feelslike_c: f64,
    humidity: f64,
    wind_kph: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    current: WaCurrent,
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    async fn current(&self, coords: Coordinates) -> Result<WeatherContext> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No API key configured for WeatherAPI.com"))?;

        let url = format!("{}/v1/current.json", self.base_url);
        let q = format!("{},{}", coords.lat, coords.lon);

        let res = self
            .http
            .get(&url)
            .query(&[("key", api_key), ("q", q.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to send request to WeatherAPI.com (current)")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read WeatherAPI current response body")?;

        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "WeatherAPI current request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: WaResponse =
            serde_json::from_str(&body).context("Failed to parse WeatherAPI current JSON")?;
        let current = parsed.current;

        Ok(WeatherContext {
            temperature: round_half_even(current.temp_c),
            feels_like: Some(round_half_even(current.feelslike_c)),
            humidity: round_half_even(current.humidity),
            wind_speed_kmh: round_half_even(current.wind_kph),
            condition: title_case(&current.condition.text),
        })
    }
}
