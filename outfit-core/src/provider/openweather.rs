use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::{
    model::{Coordinates, WeatherContext},
    provider::{ProviderId, round_half_even, title_case, truncate_body},
};

use super::WeatherProvider;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: Option<String>,
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl OpenWeatherProvider {
    pub fn new(http: Client, api_key: Option<String>) -> Self {
        Self {
            api_key,
            http,
            base_url: "https://api.openweathermap.org".to_string(),
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
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

/// `cod` is a number on success but a string on some errors.
#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    cod: serde_json::Value,
    main: Option<OwMain>,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: Option<OwWind>,
}

impl OwCurrentResponse {
    fn into_context(self) -> Result<WeatherContext> {
        let code = match &self.cod {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        };
        if code != Some(200) {
            return Err(anyhow!("OpenWeather reported code {}", self.cod));
        }

        let main = self.main.context("OpenWeather response has no 'main' block")?;
        let wind = self.wind.context("OpenWeather response has no 'wind' block")?;
        let description = self
            .weather
            .first()
            .map(|w| w.description.as_str())
            .context("OpenWeather response has no weather description")?;

        Ok(WeatherContext {
            temperature: round_half_even(main.temp),
            feels_like: Some(round_half_even(main.feels_like)),
            humidity: round_half_even(main.humidity),
            wind_speed_kmh: round_half_even(wind.speed * 3.6),
            condition: title_case(description),
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    async fn current(&self, coords: Coordinates) -> Result<WeatherContext> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("No API key configured for OpenWeather"))?;

        let url = format!("{}/data/2.5/weather", self.base_url);
        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", coords.lat.to_string()),
                ("lon", coords.lon.to_string()),
                ("appid", api_key.to_string()),
                ("units", "metric".to_string()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to send request to OpenWeather (current weather)")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read OpenWeather current response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather current request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: OwCurrentResponse =
            serde_json::from_str(&body).context("Failed to parse OpenWeather current JSON")?;

        parsed.into_context()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::weather_or_default;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenWeatherProvider {
        OpenWeatherProvider::new(Client::new(), Some("OW_KEY".to_string()))
            .with_base_url(&server.uri())
            .with_timeout(Duration::from_millis(500))
    }

    fn ok_body() -> serde_json::Value {
        serde_json::json!({
            "cod": 200,
            "name": "Delhi",
            "main": {"temp": 30.4, "feels_like": 33.6, "humidity": 40},
            "wind": {"speed": 2.5},
            "weather": [{"description": "clear sky"}]
        })
    }

    #[tokio::test]
    async fn maps_current_weather() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("lat", "28.6"))
            .and(query_param("lon", "77.2"))
            .and(query_param("appid", "OW_KEY"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = provider(&server).current(Coordinates::new(28.6, 77.2)).await.unwrap();

        assert_eq!(
            ctx,
            WeatherContext {
                temperature: 30,
                feels_like: Some(34),
                humidity: 40,
                wind_speed_kmh: 9,
                condition: "Clear Sky".to_string(),
            }
        );
    }

    #[test]
    fn half_degrees_round_to_even() {
        let parsed: OwCurrentResponse = serde_json::from_value(serde_json::json!({
            "cod": "200",
            "main": {"temp": 22.5, "feels_like": 24.5, "humidity": 60.5},
            "wind": {"speed": 2.5},
            "weather": [{"description": "few clouds"}]
        }))
        .unwrap();

        let ctx = parsed.into_context().unwrap();
        assert_eq!(ctx.temperature, 22);
        assert_eq!(ctx.feels_like, Some(24));
        assert_eq!(ctx.humidity, 60);
        assert_eq!(ctx.wind_speed_kmh, 9);
    }

    #[tokio::test]
    async fn non_200_code_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"cod": "400", "message": "wrong latitude"})),
            )
            .mount(&server)
            .await;

        let err = provider(&server).current(Coordinates::new(900.0, 0.0)).await.unwrap_err();
        assert!(err.to_string().contains("code"));
    }

    #[tokio::test]
    async fn failures_fall_back_to_defaults() {
        let cases = [
            ResponseTemplate::new(500).set_body_string("boom"),
            ResponseTemplate::new(200).set_body_string("not json"),
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"cod": 200, "weather": []})),
            ResponseTemplate::new(200).set_body_json(ok_body()).set_delay(Duration::from_secs(2)),
        ];

        for template in cases {
            let server = MockServer::start().await;
            Mock::given(method("GET")).respond_with(template).mount(&server).await;

            let ctx = weather_or_default(&provider(&server), Coordinates::new(1.0, 2.0)).await;
            assert_eq!(ctx, WeatherContext::default());
        }
    }

    #[tokio::test]
    async fn missing_key_skips_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(0)
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::new(Client::new(), None).with_base_url(&server.uri());
        let ctx = weather_or_default(&provider, Coordinates::new(1.0, 2.0)).await;
        assert_eq!(ctx, WeatherContext::default());
    }
}
