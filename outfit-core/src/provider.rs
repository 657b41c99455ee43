use crate::{
    Config, Coordinates, WeatherContext,
    provider::{openweather::OpenWeatherProvider, weatherapi::WeatherApiProvider},
};
use async_trait::async_trait;
use reqwest::Client;
use std::{convert::TryFrom, fmt::Debug, time::Duration};

pub mod openweather;
pub mod weatherapi;

/// Upstream services that need an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    WeatherApi,
    Gemini,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::WeatherApi => "weatherapi",
            ProviderId::Gemini => "gemini",
        }
    }

    /// Environment variable that overrides the stored key.
    pub fn env_var(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "OPENWEATHER_API_KEY",
            ProviderId::WeatherApi => "WEATHERAPI_API_KEY",
            ProviderId::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn is_weather(&self) -> bool {
        !matches!(self, ProviderId::Gemini)
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::WeatherApi, ProviderId::Gemini]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            "gemini" => Ok(ProviderId::Gemini),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, weatherapi, gemini."
            )),
        }
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn current(&self, coords: Coordinates) -> anyhow::Result<WeatherContext>;
}

/// Current weather, or [`WeatherContext::default`] on any failure.
pub async fn weather_or_default(
    provider: &dyn WeatherProvider,
    coords: Coordinates,
) -> WeatherContext {
    match provider.current(coords).await {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::warn!(
                provider = %provider.id(),
                error = %format!("{e:#}"),
                "Weather lookup failed, using defaults"
            );
            WeatherContext::default()
        }
    }
}

/// Build the configured weather provider.
///
/// A missing API key is not an error: the provider is still built and every
/// lookup fails over to the default context.
pub fn weather_provider_from_config(
    config: &Config,
    http: Client,
) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let id = config.weather_provider_id()?;
    let api_key = config.provider_api_key(id).map(str::to_owned);
    if api_key.is_none() {
        tracing::warn!(
            provider = %id,
            "No API key configured; weather will use defaults. \
             Hint: set {} or run `outfit configure {id}`.",
            id.env_var()
        );
    }

    let timeout = Duration::from_secs(config.http.weather_timeout_secs);
    let boxed: Box<dyn WeatherProvider> = match id {
        ProviderId::OpenWeather => Box::new(
            OpenWeatherProvider::new(http, api_key)
                .with_base_url(&config.endpoints.openweather)
                .with_timeout(timeout),
        ),
        ProviderId::WeatherApi => Box::new(
            WeatherApiProvider::new(http, api_key)
                .with_base_url(&config.endpoints.weatherapi)
                .with_timeout(timeout),
        ),
        ProviderId::Gemini => anyhow::bail!("'{id}' is not a weather provider"),
    };

    Ok(boxed)
}

/// Halves go to the even neighbour: 22.5 -> 22, 23.5 -> 24.
pub(crate) fn round_half_even(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// "clear sky" -> "Clear Sky", "moderate/heavy rain" -> "Moderate/Heavy Rain".
///
/// A letter is capitalized when it follows any non-letter, the rest are lowercased.
pub(crate) fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
