use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{cache::DEFAULT_MAX_ENTRIES, provider::ProviderId, retry::RetryPolicy};

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Credentials for a single upstream (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Skip TLS certificate verification on every upstream call.
    pub insecure_tls: bool,
    pub weather_timeout_secs: u64,
    pub geocode_timeout_secs: u64,
    pub generate_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            insecure_tls: true,
            weather_timeout_secs: 5,
            geocode_timeout_secs: 3,
            generate_timeout_secs: 8,
        }
    }
}

/// Base URLs of the upstream services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub openweather: String,
    pub weatherapi: String,
    pub geocoding: String,
    pub gemini: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            openweather: "https://api.openweathermap.org".to_string(),
            weatherapi: "http://api.weatherapi.com".to_string(),
            geocoding: "https://geocoding-api.open-meteo.com".to_string(),
            gemini: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub recommendations: bool,
    pub recommendation_ttl_secs: u64,
    pub autocomplete: bool,
    pub autocomplete_ttl_secs: u64,
    /// Per-cache entry cap.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            recommendations: true,
            recommendation_ttl_secs: 600,
            autocomplete: true,
            autocomplete_ttl_secs: 300,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Listen address for `outfit serve`, e.g. "0.0.0.0:8080".
    pub bind: Option<String>,

    /// Weather provider id, "openweather" (default) or "weatherapi".
    pub weather_provider: Option<String>,

    /// Reject model output that is not a JSON object and serve the fallback instead.
    pub strict_payload: bool,

    /// Example TOML:
    /// [providers.gemini]
    /// api_key = "..."
    pub providers: HashMap<String, ProviderConfig>,

    pub http: HttpConfig,
    pub endpoints: Endpoints,
    pub retry: RetryPolicy,
    pub cache: CacheConfig,
}

impl Config {
    pub fn bind_addr(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }

    /// The configured weather provider, OpenWeather when unset.
    pub fn weather_provider_id(&self) -> Result<ProviderId> {
        let Some(s) = self.weather_provider.as_deref() else {
            return Ok(ProviderId::OpenWeather);
        };

        let id = ProviderId::try_from(s)?;
        if !id.is_weather() {
            return Err(anyhow!(
                "'{id}' is not a weather provider. \
                 Supported weather providers: openweather, weatherapi."
            ));
        }
        Ok(id)
    }

    pub fn set_weather_provider(&mut self, id: ProviderId) {
        self.weather_provider = Some(id.as_str().to_string());
    }

    /// Load config from `path`, or return defaults if it doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "outfit-agent", "outfit")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay API keys and bind address from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for id in ProviderId::all() {
            if let Some(key) = lookup(id.env_var()).filter(|k| !k.trim().is_empty()) {
                self.providers.insert(id.as_str().to_string(), ProviderConfig { api_key: key });
            }
        }
        if let Some(bind) = lookup("OUTFIT_BIND").filter(|b| !b.trim().is_empty()) {
            self.bind = Some(bind);
        }
    }

    /// Set/replace an API key; the first weather provider configured becomes the default.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });

        if provider_id.is_weather() && self.weather_provider.is_none() {
            self.weather_provider = Some(provider_id.to_string());
        }
    }

    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers
            .get(provider_id.as_str())
            .map(|cfg| cfg.api_key.as_str())
            .filter(|k| !k.is_empty())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }
}
