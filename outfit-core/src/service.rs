use std::{sync::Arc, time::Duration};

use crate::{
    cache::TtlCache,
    config::Config,
    generate::GeminiClient,
    geocode::Geocoder,
    http::build_client,
    model::{RecommendationRequest, RecommendationResult, Suggestion},
    provider::{ProviderId, WeatherProvider, weather_or_default, weather_provider_from_config},
    recommend::Recommender,
};

/// Everything a request handler needs, built once and shared.
#[derive(Debug)]
pub struct OutfitService {
    weather: Arc<dyn WeatherProvider>,
    geocoder: Geocoder,
    recommender: Recommender,
    recommendations: Option<TtlCache<RecommendationResult>>,
    suggestions: Option<TtlCache<Vec<Suggestion>>>,
}

impl OutfitService {
    /// A service with no caching.
    pub fn new(
        weather: Arc<dyn WeatherProvider>,
        geocoder: Geocoder,
        recommender: Recommender,
    ) -> Self {
        Self {
            weather,
            geocoder,
            recommender,
            recommendations: None,
            suggestions: None,
        }
    }

    pub fn with_recommendation_cache(mut self, ttl: Duration, max_entries: usize) -> Self {
        self.recommendations = Some(TtlCache::new(ttl).with_max_entries(max_entries));
        self
    }

    pub fn with_autocomplete_cache(mut self, ttl: Duration, max_entries: usize) -> Self {
        self.suggestions = Some(TtlCache::new(ttl).with_max_entries(max_entries));
        self
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = build_client(&config.http)?;

        let weather: Arc<dyn WeatherProvider> =
            weather_provider_from_config(config, http.clone())?.into();

        let geocoder = Geocoder::new(http.clone())
            .with_base_url(&config.endpoints.geocoding)
            .with_timeout(Duration::from_secs(config.http.geocode_timeout_secs));

        let gemini_key = config.provider_api_key(ProviderId::Gemini).map(str::to_owned);
        if gemini_key.is_none() {
            tracing::warn!(
                "No Gemini API key configured; every recommendation will be the fallback outfit. \
                 Hint: set {}.",
                ProviderId::Gemini.env_var()
            );
        }
        let gemini = GeminiClient::new(http, gemini_key)
            .with_base_url(&config.endpoints.gemini)
            .with_timeout(Duration::from_secs(config.http.generate_timeout_secs));
        let recommender = Recommender::new(Arc::new(gemini), config.retry.clone())
            .with_strict_payload(config.strict_payload);

        let cache = &config.cache;
        let mut service = Self::new(weather, geocoder, recommender);
        if cache.recommendations {
            service = service.with_recommendation_cache(
                Duration::from_secs(cache.recommendation_ttl_secs),
                cache.max_entries,
            );
        }
        if cache.autocomplete {
            service = service.with_autocomplete_cache(
                Duration::from_secs(cache.autocomplete_ttl_secs),
                cache.max_entries,
            );
        }
        Ok(service)
    }

    /// Evicts expired cache entries, returning how many were dropped.
    pub fn purge_caches(&self) -> usize {
        let recommendations = self
            .recommendations
            .as_ref()
            .map_or(0, TtlCache::purge_expired);
        let suggestions = self.suggestions.as_ref().map_or(0, TtlCache::purge_expired);
        recommendations + suggestions
    }

    /// City suggestions for `query`; never fails.
    pub async fn autocomplete(&self, query: &str) -> Vec<Suggestion> {
        if !Geocoder::accepts(query) {
            return Vec::new();
        }

        let key = format!("ac_{query}");
        if let Some(hit) = self.suggestions.as_ref().and_then(|c| c.get(&key)) {
            tracing::debug!(query, "Serving suggestions from cache");
            return hit;
        }

        let suggestions = self.geocoder.suggest(query).await;
        if let Some(cache) = &self.suggestions {
            if !suggestions.is_empty() {
                cache.insert(key, suggestions.clone());
            }
        }
        suggestions
    }

    /// Weather plus an outfit for the request; never fails.
    ///
    /// Only model-generated outfits are cached, so a fallback is retried next time.
    pub async fn recommend(&self, request: &RecommendationRequest) -> RecommendationResult {
        let key = request.cache_key();
        if let Some(hit) = self.recommendations.as_ref().and_then(|c| c.get(&key)) {
            tracing::info!(city = %request.city, "Serving recommendation from cache");
            return hit;
        }

        tracing::info!(
            city = %request.city,
            lat = request.lat,
            lon = request.lon,
            "New recommendation request"
        );

        let weather = weather_or_default(self.weather.as_ref(), request.coordinates()).await;
        let recommendation = self.recommender.recommend(&weather).await;
        let generated = recommendation.is_generated();

        let result = RecommendationResult {
            weather,
            agent_response: recommendation.into_payload_text(),
        };

        if generated {
            if let Some(cache) = &self.recommendations {
                cache.insert(key, result.clone());
            }
        }
        result
    }
}
