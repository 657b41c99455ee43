//! Core library for the outfit agent.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Weather providers and city geocoding
//! - The generative-text client and the retry policy that drives it
//! - Outfit recommendation with its fallback payload and response caching
//!
//! It is used by `outfit-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod config;
pub mod error;
pub mod generate;
pub mod geocode;
pub mod http;
pub mod model;
pub mod provider;
pub mod recommend;
pub mod retry;
pub mod service;

pub use config::{Config, ProviderConfig};
pub use error::{AttemptFailure, RetryExhausted};
pub use model::{
    Coordinates, OutfitPayload, RecommendationRequest, RecommendationResult, Suggestion,
    WeatherContext,
};
pub use provider::{ProviderId, WeatherProvider};
pub use recommend::{Recommendation, Recommender};
pub use retry::RetryPolicy;
pub use service::OutfitService;
