use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Normalized current weather, shaped for the prompt and the JSON response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherContext {
    #[serde(rename = "temp")]
    pub temperature: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feels_like: Option<i64>,
    pub humidity: i64,
    #[serde(rename = "wind")]
    pub wind_speed_kmh: i64,
    pub condition: String,
}

impl Default for WeatherContext {
    /// Used whenever the weather service cannot be reached or understood.
    fn default() -> Self {
        Self {
            temperature: 25,
            feels_like: None,
            humidity: 50,
            wind_speed_kmh: 5,
            condition: "Unknown".to_string(),
        }
    }
}

/// One autocomplete entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub label: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default = "unknown_city")]
    pub city: String,
    pub lat: f64,
    pub lon: f64,
}

fn unknown_city() -> String {
    "unknown".to_string()
}

impl RecommendationRequest {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }

    pub fn cache_key(&self) -> String {
        format!("rec_{}_{}_{}", self.city, self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub weather: WeatherContext,
    /// JSON text of the outfit payload, exactly as produced (or the fallback).
    pub agent_response: String,
}

/// Typed view of the payload the model is asked to return.
///
/// Every field defaults so that partial output still parses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutfitPayload {
    pub headline: String,
    pub reasoning: String,
    pub outfit_top: String,
    pub outfit_bottom: String,
    pub shoes: String,
    pub accessories: Vec<String>,
}

impl OutfitPayload {
    /// The payload served when no model produced anything usable.
    pub fn fallback() -> Self {
        Self {
            headline: "Classic Style".to_string(),
            reasoning: "Offline Mode: AI connection unavailable.".to_string(),
            outfit_top: "Cotton T-Shirt".to_string(),
            outfit_bottom: "Comfortable Jeans".to_string(),
            shoes: "Sneakers".to_string(),
            accessories: vec!["Watch".to_string(), "Sunglasses".to_string()],
        }
    }

    /// Parses model text; `None` unless it is a JSON object.
    pub fn parse(text: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    pub fn to_json(&self) -> String {
        // Plain strings and a Vec<String> cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}
