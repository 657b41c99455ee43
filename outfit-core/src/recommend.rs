//! Outfit recommendation: prompt construction, the retrying model call and
//! post-processing of the model's text.

use std::sync::Arc;

use crate::{
    error::RetryExhausted,
    generate::TextGenerator,
    model::{OutfitPayload, WeatherContext},
    retry::{Attempted, RetryPolicy},
};

/// Prompt asking the model for the six-field outfit JSON.
pub fn build_prompt(weather: &WeatherContext) -> String {
    let mut conditions = format!("{}C, {}", weather.temperature, weather.condition);
    if let Some(feels_like) = weather.feels_like {
        conditions.push_str(&format!(" (feels like {feels_like}C)"));
    }
    conditions.push_str(&format!(
        ", humidity {}%, wind {} km/h",
        weather.humidity, weather.wind_speed_kmh
    ));

    format!(
        r#"Act as a Style Agent.
Weather: {conditions}.

Return STRICT JSON: {{
    "headline": "Short Headline", "outfit_top": "Top", "outfit_bottom": "Bottom",
    "shoes": "Shoes", "accessories": ["Item1"], "reasoning": "Why"
}}"#
    )
}

/// Removes markdown code fences (with or without a `json` tag) and surrounding whitespace.
pub fn strip_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recommendation {
    Generated { text: String, model: String },
    Fallback,
}

impl Recommendation {
    pub fn is_generated(&self) -> bool {
        matches!(self, Recommendation::Generated { .. })
    }

    /// Text for `agent_response`.
    pub fn into_payload_text(self) -> String {
        match self {
            Recommendation::Generated { text, .. } => text,
            Recommendation::Fallback => OutfitPayload::fallback().to_json(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recommender {
    generator: Arc<dyn TextGenerator>,
    policy: RetryPolicy,
    strict_payload: bool,
}

impl Recommender {
    pub fn new(generator: Arc<dyn TextGenerator>, policy: RetryPolicy) -> Self {
        Self {
            generator,
            policy,
            strict_payload: false,
        }
    }

    /// Reject output that does not parse as an outfit object.
    pub fn with_strict_payload(mut self, strict: bool) -> Self {
        self.strict_payload = strict;
        self
    }

    /// Raw model text for `prompt`, tried across models per the retry policy.
    pub async fn call_with_retry(&self, prompt: &str) -> Result<Attempted<String>, RetryExhausted> {
        let generator = &self.generator;
        self.policy
            .execute(|model| async move { generator.generate(&model, prompt).await })
            .await
    }

    /// A recommendation for `weather`; never fails, degrades to [`Recommendation::Fallback`].
    pub async fn recommend(&self, weather: &WeatherContext) -> Recommendation {
        if !self.generator.is_configured() {
            tracing::warn!("Generative API key missing, serving fallback outfit");
            return Recommendation::Fallback;
        }

        let prompt = build_prompt(weather);
        let attempted = match self.call_with_retry(&prompt).await {
            Ok(attempted) => attempted,
            Err(e) => {
                tracing::warn!(error = %e, "All AI attempts failed, serving fallback outfit");
                return Recommendation::Fallback;
            }
        };

        let text = strip_fences(&attempted.value);
        if OutfitPayload::parse(&text).is_none() {
            if self.strict_payload {
                tracing::warn!(
                    model = %attempted.model,
                    "Model output is not an outfit object, serving fallback"
                );
                return Recommendation::Fallback;
            }
            tracing::warn!(
                model = %attempted.model,
                "Model output is not an outfit object, passing through"
            );
        }

        Recommendation::Generated {
            text,
            model: attempted.model,
        }
    }
}
