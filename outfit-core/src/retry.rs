//! Retry policy for calls that can be routed to one of several model identifiers.
//!
//! The policy decides, per failure class, whether to try the same model again,
//! move on to the next one, or stop using a model altogether. The executor is
//! independent of the transport: it only sees `Result<T, AttemptFailure>`.

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::error::{AttemptFailure, RetryExhausted};

/// How the model list is walked when the current model is given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    /// Wrap around to the start of the list until the attempt cap is hit.
    Cyclic,
    /// Walk the list once, in order.
    Priority,
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Try the same model again while it has tries left.
    Retry,
    /// Move to the next model.
    Advance,
    /// Move to the next model and never come back to this one.
    Drop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub models: Vec<String>,
    pub rotation: Rotation,
    /// Cap on outbound calls across all models.
    pub max_attempts: u32,
    pub retries_per_model: u32,
    pub on_rate_limited: Action,
    /// Any non-success status other than 404 and 429.
    pub on_server_error: Action,
    /// Connection errors, timeouts and unreadable success bodies.
    pub on_transport_error: Action,
    pub rate_limit_delay_ms: u64,
    pub error_delay_ms: u64,
    pub transport_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::cyclic()
    }
}

fn default_models() -> Vec<String> {
    vec!["gemini-2.5-flash".to_string(), "gemini-2.0-flash".to_string()]
}

/// Result of a successful [`RetryPolicy::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub model: String,
    pub attempts: u32,
}

impl RetryPolicy {
    /// Toggle between models on every failure, six calls at most.
    pub fn cyclic() -> Self {
        Self {
            models: default_models(),
            rotation: Rotation::Cyclic,
            max_attempts: 6,
            retries_per_model: 1,
            on_rate_limited: Action::Advance,
            on_server_error: Action::Advance,
            on_transport_error: Action::Advance,
            rate_limit_delay_ms: 1500,
            error_delay_ms: 1000,
            transport_delay_ms: 1000,
        }
    }

    /// Walk the models in order, two tries each; errors other than 429 abandon a model.
    pub fn priority() -> Self {
        let models = default_models();
        let retries_per_model = 2;
        Self {
            max_attempts: models.len() as u32 * retries_per_model,
            models,
            rotation: Rotation::Priority,
            retries_per_model,
            on_rate_limited: Action::Retry,
            on_server_error: Action::Drop,
            on_transport_error: Action::Retry,
            rate_limit_delay_ms: 3000,
            error_delay_ms: 0,
            transport_delay_ms: 1000,
        }
    }

    /// Same policy with every sleep removed.
    pub fn without_delays(mut self) -> Self {
        self.rate_limit_delay_ms = 0;
        self.error_delay_ms = 0;
        self.transport_delay_ms = 0;
        self
    }

    pub fn action_for(&self, failure: &AttemptFailure) -> Action {
        match failure {
            AttemptFailure::NotFound => Action::Drop,
            AttemptFailure::RateLimited => self.on_rate_limited,
            AttemptFailure::Status(_) => self.on_server_error,
            AttemptFailure::Transport(_) | AttemptFailure::Malformed(_) => self.on_transport_error,
        }
    }

    pub fn delay_for(&self, failure: &AttemptFailure) -> Duration {
        let ms = match failure {
            AttemptFailure::RateLimited => self.rate_limit_delay_ms,
            AttemptFailure::NotFound | AttemptFailure::Status(_) => self.error_delay_ms,
            AttemptFailure::Transport(_) | AttemptFailure::Malformed(_) => self.transport_delay_ms,
        };
        Duration::from_millis(ms)
    }

    /// Runs `call` with one model identifier per attempt until it succeeds or the
    /// policy gives up.
    pub async fn execute<T, F, Fut>(&self, mut call: F) -> Result<Attempted<T>, RetryExhausted>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, AttemptFailure>>,
    {
        let mut cursor = ModelCursor::new(&self.models, self.rotation);
        let mut attempts = 0;
        let mut last = None;

        while attempts < self.max_attempts {
            let Some(model) = cursor.current() else {
                break;
            };
            attempts += 1;
            tracing::debug!(model, attempt = attempts, "Calling model");

            match call(model.to_string()).await {
                Ok(value) => {
                    tracing::info!(model, attempt = attempts, "Model call succeeded");
                    return Ok(Attempted {
                        value,
                        model: model.to_string(),
                        attempts,
                    });
                }
                Err(failure) => {
                    let action = self.action_for(&failure);
                    tracing::warn!(
                        model,
                        attempt = attempts,
                        error = %failure,
                        ?action,
                        "Model call failed"
                    );

                    cursor.record(action, self.retries_per_model.max(1));
                    let delay = self.delay_for(&failure);
                    last = Some(failure);

                    let more = attempts < self.max_attempts && cursor.current().is_some();
                    if more && !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
            }
        }

        tracing::warn!(attempts, "All model attempts failed");
        Err(RetryExhausted { attempts, last })
    }
}

/// Position in the model list for one `execute` run.
#[derive(Debug)]
struct ModelCursor<'a> {
    models: &'a [String],
    rotation: Rotation,
    index: usize,
    tries: u32,
    dropped: Vec<bool>,
}

impl<'a> ModelCursor<'a> {
    fn new(models: &'a [String], rotation: Rotation) -> Self {
        Self {
            models,
            rotation,
            index: 0,
            tries: 0,
            dropped: vec![false; models.len()],
        }
    }

    fn current(&self) -> Option<&'a str> {
        let models: &'a [String] = self.models;
        match models.get(self.index) {
            Some(model) if !self.dropped[self.index] => Some(model.as_str()),
            _ => None,
        }
    }

    fn record(&mut self, action: Action, retries_per_model: u32) {
        self.tries += 1;
        match action {
            Action::Retry if self.tries < retries_per_model => {}
            Action::Retry | Action::Advance => self.advance(),
            Action::Drop => {
                self.dropped[self.index] = true;
                self.advance();
            }
        }
    }

    fn advance(&mut self) {
        self.tries = 0;
        let len = self.models.len();
        let next = match self.rotation {
            Rotation::Priority => (self.index + 1..len).find(|&i| !self.dropped[i]),
            Rotation::Cyclic => (1..=len)
                .map(|step| (self.index + step) % len)
                .find(|&i| !self.dropped[i]),
        };
        self.index = next.unwrap_or(len);
    }
}
