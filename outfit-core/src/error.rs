use thiserror::Error;

/// Why a single call to the generative service did not produce text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    #[error("rate limited (429)")]
    RateLimited,

    #[error("model not found (404)")]
    NotFound,

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl AttemptFailure {
    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            404 => Self::NotFound,
            other => Self::Status(other),
        }
    }
}

/// Every attempt allowed by the retry policy failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "all {attempts} attempts failed{}",
    .last.as_ref().map(|f| format!(", last error: {f}")).unwrap_or_default()
)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last: Option<AttemptFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(AttemptFailure::from_status(429), AttemptFailure::RateLimited);
        assert_eq!(AttemptFailure::from_status(404), AttemptFailure::NotFound);
        assert_eq!(AttemptFailure::from_status(503), AttemptFailure::Status(503));
    }

    #[test]
    fn exhausted_message_mentions_last_failure() {
        let err = RetryExhausted {
            attempts: 6,
            last: Some(AttemptFailure::RateLimited),
        };
        assert_eq!(err.to_string(), "all 6 attempts failed, last error: rate limited (429)");

        let err = RetryExhausted {
            attempts: 0,
            last: None,
        };
        assert_eq!(err.to_string(), "all 0 attempts failed");
    }
}
