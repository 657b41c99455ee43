use anyhow::{Context, Result};
use reqwest::Client;

use crate::config::HttpConfig;

/// Shared outbound client. Timeouts are set per request by each adapter.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    if config.insecure_tls {
        tracing::warn!("TLS certificate verification is disabled for upstream calls");
    }

    Client::builder()
        .danger_accept_invalid_certs(config.insecure_tls)
        .user_agent(concat!("outfit-agent/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}
