use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use outfit_core::{Config, OutfitService, ProviderId, RecommendationRequest};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "outfit", version, about = "Weather-aware outfit recommendations")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server.
    Serve {
        /// Listen address, e.g. "0.0.0.0:8080".
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print one recommendation as JSON.
    Recommend {
        #[arg(long, default_value = "unknown")]
        city: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },

    /// Print city suggestions as JSON.
    Autocomplete {
        query: String,
    },

    /// Store an API key for a provider.
    Configure {
        /// Provider short name: "openweather", "weatherapi" or "gemini".
        provider: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };

        match self.command {
            Command::Configure { provider } => configure(&config_path, &provider),
            Command::Serve { bind } => {
                let config = load_config(&config_path)?;
                let addr = bind.unwrap_or_else(|| config.bind_addr().to_string());
                let service = Arc::new(OutfitService::from_config(&config)?);
                crate::server::serve(&addr, service).await
            }
            Command::Recommend { city, lat, lon } => {
                let config = load_config(&config_path)?;
                let service = OutfitService::from_config(&config)?;
                let result = service
                    .recommend(&RecommendationRequest { city, lat, lon })
                    .await;
                println!("{}", serde_json::to_string_pretty(&result)?);
                Ok(())
            }
            Command::Autocomplete { query } => {
                let config = load_config(&config_path)?;
                let service = OutfitService::from_config(&config)?;
                let suggestions = service.autocomplete(&query).await;
                println!("{}", serde_json::to_string_pretty(&suggestions)?);
                Ok(())
            }
        }
    }
}

fn load_config(path: &std::path::Path) -> anyhow::Result<Config> {
    let mut config = Config::load_from(path)?;
    config.apply_env();
    Ok(config)
}

fn configure(path: &std::path::Path, provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load_from(path)?;

    let api_key = inquire::Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;

    config.upsert_provider_api_key(id, api_key.trim().to_string());
    config.save_to(path)?;

    println!("Saved {id} API key to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_with_bind() {
        let cli = Cli::try_parse_from(["outfit", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        assert!(matches!(cli.command, Command::Serve { bind: Some(ref b) } if b == "0.0.0.0:8080"));
    }

    #[test]
    fn parses_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "outfit", "recommend", "--city", "Lima", "--lat", "-12.05", "--lon", "-77.04",
        ])
        .unwrap();

        match cli.command {
            Command::Recommend { city, lat, lon } => {
                assert_eq!(city, "Lima");
                assert_eq!(lat, -12.05);
                assert_eq!(lon, -77.04);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["outfit", "autocomplete", "Pune", "--config", "/tmp/o.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/o.toml")));
    }

    #[test]
    fn recommend_requires_coordinates() {
        assert!(Cli::try_parse_from(["outfit", "recommend", "--city", "Pune"]).is_err());
    }
}
