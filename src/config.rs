// Gateway configuration: defaults, then an optional config.toml, then EVMARKET_* env vars

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_API_BASE_URL: &str = "https://evbikesservermernproject-jenv.onrender.com";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server_address: String,
    // Root of the external marketplace API
    pub api_base_url: String,
    // Upper price bound applied when a listing query doesn't give one
    pub default_price_max: u64,
    pub event_capacity: usize,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present
        Self::from_builder(
            Self::defaults()?
                .add_source(File::with_name("config").required(false))
                .add_source(
                    Environment::with_prefix("EVMARKET")
                        .prefix_separator("_")
                        .separator("__"),
                ),
        )
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("api_base_url", DEFAULT_API_BASE_URL)?
            .set_default("default_price_max", 500_000_u64)?
            .set_default("event_capacity", 32_u64)?)
    }

    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let settings: Settings = builder
            .build()
            .context("Failed to assemble configuration sources")?
            .try_deserialize()
            .context("Invalid configuration")?;
        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:3000".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            default_price_max: 500_000,
            event_capacity: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn defaults_match_default_impl() {
        let loaded = Settings::from_builder(Settings::defaults().unwrap()).unwrap();
        let expected = Settings::default();
        assert_eq!(loaded.server_address, expected.server_address);
        assert_eq!(loaded.api_base_url, expected.api_base_url);
        assert_eq!(loaded.default_price_max, expected.default_price_max);
        assert_eq!(loaded.event_capacity, expected.event_capacity);
    }

    #[test]
    fn toml_overrides_defaults() {
        let builder = Settings::defaults().unwrap().add_source(File::from_str(
            "api_base_url = \"http://localhost:9000\"\ndefault_price_max = 250000\n",
            FileFormat::Toml,
        ));
        let settings = Settings::from_builder(builder).unwrap();
        assert_eq!(settings.api_base_url, "http://localhost:9000");
        assert_eq!(settings.default_price_max, 250_000);
        assert_eq!(settings.server_address, "127.0.0.1:3000");
    }
}
