//! Server configuration

use anyhow::{Context, Result};
use predictor_lib::config::{Settings, ENV_PREFIX};
use serde::Deserialize;
use std::path::Path;

/// Pipeline settings plus the HTTP listener port
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub api_port: u16,
    pub settings: Settings,
}

#[derive(Debug, Deserialize)]
struct ListenerSection {
    #[serde(default = "default_api_port")]
    api_port: u16,
}

fn default_api_port() -> u16 {
    8080
}

impl ServerConfig {
    /// Load from an optional config file and `PREDICTOR_*` environment variables
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let settings = Settings::load(file).context("Failed to load pipeline settings")?;

        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let listener: ListenerSection = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .context("Failed to load listener settings")?;

        Ok(Self {
            api_port: listener.api_port,
            settings,
        })
    }
}
