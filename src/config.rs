//! Configuration file support for careline
//!
//! Loads config from ~/.careline/config.toml

use serde::Deserialize;
use std::path::PathBuf;

/// Configuration for careline
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Classification backend: "gemini" or "openai"
    pub llm_provider: Option<String>,

    /// API key for the classification backend
    pub llm_api_key: Option<String>,

    /// Model name override
    pub llm_model: Option<String>,

    /// Database URL
    pub database_url: Option<String>,

    /// HTTP server port
    pub port: Option<u16>,
}

impl Config {
    /// Load config from ~/.careline/config.toml
    pub fn load() -> Self {
        let path = config_path();

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".careline")
        .join("config.toml")
}
