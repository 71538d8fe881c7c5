//! Generator service configuration.
//!
//! Values come from built-in defaults, overridden by an optional
//! `config.yaml`, overridden in turn by environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Port the generator HTTP server listens on.
    pub port: u16,
    /// Health-check route.
    pub alive_path: String,
    /// Route that starts/stops/reports the generation task.
    pub start_path: String,
    /// Parser ingest endpoint generated batches are shipped to.
    pub parser_api: String,
    /// Default number of lines per window when a start request omits it.
    pub rate: i64,
    /// Default window unit ("s", "m" or "h").
    pub unit: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            alive_path: "/".to_string(),
            start_path: "/logs".to_string(),
            parser_api: "http://localhost:8083/logs".to_string(),
            rate: 10,
            unit: "s".to_string(),
        }
    }
}

impl GeneratorConfig {
    /// Loads configuration: defaults, then `config.yaml` if present, then env.
    pub fn load() -> Result<Self> {
        let mut config = match std::fs::read_to_string(CONFIG_FILE) {
            Ok(content) => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", CONFIG_FILE))?,
            Err(_) => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("GENERATOR_PORT") {
            self.port = port
                .trim_start_matches(':')
                .parse()
                .context("Invalid GENERATOR_PORT")?;
        }
        if let Ok(path) = std::env::var("GENERATOR_ALIVE_URL") {
            self.alive_path = path;
        }
        if let Ok(path) = std::env::var("GENERATOR_START_URL") {
            self.start_path = path;
        }
        if let Ok(endpoint) = std::env::var("PARSER_API") {
            self.parser_api = endpoint;
        }
        if let Ok(rate) = std::env::var("GENERATOR_RATE") {
            self.rate = rate.parse().context("Invalid GENERATOR_RATE")?;
        }
        if let Ok(unit) = std::env::var("GENERATOR_UNIT") {
            self.unit = unit;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }
        if self.start_path.is_empty() || self.alive_path.is_empty() {
            anyhow::bail!("Route paths cannot be empty");
        }
        if self.parser_api.is_empty() {
            anyhow::bail!("Parser endpoint cannot be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = GeneratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 8080);
        assert_eq!(config.unit, "s");
    }

    #[test]
    fn yaml_overrides_defaults() {
        let yaml = "port: 9090\nrate: 500\n";
        let config: GeneratorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.rate, 500);
        // untouched fields keep their defaults
        assert_eq!(config.parser_api, "http://localhost:8083/logs");
    }

    #[test]
    fn zero_port_is_rejected() {
        let config = GeneratorConfig {
            port: 0,
            ..GeneratorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
