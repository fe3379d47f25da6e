use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::cases::DEFAULT_CASES_URL;
use crate::error::{Error, Result};
use crate::lookup::{DEFAULT_CLIMATE_URL, DEFAULT_WORLD_BANK_URL};

/// Settings read from an optional TOML file. Every key has a default that
/// reproduces the public data sources.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub cases_url: String,
    pub world_bank_url: String,
    pub climate_url: String,
    /// Year the population and GDP indicators are taken from.
    pub indicator_year: u16,
    pub request_timeout_secs: u64,
    /// Extra names excluded from the join, on top of the built-in list.
    pub denylist: Vec<String>,
    pub iso_overrides: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cases_url: DEFAULT_CASES_URL.to_string(),
            world_bank_url: DEFAULT_WORLD_BANK_URL.to_string(),
            climate_url: DEFAULT_CLIMATE_URL.to_string(),
            indicator_year: 2016,
            request_timeout_secs: 30,
            denylist: Vec::new(),
            iso_overrides: HashMap::new(),
        }
    }
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".into()));
        }
        if let Some((name, code)) = self
            .iso_overrides
            .iter()
            .find(|(_, code)| code.trim().len() != 3)
        {
            return Err(Error::Config(format!(
                "ISO3 override for '{}' is not a three-letter code: '{}'",
                name, code
            )));
        }
        Ok(())
    }
}
