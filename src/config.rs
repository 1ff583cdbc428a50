use std::env;
use std::path::PathBuf;

use anyhow::Context;

use crate::models::Configuration;

pub const DEFAULT_STORE_PATH: &str = ".wbr-store.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_path: PathBuf,
    /// Threshold for newly seeded documents; stored documents keep their own.
    pub default_threshold: Option<f64>,
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl AppConfig {
    /// Reads `WBR_STORE_PATH` and `WBR_DEFAULT_THRESHOLD`.
    pub fn from_env() -> anyhow::Result<Self> {
        let store_path = env_opt("WBR_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));

        let default_threshold = env_opt("WBR_DEFAULT_THRESHOLD")
            .map(|raw| {
                raw.trim()
                    .parse::<f64>()
                    .with_context(|| format!("WBR_DEFAULT_THRESHOLD must be a number, got {raw:?}"))
            })
            .transpose()?;

        Ok(Self {
            store_path,
            default_threshold,
        })
    }

    pub fn seed_configuration(&self) -> Configuration {
        let config = Configuration::default();
        match self.default_threshold {
            Some(threshold) => config.with_threshold(threshold),
            None => config,
        }
    }

    pub fn log_summary(&self) {
        tracing::debug!(
            store = %self.store_path.display(),
            default_threshold = ?self.default_threshold,
            "configuration loaded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_THRESHOLD;

    #[test]
    fn seed_configuration_clamps_env_threshold() {
        let config = AppConfig {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            default_threshold: Some(0.75),
        };
        assert_eq!(config.seed_configuration().alert_threshold, 0.30);

        let unset = AppConfig {
            default_threshold: None,
            ..config
        };
        assert_eq!(unset.seed_configuration().alert_threshold, DEFAULT_THRESHOLD);
    }
}
