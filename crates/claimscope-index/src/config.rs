use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::FilterSizing;
use crate::error::{IndexError, Result};

/// Settings for the filter index and the tools built on it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndexConfig {
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub paging: PagingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if self.refresh.interval_ms == 0 {
            return Err(IndexError::configuration("refresh.interval_ms must be > 0"));
        }
        let rate = self.filter.false_positive_rate;
        if !(rate > 0.0 && rate < 1.0) {
            return Err(IndexError::configuration(
                "filter.false_positive_rate must be in (0, 1)",
            ));
        }
        if self.filter.expected_beneficiaries == 0 {
            return Err(IndexError::configuration(
                "filter.expected_beneficiaries must be > 0",
            ));
        }
        if self.paging.max_count == 0 {
            return Err(IndexError::configuration("paging.max_count must be > 0"));
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(IndexError::configuration(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

fn default_interval_ms() -> u64 {
    1000
}
fn default_initial_delay_ms() -> u64 {
    2000
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_false_positive_rate")]
    pub false_positive_rate: f64,
    /// Filter size for batches that do not list their beneficiaries.
    #[serde(default = "default_expected_beneficiaries")]
    pub expected_beneficiaries: usize,
}

fn default_false_positive_rate() -> f64 {
    0.01
}
fn default_expected_beneficiaries() -> usize {
    1000
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            false_positive_rate: default_false_positive_rate(),
            expected_beneficiaries: default_expected_beneficiaries(),
        }
    }
}

impl FilterConfig {
    pub fn sizing(&self) -> FilterSizing {
        FilterSizing {
            false_positive_rate: self.false_positive_rate,
            expected_beneficiaries: self.expected_beneficiaries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    /// JSON catalog file
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "default_max_count")]
    pub max_count: usize,
}

fn default_max_count() -> usize {
    1000
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            max_count: default_max_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::IndexConfig;
    use crate::error::{IndexError, Result};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "claimscope.toml";

    /// Load from `path` (or `claimscope.toml` when present), then apply
    /// `CLAIMSCOPE__SECTION__KEY` environment overrides and validate.
    pub fn load_config(path: Option<&str>) -> Result<IndexConfig> {
        let mut builder = Config::builder();
        let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        } else if path.is_some() {
            return Err(IndexError::configuration(format!(
                "config file not found: {}",
                file.display()
            )));
        }
        // Environment variable overrides, e.g., CLAIMSCOPE__REFRESH__INTERVAL_MS=500
        builder = builder.add_source(
            Environment::with_prefix("CLAIMSCOPE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| IndexError::configuration(format!("config build error: {e}")))?;
        let merged: IndexConfig = cfg
            .try_deserialize()
            .map_err(|e| IndexError::configuration(format!("config deserialize error: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::loader::load_config;
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = IndexConfig::default();
        config.validate().unwrap();
        assert_eq!(config.refresh.interval(), Duration::from_secs(1));
        assert_eq!(config.refresh.initial_delay(), Duration::from_secs(2));
        assert_eq!(config.filter.sizing(), FilterSizing::default());
        assert_eq!(config.paging.max_count, 1000);
        assert!(config.catalog.path.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = IndexConfig::default();
        config.filter.false_positive_rate = 1.5;
        assert!(matches!(config.validate(), Err(IndexError::Configuration(_))));

        let mut config = IndexConfig::default();
        config.refresh.interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = IndexConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut config = IndexConfig::default();
        config.refresh.interval_ms = 250;
        config.filter.false_positive_rate = 0.001;
        config.catalog.path = Some(PathBuf::from("/var/lib/claimscope/catalog.json"));

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(toml::to_string(&config).unwrap().as_bytes())
            .unwrap();

        let loaded = load_config(file.path().to_str()).unwrap();
        assert_eq!(loaded.refresh.interval_ms, 250);
        assert_eq!(loaded.refresh.initial_delay_ms, 2000);
        assert_eq!(loaded.filter.false_positive_rate, 0.001);
        assert_eq!(
            loaded.catalog.path.as_deref(),
            Some(std::path::Path::new("/var/lib/claimscope/catalog.json"))
        );
    }

    #[test]
    fn test_load_partial_toml_uses_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(b"[paging]\nmax_count = 50\n").unwrap();

        let loaded = load_config(file.path().to_str()).unwrap();
        assert_eq!(loaded.paging.max_count, 50);
        assert_eq!(loaded.refresh.interval_ms, 1000);
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = load_config(Some("/nonexistent/claimscope.toml")).unwrap_err();
        assert!(matches!(err, IndexError::Configuration(_)));
    }
}
