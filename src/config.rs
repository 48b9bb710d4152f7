use std::path::PathBuf;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::models::StatsPeriod;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub network: NetworkConfig,
    pub refresh: RefreshConfig,
    pub export: ExportConfig,
    pub preferences: PreferencesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Origin of the data service; `/api` is appended by the client.
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    pub trend_days: u32,
    pub period: StatsPeriod,
}

impl RefreshConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.interval_secs > 0,
            "refresh.interval_secs must be greater than zero"
        );
        Ok(())
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            trend_days: 7,
            period: StatsPeriod::Daily,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    pub directory: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PreferencesConfig {
    pub path: PathBuf,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: config_dir().join("preferences.json"),
        }
    }
}

/// Per-user configuration directory for airwatch.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("airwatch")
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present)
        let _ = dotenvy::dotenv();

        let config_dir = config_dir();
        let preferences_path = config_dir.join("preferences.json");

        let builder = Config::builder()
            // 1. Load default values
            // API
            .set_default("api.base_url", "http://localhost:5000")?
            // Network
            .set_default("network.request_timeout_secs", 10)?
            .set_default("network.connect_timeout_secs", 5)?
            // Refresh
            .set_default("refresh.interval_secs", 60)?
            .set_default("refresh.trend_days", 7)?
            .set_default("refresh.period", "daily")?
            // Export
            .set_default("export.directory", ".")?
            // Preferences
            .set_default(
                "preferences.path",
                preferences_path.to_string_lossy().to_string(),
            )?

            // 2. Load from local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))

            // 3. Load from user config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))

            // 4. Load from Environment variables (AIRWATCH__API__BASE_URL=...)
            .add_source(Environment::with_prefix("AIRWATCH").separator("__"));

        let s = builder.build()?;
        let config: Self = s.try_deserialize()?;
        config.refresh.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Default Value Tests ====================

    #[test]
    fn test_api_config_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url, "http://localhost:5000");
    }

    #[test]
    fn test_network_config_defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.connect_timeout_secs, 5);
    }

    #[test]
    fn test_refresh_config_defaults() {
        let config = RefreshConfig::default();
        assert_eq!(config.interval_secs, 60);
        assert_eq!(config.trend_days, 7);
        assert_eq!(config.period, StatsPeriod::Daily);
    }

    #[test]
    fn test_zero_refresh_interval_rejected() {
        let config = RefreshConfig {
            interval_secs: 0,
            ..RefreshConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("interval_secs"));

        assert!(RefreshConfig::default().validate().is_ok());
    }

    #[test]
    fn test_preferences_path_under_config_dir() {
        let config = PreferencesConfig::default();
        assert!(config.path.ends_with("airwatch/preferences.json"));
    }

    // ==================== Config Loading Tests ====================

    #[test]
    fn test_config_load_with_defaults() {
        let result = AppConfig::load();
        assert!(result.is_ok(), "load failed: {:?}", result.err());
    }

    #[test]
    fn test_loaded_config_has_expected_structure() {
        let config = AppConfig::load().expect("Config should load");

        assert!(!config.api.base_url.is_empty());
        assert!(config.network.request_timeout_secs > 0);
        assert!(config.refresh.interval_secs > 0);
        assert!(config.refresh.trend_days > 0);
    }

    // ==================== Environment Variable Override Tests ====================

    /// Helper to set and remove an environment variable around a closure.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        // SAFETY: keys are unique per test and removed afterwards
        unsafe {
            std::env::set_var(key, value);
        }
        let result = f();
        unsafe {
            std::env::remove_var(key);
        }
        result
    }

    #[test]
    fn test_env_var_overrides_api_base_url() {
        let config = with_env_var("AIRWATCH__API__BASE_URL", "https://weather.example.com", || {
            AppConfig::load().expect("Config should load")
        });

        assert_eq!(config.api.base_url, "https://weather.example.com");
    }

    #[test]
    fn test_env_var_overrides_stats_period() {
        let config = with_env_var("AIRWATCH__REFRESH__PERIOD", "hourly", || {
            AppConfig::load().expect("Config should load")
        });

        assert_eq!(config.refresh.period, StatsPeriod::Hourly);
    }

    #[test]
    fn test_config_default_values_are_reasonable() {
        let network = NetworkConfig::default();
        assert!(
            network.request_timeout_secs >= network.connect_timeout_secs,
            "Request timeout should be >= connect timeout"
        );
    }
}
