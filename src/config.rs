//! Query engine settings.
//!
//! [`DbHelperConfig`] is loaded from the `[relmap]` section of
//! `config/config.toml`, overridden by `RELMAP__RELMAP__*` environment
//! variables (e.g. `RELMAP__RELMAP__SLOW_SQL_THRESHOLD_MS=250`).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "config/config.toml";
const SECTION: &str = "relmap";

/// `RELMAP__` prefix, then the section and field joined by `__`
fn environment() -> Environment {
    Environment::with_prefix("RELMAP").separator("__")
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DbHelperConfig {
    /// Round trips slower than this are logged at warn level
    #[serde(default = "default_slow_sql_threshold_ms")]
    pub slow_sql_threshold_ms: u64,
    /// Log every statement at debug level
    #[serde(default = "default_log_sql")]
    pub log_sql: bool,
    /// Warn when a list query runs without a limit
    #[serde(default = "default_warn_unbounded")]
    pub warn_unbounded: bool,
}

fn default_slow_sql_threshold_ms() -> u64 {
    1000
}

fn default_log_sql() -> bool {
    true
}

fn default_warn_unbounded() -> bool {
    true
}

impl Default for DbHelperConfig {
    fn default() -> Self {
        Self {
            slow_sql_threshold_ms: default_slow_sql_threshold_ms(),
            log_sql: default_log_sql(),
            warn_unbounded: default_warn_unbounded(),
        }
    }
}

impl DbHelperConfig {
    /// Load the configuration from `config/config.toml`, falling back to env vars.
    ///
    /// A missing `[relmap]` section yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(environment());

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if std::path::Path::new(CONFIG_FILE).exists() {
                    log::warn!("Failed to load config file, falling back to env. Error: {}", err);
                }
                Config::builder()
                    .add_source(environment())
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {}, then env-only error: {}",
                            err, env_err
                        ))
                    })?
            }
        };

        Self::from_settings(&settings)
    }

    fn from_settings(settings: &Config) -> Result<Self, ConfigError> {
        match settings.get::<DbHelperConfig>(SECTION) {
            Ok(cfg) => Ok(cfg),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "relmap configuration could not be loaded from file or environment: {}",
                e
            ))),
        }
    }

    /// Slow-SQL threshold as a `Duration`
    pub fn slow_sql_threshold(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.slow_sql_threshold_ms)
    }
}
