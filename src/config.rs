use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::logging::LogFormat;

/// Every variable starts with `SAGEREPORT_`, e.g. `SAGEREPORT_LATENCY_MIN_MS`.
pub const ENV_PREFIX: &str = "SAGEREPORT";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_latency_min_ms")]
    pub latency_min_ms: u64,
    #[serde(default = "default_latency_max_ms")]
    pub latency_max_ms: u64,
    /// `EnvFilter` directive.
    #[serde(rename = "log", default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Seed the store with the demo roster and reports.
    #[serde(rename = "demo", default = "default_demo_data")]
    pub demo_data: bool,
}

fn default_latency_min_ms() -> u64 {
    2000
}

fn default_latency_max_ms() -> u64 {
    4000
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_demo_data() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            latency_min_ms: default_latency_min_ms(),
            latency_max_ms: default_latency_max_ms(),
            log_filter: default_log_filter(),
            log_format: LogFormat::default(),
            demo_data: default_demo_data(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(environment())
    }

    fn load(source: ::config::Environment) -> Result<Self, ConfigError> {
        let mut loaded: Self = ::config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;

        if loaded.latency_max_ms < loaded.latency_min_ms {
            return Err(ConfigError::LatencyWindow {
                min: loaded.latency_min_ms,
                max: loaded.latency_max_ms,
            });
        }
        if loaded.log_filter.trim().is_empty() {
            loaded.log_filter = default_log_filter();
        }
        Ok(loaded)
    }

    pub fn latency_min(&self) -> Duration {
        Duration::from_millis(self.latency_min_ms)
    }

    pub fn latency_max(&self) -> Duration {
        Duration::from_millis(self.latency_max_ms)
    }
}

fn environment() -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: ::config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::load(environment().source(Some(vars)))
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.latency_min(), Duration::from_millis(2000));
        assert_eq!(cfg.latency_max(), Duration::from_millis(4000));
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("SAGEREPORT_LATENCY_MIN_MS", "0"),
            ("SAGEREPORT_LATENCY_MAX_MS", "250"),
            ("SAGEREPORT_LOG", "sagereport=debug"),
            ("SAGEREPORT_LOG_FORMAT", "json"),
            ("SAGEREPORT_DEMO", "false"),
        ])
        .unwrap();
        assert_eq!(cfg.latency_min(), Duration::ZERO);
        assert_eq!(cfg.latency_max(), Duration::from_millis(250));
        assert_eq!(cfg.log_filter, "sagereport=debug");
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert!(!cfg.demo_data);
    }

    #[test]
    fn blank_log_filter_falls_back() {
        let cfg = config(&[("SAGEREPORT_LOG", " ")]).unwrap();
        assert_eq!(cfg.log_filter, "info");
    }

    #[test]
    fn rejects_bad_values() {
        let err = config(&[("SAGEREPORT_LATENCY_MIN_MS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));

        let err = config(&[
            ("SAGEREPORT_LATENCY_MIN_MS", "500"),
            ("SAGEREPORT_LATENCY_MAX_MS", "100"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::LatencyWindow { min: 500, max: 100 }));

        assert!(config(&[("SAGEREPORT_LOG_FORMAT", "xml")]).is_err());
    }
}
