use std::str::FromStr;

use axum::http::HeaderValue;
use vigil_core::liveness::ACTIVE_WINDOW_SECS;
use vigil_influx::{InfluxConfig, InfluxError};

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a valid {expected}, got '{value}'")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("Unknown STATUS_STRATEGY '{0}' (expected 'recorded' or 'timeseries')")]
    UnknownStrategy(String),

    #[error(transparent)]
    Influx(#[from] InfluxError),
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_env("PORT", "3000", "u16")?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for origin in &cors_origins {
            if HeaderValue::from_str(origin).is_err() {
                return Err(ConfigError::Invalid {
                    key: "CORS_ORIGINS",
                    expected: "origin list",
                    value: origin.clone(),
                });
            }
        }

        let request_timeout_secs: u64 = parse_env("REQUEST_TIMEOUT_SECS", "30", "u64")?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
        })
    }
}

/// Which evidence device status is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusStrategy {
    /// The `last_active` column of the device record.
    Recorded,
    /// The latest point in InfluxDB.
    Timeseries,
}

impl FromStr for StatusStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recorded" => Ok(StatusStrategy::Recorded),
            "timeseries" => Ok(StatusStrategy::Timeseries),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Status derivation settings.
#[derive(Debug, Clone)]
pub struct StatusConfig {
    pub strategy: StatusStrategy,
    /// Seconds within which a device counts as active.
    pub active_window_secs: i64,
    /// Present only for [`StatusStrategy::Timeseries`].
    pub influx: Option<InfluxConfig>,
}

impl StatusConfig {
    /// Derive status from the recorded column with the default window.
    pub fn recorded() -> Self {
        Self {
            strategy: StatusStrategy::Recorded,
            active_window_secs: ACTIVE_WINDOW_SECS,
            influx: None,
        }
    }

    /// Derive status from InfluxDB with the default window.
    pub fn timeseries(influx: InfluxConfig) -> Self {
        Self {
            strategy: StatusStrategy::Timeseries,
            active_window_secs: ACTIVE_WINDOW_SECS,
            influx: Some(influx),
        }
    }

    /// Load from environment variables.
    ///
    /// | Env Var              | Default    |
    /// |----------------------|------------|
    /// | `STATUS_STRATEGY`    | `recorded` |
    /// | `ACTIVE_WINDOW_SECS` | `300`      |
    ///
    /// The `timeseries` strategy also reads the `INFLUX_*` variables, see
    /// [`InfluxConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let strategy: StatusStrategy = std::env::var("STATUS_STRATEGY")
            .unwrap_or_else(|_| "recorded".into())
            .parse()?;

        let default_window = ACTIVE_WINDOW_SECS.to_string();
        let active_window_secs: i64 = parse_env("ACTIVE_WINDOW_SECS", &default_window, "i64")?;
        if active_window_secs <= 0 {
            return Err(ConfigError::Invalid {
                key: "ACTIVE_WINDOW_SECS",
                expected: "positive number of seconds",
                value: active_window_secs.to_string(),
            });
        }

        let influx = match strategy {
            StatusStrategy::Recorded => None,
            StatusStrategy::Timeseries => Some(InfluxConfig::from_env()?),
        };

        Ok(Self {
            strategy,
            active_window_secs,
            influx,
        })
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.active_window_secs)
    }
}

fn parse_env<T: FromStr>(
    key: &'static str,
    default: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|_| ConfigError::Invalid {
        key,
        expected,
        value: raw.clone(),
    })
}
