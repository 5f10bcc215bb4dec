use std::time::Duration;

use crate::client::InfluxError;

/// Default InfluxDB Cloud endpoint.
pub const DEFAULT_URL: &str = "https://us-east-1-1.aws.cloud2.influxdata.com";
pub const DEFAULT_MEASUREMENT: &str = "heartbeat";
pub const DEFAULT_LOOKBACK: &str = "-30d";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Connection settings for an InfluxDB v2 instance.
///
/// | Env var               | Default                                         |
/// |-----------------------|-------------------------------------------------|
/// | `INFLUX_URL`          | `https://us-east-1-1.aws.cloud2.influxdata.com` |
/// | `INFLUX_TOKEN`        | required                                        |
/// | `INFLUX_ORG`          | required                                        |
/// | `INFLUX_BUCKET`       | required                                        |
/// | `INFLUX_MEASUREMENT`  | `heartbeat`                                     |
/// | `INFLUX_LOOKBACK`     | `-30d`                                          |
/// | `INFLUX_TIMEOUT_SECS` | `10`                                            |
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    /// Base URL without a trailing slash.
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    pub measurement: String,
    /// Flux `range(start:)` value, e.g. `-30d`.
    pub lookback: String,
    pub timeout: Duration,
}

impl InfluxConfig {
    /// Build a config with defaults for everything but credentials.
    pub fn new(url: &str, token: &str, org: &str, bucket: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            org: org.to_string(),
            bucket: bucket.to_string(),
            measurement: DEFAULT_MEASUREMENT.to_string(),
            lookback: DEFAULT_LOOKBACK.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Load from environment variables.
    pub fn from_env() -> Result<Self, InfluxError> {
        let url = std::env::var("INFLUX_URL").unwrap_or_else(|_| DEFAULT_URL.into());
        let token = required("INFLUX_TOKEN")?;
        let org = required("INFLUX_ORG")?;
        let bucket = required("INFLUX_BUCKET")?;

        let mut config = Self::new(&url, &token, &org, &bucket);

        if let Ok(measurement) = std::env::var("INFLUX_MEASUREMENT") {
            config.measurement = measurement;
        }
        if let Ok(lookback) = std::env::var("INFLUX_LOOKBACK") {
            config.lookback = lookback;
        }
        if let Ok(raw) = std::env::var("INFLUX_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                InfluxError::Config(format!("INFLUX_TIMEOUT_SECS must be a valid u64, got '{raw}'"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that end up inside generated Flux.
    pub fn validate(&self) -> Result<(), InfluxError> {
        if self.measurement.is_empty() {
            return Err(InfluxError::Config("INFLUX_MEASUREMENT must not be empty".into()));
        }
        if !is_valid_lookback(&self.lookback) {
            return Err(InfluxError::Config(format!(
                "INFLUX_LOOKBACK must be a Flux duration like -30d, got '{}'",
                self.lookback
            )));
        }
        Ok(())
    }
}

fn required(key: &'static str) -> Result<String, InfluxError> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(InfluxError::Config(format!("{key} must be set"))),
    }
}

/// Accepts negative duration literals such as `-30d` or `-1h30m`.
fn is_valid_lookback(raw: &str) -> bool {
    let Some(body) = raw.strip_prefix('-') else {
        return false;
    };
    !body.is_empty()
        && body.starts_with(|c: char| c.is_ascii_digit())
        && body.ends_with(|c: char| c.is_ascii_alphabetic())
        && body.chars().all(|c| c.is_ascii_alphanumeric())
}
