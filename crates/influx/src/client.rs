//! HTTP client for the InfluxDB v2 API.
//!
//! Covers the three calls the registry needs: a batched last-seen query,
//! a heartbeat write and the health probe.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use vigil_core::error::CoreError;
use vigil_core::status_source::LastSeenQuery;
use vigil_core::types::Timestamp;

use crate::config::InfluxConfig;
use crate::flux;

/// Errors from the InfluxDB layer.
#[derive(Debug, thiserror::Error)]
pub enum InfluxError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// InfluxDB returned a non-2xx status code.
    #[error("InfluxDB API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The response body could not be interpreted.
    #[error("Unexpected InfluxDB response: {0}")]
    Parse(String),

    /// Missing or malformed configuration.
    #[error("Invalid InfluxDB configuration: {0}")]
    Config(String),
}

impl From<InfluxError> for CoreError {
    fn from(err: InfluxError) -> Self {
        CoreError::UpstreamUnavailable(err.to_string())
    }
}

/// Client for a single InfluxDB organisation and bucket.
pub struct InfluxClient {
    client: reqwest::Client,
    config: InfluxConfig,
}

impl InfluxClient {
    /// Build a client whose requests time out after `config.timeout`.
    pub fn new(config: InfluxConfig) -> Result<Self, InfluxError> {
        config.validate()?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Latest point time per device. Devices without data are absent.
    ///
    /// Issues exactly one query regardless of how many ids are passed.
    pub async fn query_last_seen(
        &self,
        device_ids: &[String],
    ) -> Result<HashMap<String, Timestamp>, InfluxError> {
        if device_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let query = flux::last_seen_query(
            &self.config.bucket,
            &self.config.measurement,
            &self.config.lookback,
            device_ids,
        );
        let body = serde_json::json!({
            "query": query,
            "type": "flux",
            "dialect": {
                "header": true,
                "annotations": [],
                "delimiter": ",",
            },
        });

        let response = self
            .client
            .post(format!("{}/api/v2/query", self.config.url))
            .query(&[("org", self.config.org.as_str())])
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/csv")
            .json(&body)
            .send()
            .await?;

        let text = Self::ensure_success(response).await?.text().await?;
        let latest = flux::parse_last_seen_csv(&text).map_err(InfluxError::Parse)?;

        tracing::debug!(
            requested = device_ids.len(),
            returned = latest.len(),
            "InfluxDB last-seen query complete",
        );
        Ok(latest)
    }

    /// Write one heartbeat point for `device_id` at `seen_at`.
    pub async fn write_heartbeat(
        &self,
        device_id: &str,
        seen_at: Timestamp,
    ) -> Result<(), InfluxError> {
        let ns = seen_at
            .timestamp_nanos_opt()
            .ok_or_else(|| InfluxError::Parse(format!("timestamp out of range: {seen_at}")))?;
        let line = flux::heartbeat_point(&self.config.measurement, device_id, ns);

        let response = self
            .client
            .post(format!("{}/api/v2/write", self.config.url))
            .query(&[
                ("org", self.config.org.as_str()),
                ("bucket", self.config.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header(AUTHORIZATION, self.auth_header())
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(line)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        tracing::debug!(device_id, %seen_at, "Heartbeat written to InfluxDB");
        Ok(())
    }

    /// Probe `GET /health`.
    pub async fn health(&self) -> Result<(), InfluxError> {
        let response = self
            .client
            .get(format!("{}/health", self.config.url))
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    // ---- private helpers ----

    fn auth_header(&self) -> String {
        format!("Token {}", self.config.token)
    }

    /// Pass 2xx responses through; turn anything else into
    /// [`InfluxError::Api`] carrying the body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, InfluxError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(InfluxError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl LastSeenQuery for InfluxClient {
    async fn latest_seen(
        &self,
        device_ids: &[String],
    ) -> Result<HashMap<String, Timestamp>, CoreError> {
        Ok(self.query_last_seen(device_ids).await?)
    }
}
