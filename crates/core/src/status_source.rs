//! Interchangeable strategies for computing device status.
//!
//! [`RecordedActivity`] trusts the `last_active` column of the record.
//! [`TimeSeriesActivity`] asks an external time-series store for the most
//! recent point per device. Both apply the same threshold rule from
//! [`crate::liveness`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::device::Device;
use crate::error::CoreError;
use crate::liveness::{derive_status, is_from_future, DeviceStatus};
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Computes liveness for a batch of devices.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;

    /// Status per `device_id`. Devices missing from the result are treated
    /// as [`DeviceStatus::Unknown`] by callers.
    async fn resolve(
        &self,
        devices: &[Device],
        now: Timestamp,
    ) -> Result<HashMap<String, DeviceStatus>, CoreError>;

    /// Single-device form of [`StatusSource::resolve`].
    async fn resolve_one(&self, device: &Device, now: Timestamp) -> Result<DeviceStatus, CoreError> {
        let statuses = self.resolve(std::slice::from_ref(device), now).await?;
        Ok(statuses
            .get(&device.device_id)
            .copied()
            .unwrap_or(DeviceStatus::Unknown))
    }
}

/// Batched "most recent point" lookup against a time-series store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LastSeenQuery: Send + Sync {
    /// Latest timestamp per device. Devices with no data are absent.
    async fn latest_seen(
        &self,
        device_ids: &[String],
    ) -> Result<HashMap<String, Timestamp>, CoreError>;
}

/// Classify one device from the evidence a source actually uses.
///
/// Future-dated evidence still counts as active, but is logged as clock skew.
fn classify(
    device_id: &str,
    seen: Option<Timestamp>,
    now: Timestamp,
    window: chrono::Duration,
) -> DeviceStatus {
    if is_from_future(seen, now) {
        tracing::warn!(
            device_id,
            last_seen = ?seen,
            "Last activity is ahead of server time, treating device as active",
        );
    }
    derive_status(seen, now, window)
}

// ---------------------------------------------------------------------------
// Recorded activity
// ---------------------------------------------------------------------------

/// Derives status from the `last_active` stored on each record.
#[derive(Debug, Clone, Copy)]
pub struct RecordedActivity {
    window: chrono::Duration,
}

impl RecordedActivity {
    pub fn new(window: chrono::Duration) -> Self {
        Self { window }
    }
}

#[async_trait]
impl StatusSource for RecordedActivity {
    fn name(&self) -> &'static str {
        "recorded"
    }

    async fn resolve(
        &self,
        devices: &[Device],
        now: Timestamp,
    ) -> Result<HashMap<String, DeviceStatus>, CoreError> {
        Ok(devices
            .iter()
            .map(|d| {
                (
                    d.device_id.clone(),
                    classify(&d.device_id, d.last_active, now, self.window),
                )
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Time-series activity
// ---------------------------------------------------------------------------

/// Derives status from the latest point in an external time-series store.
///
/// Issues one batched query per call regardless of how many devices are
/// passed in.
pub struct TimeSeriesActivity {
    query: Arc<dyn LastSeenQuery>,
    window: chrono::Duration,
}

impl TimeSeriesActivity {
    pub fn new(query: Arc<dyn LastSeenQuery>, window: chrono::Duration) -> Self {
        Self { query, window }
    }
}

#[async_trait]
impl StatusSource for TimeSeriesActivity {
    fn name(&self) -> &'static str {
        "timeseries"
    }

    async fn resolve(
        &self,
        devices: &[Device],
        now: Timestamp,
    ) -> Result<HashMap<String, DeviceStatus>, CoreError> {
        if devices.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<String> = devices.iter().map(|d| d.device_id.clone()).collect();
        let latest = self.query.latest_seen(&ids).await?;

        tracing::debug!(
            requested = ids.len(),
            with_data = latest.len(),
            "Resolved last-seen from time-series store",
        );

        Ok(ids
            .into_iter()
            .map(|id| {
                let status = classify(&id, latest.get(&id).copied(), now, self.window);
                (id, status)
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
