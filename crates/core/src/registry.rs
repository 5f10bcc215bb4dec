//! Storage seam for device records.
//!
//! The Postgres implementation lives in `vigil-db`; the service only sees
//! this trait.

use async_trait::async_trait;

use crate::device::{Device, DevicePatch, NewDevice};
use crate::error::CoreError;
use crate::types::Timestamp;

/// Durable store of device records keyed by `device_id`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Insert a record. Fails with [`CoreError::Conflict`] when the
    /// `device_id` is already taken.
    async fn create(&self, input: &NewDevice) -> Result<Device, CoreError>;

    async fn find(&self, device_id: &str) -> Result<Option<Device>, CoreError>;

    /// All records in creation order.
    async fn list(&self) -> Result<Vec<Device>, CoreError>;

    /// Apply only the `Some` fields of `patch`. `None` when absent.
    async fn update(
        &self,
        device_id: &str,
        patch: &DevicePatch,
    ) -> Result<Option<Device>, CoreError>;

    /// Set `last_active`. `None` when absent.
    async fn touch_last_active(
        &self,
        device_id: &str,
        seen_at: Timestamp,
    ) -> Result<Option<Device>, CoreError>;

    /// Returns `true` if a record was removed.
    async fn delete(&self, device_id: &str) -> Result<bool, CoreError>;
}
