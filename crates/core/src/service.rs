//! Device service: the orchestration layer HTTP handlers call.
//!
//! Composes a [`DeviceRegistry`], a [`StatusSource`] and a [`Clock`]. All
//! three are injected at bootstrap so nothing here reaches for globals.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use validator::Validate;

use crate::device::{Device, DeviceView, NewDevice, UpdateDeviceRequest};
use crate::error::CoreError;
use crate::liveness::{Clock, DeviceStatus};
use crate::registry::DeviceRegistry;
use crate::status_source::StatusSource;
use crate::types::Timestamp;

/// Domain service for device registry operations.
pub struct DeviceService {
    registry: Arc<dyn DeviceRegistry>,
    status: Arc<dyn StatusSource>,
    clock: Arc<dyn Clock>,
}

impl DeviceService {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        status: Arc<dyn StatusSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            status,
            clock,
        }
    }

    /// Name of the configured status strategy.
    pub fn status_strategy(&self) -> &'static str {
        self.status.name()
    }

    /// Register a new device.
    ///
    /// Fails with [`CoreError::Conflict`] if the `device_id` is taken; the
    /// existing record is left untouched.
    pub async fn create(&self, input: NewDevice) -> Result<Device, CoreError> {
        input.check()?;

        if self.registry.find(&input.device_id).await?.is_some() {
            return Err(CoreError::Conflict("Device already exists".to_string()));
        }

        let device = self.registry.create(&input).await?;

        info!(
            device_id = %device.device_id,
            profile = device.profile.as_str(),
            "Device created",
        );
        Ok(device)
    }

    /// List every device with its derived status.
    ///
    /// An empty registry is reported as [`CoreError::NotFound`]. If the
    /// status source fails, every device is reported as
    /// [`DeviceStatus::Unknown`] rather than failing the listing.
    pub async fn list(&self) -> Result<Vec<DeviceView>, CoreError> {
        let devices = self.registry.list().await?;
        if devices.is_empty() {
            return Err(CoreError::NotFound {
                entity: "Device",
                key: None,
            });
        }

        let now = self.clock.now();
        let statuses = match self.status.resolve(&devices, now).await {
            Ok(statuses) => statuses,
            Err(e) => {
                warn!(
                    error = %e,
                    strategy = self.status.name(),
                    count = devices.len(),
                    "Status source failed, reporting all devices as unknown",
                );
                HashMap::new()
            }
        };

        debug!(count = devices.len(), "Listed devices");

        Ok(devices
            .into_iter()
            .map(|device| {
                let status = statuses
                    .get(&device.device_id)
                    .copied()
                    .unwrap_or(DeviceStatus::Unknown);
                DeviceView::new(device, status)
            })
            .collect())
    }

    /// Fetch one device with its derived status.
    ///
    /// Unlike [`DeviceService::list`], a status source failure is returned
    /// to the caller.
    pub async fn get(&self, device_id: &str) -> Result<DeviceView, CoreError> {
        let device = self.require(device_id).await?;
        let now = self.clock.now();
        let status = self.status.resolve_one(&device, now).await?;
        Ok(DeviceView::new(device, status))
    }

    /// Apply a partial update. Only supplied fields change.
    pub async fn update(
        &self,
        device_id: &str,
        request: UpdateDeviceRequest,
    ) -> Result<Device, CoreError> {
        let current = self.require(device_id).await?;
        let patch = request.into_patch(current.profile)?;
        patch.validate()?;

        if patch.is_empty() {
            debug!(device_id, "Empty update, nothing to apply");
            return Ok(current);
        }

        let device = self
            .registry
            .update(device_id, &patch)
            .await?
            .ok_or_else(|| CoreError::device_not_found(device_id))?;

        info!(device_id, "Device updated");
        Ok(device)
    }

    /// Remove a device.
    pub async fn delete(&self, device_id: &str) -> Result<(), CoreError> {
        if !self.registry.delete(device_id).await? {
            return Err(CoreError::device_not_found(device_id));
        }
        info!(device_id, "Device deleted");
        Ok(())
    }

    /// Record telemetry activity for a device.
    pub async fn update_last_seen(
        &self,
        device_id: &str,
        seen_at: Timestamp,
    ) -> Result<Device, CoreError> {
        let device = self
            .registry
            .touch_last_active(device_id, seen_at)
            .await?
            .ok_or_else(|| CoreError::device_not_found(device_id))?;

        debug!(device_id, %seen_at, "Device last-seen updated");
        Ok(device)
    }

    /// Attach a status to a record already in hand, falling back to
    /// [`DeviceStatus::Unknown`] if the status source fails.
    pub async fn describe(&self, device: Device) -> DeviceView {
        let now = self.clock.now();
        let status = match self.status.resolve_one(&device, now).await {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    error = %e,
                    device_id = %device.device_id,
                    "Status source failed, reporting device as unknown",
                );
                DeviceStatus::Unknown
            }
        };
        DeviceView::new(device, status)
    }

    /// Current time according to the injected clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    async fn require(&self, device_id: &str) -> Result<Device, CoreError> {
        self.registry
            .find(device_id)
            .await?
            .ok_or_else(|| CoreError::device_not_found(device_id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DevicePatch, DeviceProfile};
    use crate::liveness::{default_window, FixedClock};
    use crate::registry::MockDeviceRegistry;
    use crate::status_source::RecordedActivity;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn stored(device_id: &str, last_active: Option<Timestamp>) -> Device {
        Device {
            id: 1,
            device_id: device_id.to_string(),
            profile: DeviceProfile::Iot,
            subject: "B".to_string(),
            label: "A".to_string(),
            measurement: "humidity".to_string(),
            last_active,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn new_device(device_id: &str) -> NewDevice {
        NewDevice {
            device_id: device_id.to_string(),
            profile: DeviceProfile::Iot,
            subject: "B".to_string(),
            label: "A".to_string(),
            measurement: "humidity".to_string(),
            last_active: None,
        }
    }

    fn service(registry: MockDeviceRegistry) -> DeviceService {
        DeviceService::new(
            Arc::new(registry),
            Arc::new(RecordedActivity::new(default_window())),
            Arc::new(FixedClock(now())),
        )
    }

    struct FailingSource;

    #[async_trait]
    impl StatusSource for FailingSource {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn resolve(
            &self,
            _devices: &[Device],
            _now: Timestamp,
        ) -> Result<HashMap<String, DeviceStatus>, CoreError> {
            Err(CoreError::UpstreamUnavailable("connection refused".into()))
        }
    }

    // -- create ---------------------------------------------------------------

    #[tokio::test]
    async fn create_persists_new_device() {
        let mut registry = MockDeviceRegistry::new();
        registry.expect_find().times(1).returning(|_| Ok(None));
        registry
            .expect_create()
            .withf(|input: &NewDevice| input.device_id == "d1")
            .times(1)
            .return_once(|_| Ok(stored("d1", None)));

        let device = service(registry).create(new_device("d1")).await.unwrap();

        assert_eq!(device.device_id, "d1");
    }

    #[tokio::test]
    async fn create_duplicate_is_conflict_and_does_not_write() {
        let mut registry = MockDeviceRegistry::new();
        registry
            .expect_find()
            .times(1)
            .returning(|id| Ok(Some(stored(id, None))));
        registry.expect_create().times(0);

        let result = service(registry).create(new_device("d1")).await;

        assert_matches!(result, Err(CoreError::Conflict(msg)) if msg == "Device already exists");
    }

    #[tokio::test]
    async fn create_with_invalid_id_never_reaches_store() {
        let mut registry = MockDeviceRegistry::new();
        registry.expect_find().times(0);
        registry.expect_create().times(0);

        let result = service(registry).create(new_device("bad id")).await;

        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    // -- list -----------------------------------------------------------------

    #[tokio::test]
    async fn list_empty_registry_is_not_found() {
        let mut registry = MockDeviceRegistry::new();
        registry.expect_list().return_once(|| Ok(vec![]));

        let result = service(registry).list().await;

        assert_matches!(result, Err(CoreError::NotFound { entity: "Device", key: None }));
    }

    #[tokio::test]
    async fn list_attaches_derived_status() {
        let mut registry = MockDeviceRegistry::new();
        registry.expect_list().return_once(|| {
            Ok(vec![
                stored("edge", Some(now() - Duration::minutes(5))),
                stored("late", Some(now() - Duration::minutes(5) - Duration::seconds(1))),
                stored("never", None),
            ])
        });

        let views = service(registry).list().await.unwrap();

        let statuses: Vec<_> = views.iter().map(|v| v.status).collect();
        assert_eq!(
            statuses,
            vec![
                Some(DeviceStatus::Active),
                Some(DeviceStatus::Inactive),
                Some(DeviceStatus::Unknown),
            ]
        );
    }

    #[tokio::test]
    async fn list_falls_back_to_unknown_when_status_source_fails() {
        let mut registry = MockDeviceRegistry::new();
        registry
            .expect_list()
            .return_once(|| Ok(vec![stored("d1", Some(now())), stored("d2", None)]));

        let service = DeviceService::new(
            Arc::new(registry),
            Arc::new(FailingSource),
            Arc::new(FixedClock(now())),
        );
        let views = service.list().await.unwrap();

        assert_eq!(views.len(), 2);
        assert!(views.iter().all(|v| v.status == Some(DeviceStatus::Unknown)));
    }

    // -- get ------------------------------------------------------------------

    #[tokio::test]
    async fn get_propagates_status_source_failure() {
        let mut registry = MockDeviceRegistry::new();
        registry
            .expect_find()
            .returning(|id| Ok(Some(stored(id, None))));

        let service = DeviceService::new(
            Arc::new(registry),
            Arc::new(FailingSource),
            Arc::new(FixedClock(now())),
        );

        assert_matches!(
            service.get("d1").await,
            Err(CoreError::UpstreamUnavailable(_))
        );
    }

    #[tokio::test]
    async fn get_missing_device_is_not_found() {
        let mut registry = MockDeviceRegistry::new();
        registry.expect_find().returning(|_| Ok(None));

        assert_matches!(
            service(registry).get("ghost").await,
            Err(CoreError::NotFound { key: Some(k), .. }) if k == "ghost"
        );
    }

    // -- update ---------------------------------------------------------------

    #[tokio::test]
    async fn update_sends_only_supplied_fields() {
        let mut registry = MockDeviceRegistry::new();
        registry
            .expect_find()
            .returning(|id| Ok(Some(stored(id, None))));
        registry
            .expect_update()
            .withf(|id: &str, patch: &DevicePatch| {
                id == "d1"
                    && patch.label.as_deref() == Some("C")
                    && patch.subject.is_none()
                    && patch.measurement.is_none()
            })
            .times(1)
            .return_once(|id, _| {
                let mut d = stored(id, None);
                d.label = "C".to_string();
                Ok(Some(d))
            });

        let request = UpdateDeviceRequest {
            name: Some("C".into()),
            ..Default::default()
        };
        let device = service(registry).update("d1", request).await.unwrap();

        assert_eq!(device.label, "C");
        assert_eq!(device.subject, "B");
    }

    #[tokio::test]
    async fn update_missing_device_is_not_found() {
        let mut registry = MockDeviceRegistry::new();
        registry.expect_find().returning(|_| Ok(None));
        registry.expect_update().times(0);

        let result = service(registry)
            .update("ghost", UpdateDeviceRequest::default())
            .await;

        assert_matches!(result, Err(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn empty_update_returns_current_record_without_writing() {
        let mut registry = MockDeviceRegistry::new();
        registry
            .expect_find()
            .returning(|id| Ok(Some(stored(id, None))));
        registry.expect_update().times(0);

        let device = service(registry)
            .update("d1", UpdateDeviceRequest::default())
            .await
            .unwrap();

        assert_eq!(device.label, "A");
    }

    #[tokio::test]
    async fn update_with_blank_value_is_rejected() {
        let mut registry = MockDeviceRegistry::new();
        registry
            .expect_find()
            .returning(|id| Ok(Some(stored(id, None))));
        registry.expect_update().times(0);

        let request = UpdateDeviceRequest {
            location: Some(String::new()),
            ..Default::default()
        };

        assert_matches!(
            service(registry).update("d1", request).await,
            Err(CoreError::Validation(_))
        );
    }

    // -- delete ---------------------------------------------------------------

    #[tokio::test]
    async fn delete_missing_device_is_not_found() {
        let mut registry = MockDeviceRegistry::new();
        registry.expect_delete().return_once(|_| Ok(false));

        assert_matches!(
            service(registry).delete("ghost").await,
            Err(CoreError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn delete_existing_device_succeeds() {
        let mut registry = MockDeviceRegistry::new();
        registry.expect_delete().return_once(|_| Ok(true));

        assert!(service(registry).delete("d1").await.is_ok());
    }

    // -- update_last_seen -----------------------------------------------------

    #[tokio::test]
    async fn update_last_seen_sets_timestamp() {
        let seen = now() - Duration::seconds(10);
        let mut registry = MockDeviceRegistry::new();
        registry
            .expect_touch_last_active()
            .withf(move |id: &str, ts: &Timestamp| id == "d1" && *ts == seen)
            .return_once(move |id, ts| Ok(Some(stored(id, Some(ts)))));

        let device = service(registry).update_last_seen("d1", seen).await.unwrap();

        assert_eq!(device.last_active, Some(seen));
    }

    #[tokio::test]
    async fn heartbeat_then_describe_is_active() {
        let mut registry = MockDeviceRegistry::new();
        registry
            .expect_touch_last_active()
            .return_once(|id, ts| Ok(Some(stored(id, Some(ts)))));

        let service = service(registry);
        let device = service.update_last_seen("d1", service.now()).await.unwrap();
        let view = service.describe(device).await;

        assert_eq!(view.status, Some(DeviceStatus::Active));
    }

    #[tokio::test]
    async fn describe_falls_back_to_unknown() {
        let service = DeviceService::new(
            Arc::new(MockDeviceRegistry::new()),
            Arc::new(FailingSource),
            Arc::new(FixedClock(now())),
        );

        let view = service.describe(stored("d1", Some(now()))).await;

        assert_eq!(view.status, Some(DeviceStatus::Unknown));
    }

    #[tokio::test]
    async fn update_last_seen_missing_device_is_not_found() {
        let mut registry = MockDeviceRegistry::new();
        registry
            .expect_touch_last_active()
            .return_once(|_, _| Ok(None));

        assert_matches!(
            service(registry).update_last_seen("ghost", now()).await,
            Err(CoreError::NotFound { .. })
        );
    }
}
