//! [`DeviceRegistry`] backed by PostgreSQL.

use async_trait::async_trait;
use vigil_core::device::{Device, DevicePatch, NewDevice};
use vigil_core::error::CoreError;
use vigil_core::registry::DeviceRegistry;
use vigil_core::types::Timestamp;

use crate::repositories::DeviceRepo;
use crate::DbPool;

/// Postgres-backed device registry.
#[derive(Clone)]
pub struct PgDeviceStore {
    pool: DbPool,
}

impl PgDeviceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceRegistry for PgDeviceStore {
    async fn create(&self, input: &NewDevice) -> Result<Device, CoreError> {
        let row = DeviceRepo::create(&self.pool, input)
            .await
            .map_err(map_sqlx_error)?;
        row.try_into()
    }

    async fn find(&self, device_id: &str) -> Result<Option<Device>, CoreError> {
        DeviceRepo::find_by_device_id(&self.pool, device_id)
            .await
            .map_err(map_sqlx_error)?
            .map(Device::try_from)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<Device>, CoreError> {
        DeviceRepo::list(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(Device::try_from)
            .collect()
    }

    async fn update(
        &self,
        device_id: &str,
        patch: &DevicePatch,
    ) -> Result<Option<Device>, CoreError> {
        DeviceRepo::update(&self.pool, device_id, patch)
            .await
            .map_err(map_sqlx_error)?
            .map(Device::try_from)
            .transpose()
    }

    async fn touch_last_active(
        &self,
        device_id: &str,
        seen_at: Timestamp,
    ) -> Result<Option<Device>, CoreError> {
        DeviceRepo::touch_last_active(&self.pool, device_id, seen_at)
            .await
            .map_err(map_sqlx_error)?
            .map(Device::try_from)
            .transpose()
    }

    async fn delete(&self, device_id: &str) -> Result<bool, CoreError> {
        DeviceRepo::delete(&self.pool, device_id)
            .await
            .map_err(map_sqlx_error)
    }
}

/// Translate a sqlx error into the domain taxonomy.
///
/// - Unique violations (`23505`) on a `uq_` constraint become
///   [`CoreError::Conflict`].
/// - Everything else becomes [`CoreError::Internal`]; the API layer hides
///   the message from clients.
pub fn map_sqlx_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unknown");
            if constraint.starts_with("uq_") {
                tracing::debug!(constraint, "Unique constraint violated");
                return CoreError::Conflict("Device already exists".to_string());
            }
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::Internal(err.to_string())
}
