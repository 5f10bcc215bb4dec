//! Repository for the `devices` table.

use sqlx::PgPool;
use vigil_core::device::{DevicePatch, NewDevice};
use vigil_core::types::Timestamp;

use crate::models::device::DeviceRow;

/// Column list for `devices` queries.
const COLUMNS: &str = "\
    id, device_id, profile, subject, label, measurement, \
    last_active, created_at, updated_at";

/// Provides CRUD operations for devices, keyed by the external `device_id`.
pub struct DeviceRepo;

impl DeviceRepo {
    // ── Mutations ────────────────────────────────────────────────────────

    /// Insert a new device.
    ///
    /// A duplicate `device_id` violates `uq_devices_device_id`.
    pub async fn create(pool: &PgPool, input: &NewDevice) -> Result<DeviceRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO devices (device_id, profile, subject, label, measurement, last_active)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DeviceRow>(&query)
            .bind(&input.device_id)
            .bind(input.profile.as_str())
            .bind(&input.subject)
            .bind(&input.label)
            .bind(&input.measurement)
            .bind(input.last_active)
            .fetch_one(pool)
            .await
    }

    /// Update a device. Only non-`None` fields in `patch` are applied.
    pub async fn update(
        pool: &PgPool,
        device_id: &str,
        patch: &DevicePatch,
    ) -> Result<Option<DeviceRow>, sqlx::Error> {
        let query = format!(
            "UPDATE devices SET
                subject = COALESCE($2, subject),
                label = COALESCE($3, label),
                measurement = COALESCE($4, measurement)
             WHERE device_id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DeviceRow>(&query)
            .bind(device_id)
            .bind(&patch.subject)
            .bind(&patch.label)
            .bind(&patch.measurement)
            .fetch_optional(pool)
            .await
    }

    /// Set `last_active`. Returns `None` if the device does not exist.
    pub async fn touch_last_active(
        pool: &PgPool,
        device_id: &str,
        seen_at: Timestamp,
    ) -> Result<Option<DeviceRow>, sqlx::Error> {
        let query = format!(
            "UPDATE devices SET last_active = $2
             WHERE device_id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DeviceRow>(&query)
            .bind(device_id)
            .bind(seen_at)
            .fetch_optional(pool)
            .await
    }

    /// Delete a device. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, device_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM devices WHERE device_id = $1")
            .bind(device_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Queries ──────────────────────────────────────────────────────────

    /// Find a device by its external identifier.
    pub async fn find_by_device_id(
        pool: &PgPool,
        device_id: &str,
    ) -> Result<Option<DeviceRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices WHERE device_id = $1");
        sqlx::query_as::<_, DeviceRow>(&query)
            .bind(device_id)
            .fetch_optional(pool)
            .await
    }

    /// List all devices in creation order.
    pub async fn list(pool: &PgPool) -> Result<Vec<DeviceRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices ORDER BY id ASC");
        sqlx::query_as::<_, DeviceRow>(&query)
            .fetch_all(pool)
            .await
    }
}
