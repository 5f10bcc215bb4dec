//! Row model for the `devices` table.

use std::str::FromStr;

use sqlx::FromRow;
use vigil_core::device::{Device, DeviceProfile};
use vigil_core::error::CoreError;
use vigil_core::types::{DbId, Timestamp};

/// A row from the `devices` table.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceRow {
    pub id: DbId,
    pub device_id: String,
    pub profile: String,
    pub subject: String,
    pub label: String,
    pub measurement: String,
    pub last_active: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<DeviceRow> for Device {
    type Error = CoreError;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        let profile = DeviceProfile::from_str(&row.profile).map_err(|_| {
            CoreError::Internal(format!(
                "devices.profile holds unexpected value '{}'",
                row.profile
            ))
        })?;
        Ok(Device {
            id: row.id,
            device_id: row.device_id,
            profile,
            subject: row.subject,
            label: row.label,
            measurement: row.measurement,
            last_active: row.last_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
