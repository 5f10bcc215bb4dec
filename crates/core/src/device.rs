//! Device entity, profiles and request DTOs.
//!
//! A device is stored with three generic descriptive fields (`subject`,
//! `label`, `measurement`). The [`DeviceProfile`] decides which names those
//! fields carry on the wire:
//!
//! | Generic       | `clinical`   | `iot`               |
//! |---------------|--------------|---------------------|
//! | `subject`     | `patient_id` | `location`          |
//! | `label`       | `model`      | `name`              |
//! | `measurement` | `vital_type` | `quantity_measured` |

use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use validator::Validate;

use crate::error::CoreError;
use crate::liveness::{self, DeviceStatus};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of a `device_id`. Descriptive fields are capped at 256.
pub const MAX_DEVICE_ID_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Which family of field names a device uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceProfile {
    /// Patient-worn monitoring equipment.
    Clinical,
    /// General sensors placed at a location.
    Iot,
}

/// Wire names for the generic fields of one profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldNames {
    pub subject: &'static str,
    pub label: &'static str,
    pub measurement: &'static str,
}

impl DeviceProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceProfile::Clinical => "clinical",
            DeviceProfile::Iot => "iot",
        }
    }

    pub fn field_names(self) -> FieldNames {
        match self {
            DeviceProfile::Clinical => FieldNames {
                subject: "patient_id",
                label: "model",
                measurement: "vital_type",
            },
            DeviceProfile::Iot => FieldNames {
                subject: "location",
                label: "name",
                measurement: "quantity_measured",
            },
        }
    }
}

impl FromStr for DeviceProfile {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clinical" => Ok(DeviceProfile::Clinical),
            "iot" => Ok(DeviceProfile::Iot),
            other => Err(CoreError::Validation(format!(
                "Unknown device profile '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A stored device record.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    /// Surrogate key owned by the store. Never used for identity.
    pub id: DbId,
    pub device_id: String,
    pub profile: DeviceProfile,
    pub subject: String,
    pub label: String,
    pub measurement: String,
    pub last_active: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for inserting a device.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct NewDevice {
    pub device_id: String,
    pub profile: DeviceProfile,
    #[validate(length(min = 1, max = 256))]
    pub subject: String,
    #[validate(length(min = 1, max = 256))]
    pub label: String,
    #[validate(length(min = 1, max = 256))]
    pub measurement: String,
    pub last_active: Option<Timestamp>,
}

impl NewDevice {
    /// Validate the identifier and all descriptive fields.
    pub fn check(&self) -> Result<(), CoreError> {
        validate_device_id(&self.device_id)?;
        self.validate()?;
        Ok(())
    }
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct DevicePatch {
    #[validate(length(min = 1, max = 256))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 256))]
    pub label: Option<String>,
    #[validate(length(min = 1, max = 256))]
    pub measurement: Option<String>,
}

impl DevicePatch {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.label.is_none() && self.measurement.is_none()
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CoreError::Validation(errors.to_string())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate an external device identifier.
///
/// Rules:
/// - Must not be empty.
/// - Must not exceed `MAX_DEVICE_ID_LEN` characters.
/// - Must contain only alphanumeric, hyphen, underscore, dot, or colon characters.
pub fn validate_device_id(device_id: &str) -> Result<(), CoreError> {
    if device_id.is_empty() {
        return Err(CoreError::Validation(
            "device_id must not be empty".to_string(),
        ));
    }
    if device_id.chars().count() > MAX_DEVICE_ID_LEN {
        return Err(CoreError::Validation(format!(
            "device_id must not exceed {MAX_DEVICE_ID_LEN} characters"
        )));
    }
    if !device_id
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
    {
        return Err(CoreError::Validation(
            "device_id may only contain alphanumeric, hyphen, underscore, dot, or colon characters"
                .to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// Body of a create request. The profile is inferred from which field
/// names are present; exactly one profile's set must be supplied in full.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeviceRequest {
    pub device_id: String,
    pub patient_id: Option<String>,
    pub model: Option<String>,
    pub vital_type: Option<String>,
    pub location: Option<String>,
    pub name: Option<String>,
    pub quantity_measured: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub last_active: Option<Timestamp>,
}

impl CreateDeviceRequest {
    pub fn into_new_device(self) -> Result<NewDevice, CoreError> {
        let clinical = [self.patient_id, self.model, self.vital_type];
        let iot = [self.location, self.name, self.quantity_measured];

        let (profile, fields) = match (
            clinical.iter().any(Option::is_some),
            iot.iter().any(Option::is_some),
        ) {
            (true, true) => {
                return Err(CoreError::Validation(
                    "Fields of the clinical and iot profiles cannot be mixed".to_string(),
                ))
            }
            (true, false) => (DeviceProfile::Clinical, clinical),
            (false, _) => (DeviceProfile::Iot, iot),
        };

        let [Some(subject), Some(label), Some(measurement)] = fields else {
            let names = profile.field_names();
            return Err(CoreError::Validation(format!(
                "A {} device requires {}, {} and {}",
                profile.as_str(),
                names.subject,
                names.label,
                names.measurement
            )));
        };

        Ok(NewDevice {
            device_id: self.device_id,
            profile,
            subject,
            label,
            measurement,
            last_active: self.last_active,
        })
    }
}

/// Body of an update request. Any subset of the fields may be supplied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDeviceRequest {
    pub patient_id: Option<String>,
    pub model: Option<String>,
    pub vital_type: Option<String>,
    pub location: Option<String>,
    pub name: Option<String>,
    pub quantity_measured: Option<String>,
}

impl UpdateDeviceRequest {
    /// Map wire names onto the generic patch for a device of `profile`.
    ///
    /// Fields that belong to the other profile are rejected.
    pub fn into_patch(self, profile: DeviceProfile) -> Result<DevicePatch, CoreError> {
        let (own, foreign) = match profile {
            DeviceProfile::Clinical => (
                [self.patient_id, self.model, self.vital_type],
                [&self.location, &self.name, &self.quantity_measured],
            ),
            DeviceProfile::Iot => (
                [self.location, self.name, self.quantity_measured],
                [&self.patient_id, &self.model, &self.vital_type],
            ),
        };

        if foreign.iter().any(|f| f.is_some()) {
            let other = match profile {
                DeviceProfile::Clinical => DeviceProfile::Iot,
                DeviceProfile::Iot => DeviceProfile::Clinical,
            };
            let names = other.field_names();
            return Err(CoreError::Validation(format!(
                "Fields {}, {}, {} do not apply to a {} device",
                names.subject,
                names.label,
                names.measurement,
                profile.as_str()
            )));
        }

        let [subject, label, measurement] = own;
        Ok(DevicePatch {
            subject,
            label,
            measurement,
        })
    }
}

/// Accept RFC 3339 or naive (UTC) timestamps, or null.
pub fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| liveness::parse_timestamp(&s).map_err(serde::de::Error::custom))
        .transpose()
}

// ---------------------------------------------------------------------------
// Public view
// ---------------------------------------------------------------------------

/// A device as returned to clients: profile field names, no surrogate key,
/// and the derived status when one was computed.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceView {
    pub device: Device,
    pub status: Option<DeviceStatus>,
}

impl DeviceView {
    pub fn new(device: Device, status: DeviceStatus) -> Self {
        Self {
            device,
            status: Some(status),
        }
    }

    pub fn record(device: Device) -> Self {
        Self {
            device,
            status: None,
        }
    }
}

impl Serialize for DeviceView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let d = &self.device;
        let names = d.profile.field_names();
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("device_id", &d.device_id)?;
        map.serialize_entry(names.subject, &d.subject)?;
        map.serialize_entry(names.label, &d.label)?;
        map.serialize_entry(names.measurement, &d.measurement)?;
        map.serialize_entry("last_active", &d.last_active)?;
        if let Some(status) = self.status {
            map.serialize_entry("status", &status)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
