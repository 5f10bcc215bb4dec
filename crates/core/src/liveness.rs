//! Liveness derivation for devices.
//!
//! A device's status is never stored. It is recomputed from the most recent
//! evidence of activity every time the device is read, using a fixed
//! recency window.

use chrono::{NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// A device seen within this many seconds of `now` is considered active.
pub const ACTIVE_WINDOW_SECS: i64 = 300;

/// Naive formats accepted for timestamps that carry no offset.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

// ---------------------------------------------------------------------------
// Status label
// ---------------------------------------------------------------------------

/// Derived liveness classification of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// No activity has ever been observed.
    Unknown,
    /// Seen within the active window.
    Active,
    /// Seen, but not within the active window.
    Inactive,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Unknown => "unknown",
            DeviceStatus::Active => "active",
            DeviceStatus::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Classify a device from its last activity time.
///
/// - `None` yields [`DeviceStatus::Unknown`].
/// - `now - last_active <= window` yields [`DeviceStatus::Active`]; the
///   boundary is inclusive.
/// - A `last_active` later than `now` (clock skew) has a negative elapsed
///   time and is therefore [`DeviceStatus::Active`].
pub fn derive_status(
    last_active: Option<Timestamp>,
    now: Timestamp,
    window: chrono::Duration,
) -> DeviceStatus {
    match last_active {
        None => DeviceStatus::Unknown,
        Some(seen) if now - seen <= window => DeviceStatus::Active,
        Some(_) => DeviceStatus::Inactive,
    }
}

/// True when the evidence lies ahead of `now`.
pub fn is_from_future(last_active: Option<Timestamp>, now: Timestamp) -> bool {
    last_active.is_some_and(|seen| seen > now)
}

/// The default active window as a [`chrono::Duration`].
pub fn default_window() -> chrono::Duration {
    chrono::Duration::seconds(ACTIVE_WINDOW_SECS)
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of the current time, injected so derivation stays deterministic.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock pinned to one instant. Used by tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Timestamp parsing
// ---------------------------------------------------------------------------

/// Parse a timestamp, normalising to UTC.
///
/// RFC 3339 values keep their offset and are converted. Values without an
/// offset are taken to be UTC already.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, CoreError> {
    let raw = raw.trim();
    if let Ok(aware) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(aware.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(CoreError::Validation(format!("Invalid timestamp: \"{raw}\"")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
