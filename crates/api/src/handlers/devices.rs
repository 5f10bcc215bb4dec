//! Handlers for the device registry endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use vigil_core::device::{
    deserialize_optional_timestamp, CreateDeviceRequest, DeviceView, UpdateDeviceRequest,
};
use vigil_core::types::Timestamp;

use crate::error::AppResult;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for the heartbeat endpoint. The body itself is optional.
#[derive(Debug, Default, Deserialize)]
pub struct HeartbeatRequest {
    /// When the device was seen. Defaults to the server's current time.
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub timestamp: Option<Timestamp>,
}

/// Acknowledgement returned by delete.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub ok: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /devices/
///
/// Register a device. The profile is chosen from the field names supplied.
pub async fn create_device(
    State(state): State<AppState>,
    Json(input): Json<CreateDeviceRequest>,
) -> AppResult<(StatusCode, Json<DeviceView>)> {
    let device = state.devices.create(input.into_new_device()?).await?;
    Ok((StatusCode::CREATED, Json(DeviceView::record(device))))
}

/// GET /devices/
///
/// List all devices with their derived status.
pub async fn list_devices(State(state): State<AppState>) -> AppResult<Json<Vec<DeviceView>>> {
    let devices = state.devices.list().await?;
    Ok(Json(devices))
}

/// GET /devices/{device_id}
pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> AppResult<Json<DeviceView>> {
    let device = state.devices.get(&device_id).await?;
    Ok(Json(device))
}

/// PUT /devices/{device_id}
///
/// Partial update: only the supplied fields change.
pub async fn update_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(input): Json<UpdateDeviceRequest>,
) -> AppResult<Json<DeviceView>> {
    let device = state.devices.update(&device_id, input).await?;
    Ok(Json(DeviceView::record(device)))
}

/// DELETE /devices/{device_id}
pub async fn delete_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    state.devices.delete(&device_id).await?;
    Ok(Json(DeleteResponse { ok: true }))
}

/// POST /devices/{device_id}/heartbeat
///
/// Record activity for a device. With the time-series strategy the point is
/// also written to InfluxDB; a failed write is logged and does not fail the
/// request.
pub async fn record_heartbeat(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    body: Option<Json<HeartbeatRequest>>,
) -> AppResult<Json<DeviceView>> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let seen_at = input.timestamp.unwrap_or_else(|| state.devices.now());

    let device = state.devices.update_last_seen(&device_id, seen_at).await?;

    if let Some(influx) = &state.influx {
        if let Err(e) = influx.write_heartbeat(&device_id, seen_at).await {
            tracing::warn!(
                device_id = %device_id,
                error = %e,
                "Failed to write heartbeat to InfluxDB",
            );
        }
    }

    Ok(Json(state.devices.describe(device).await))
}
