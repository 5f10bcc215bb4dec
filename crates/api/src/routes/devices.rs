//! Route definitions for the device registry.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::devices;
use crate::state::AppState;

/// Device routes.
///
/// ```text
/// POST   /devices                         -> create_device
/// GET    /devices                         -> list_devices
/// POST   /devices/                        -> create_device
/// GET    /devices/                        -> list_devices
/// GET    /devices/{device_id}             -> get_device
/// PUT    /devices/{device_id}             -> update_device
/// DELETE /devices/{device_id}             -> delete_device
/// POST   /devices/{device_id}/heartbeat   -> record_heartbeat
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/devices",
            post(devices::create_device).get(devices::list_devices),
        )
        .route(
            "/devices/",
            post(devices::create_device).get(devices::list_devices),
        )
        .route(
            "/devices/{device_id}",
            get(devices::get_device)
                .put(devices::update_device)
                .delete(devices::delete_device),
        )
        .route(
            "/devices/{device_id}/heartbeat",
            post(devices::record_heartbeat),
        )
}
