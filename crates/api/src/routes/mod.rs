pub mod devices;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the device route tree, mounted at the root.
///
/// Route hierarchy:
///
/// ```text
/// /devices                                  create, list
/// /devices/                                 create, list
/// /devices/{device_id}                      get, update, delete
/// /devices/{device_id}/heartbeat            record activity
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(devices::router())
}
