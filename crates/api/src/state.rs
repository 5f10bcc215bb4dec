use std::sync::Arc;

use vigil_core::liveness::SystemClock;
use vigil_core::service::DeviceService;
use vigil_core::status_source::{RecordedActivity, StatusSource, TimeSeriesActivity};
use vigil_db::PgDeviceStore;
use vigil_influx::{InfluxClient, InfluxError};

use crate::config::{ServerConfig, StatusConfig, StatusStrategy};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: vigil_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Device registry operations with the configured status strategy.
    pub devices: Arc<DeviceService>,
    /// InfluxDB client, present only when status comes from the time-series store.
    pub influx: Option<Arc<InfluxClient>>,
}

impl AppState {
    /// Wire the device service for the configured status strategy.
    pub fn new(
        pool: vigil_db::DbPool,
        config: ServerConfig,
        status: &StatusConfig,
    ) -> Result<Self, InfluxError> {
        let influx = match (status.strategy, &status.influx) {
            (StatusStrategy::Timeseries, Some(influx_config)) => {
                Some(Arc::new(InfluxClient::new(influx_config.clone())?))
            }
            (StatusStrategy::Timeseries, None) => {
                return Err(InfluxError::Config(
                    "timeseries strategy requires InfluxDB settings".into(),
                ))
            }
            (StatusStrategy::Recorded, _) => None,
        };

        let source: Arc<dyn StatusSource> = match &influx {
            Some(client) => Arc::new(TimeSeriesActivity::new(client.clone(), status.window())),
            None => Arc::new(RecordedActivity::new(status.window())),
        };

        let devices = DeviceService::new(
            Arc::new(PgDeviceStore::new(pool.clone())),
            source,
            Arc::new(SystemClock),
        );

        Ok(Self {
            pool,
            config: Arc::new(config),
            devices: Arc::new(devices),
            influx,
        })
    }
}
