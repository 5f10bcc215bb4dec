//! InfluxDB v2 client used as the time-series status source.
//!
//! [`InfluxClient`] implements [`vigil_core::status_source::LastSeenQuery`]
//! so it can back a `TimeSeriesActivity` strategy, and also writes
//! heartbeat points.

pub mod client;
pub mod config;
pub mod flux;

pub use client::{InfluxClient, InfluxError};
pub use config::InfluxConfig;
