//! Domain layer for the device registry.
//!
//! Holds the entity types, the error taxonomy, liveness derivation and the
//! traits the storage and time-series crates implement. Nothing here talks
//! to a database or the network.

pub mod device;
pub mod error;
pub mod liveness;
pub mod registry;
pub mod service;
pub mod status_source;
pub mod types;
