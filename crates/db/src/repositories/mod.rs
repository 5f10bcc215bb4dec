//! Repository layer: one zero-sized struct per table.

pub mod device_repo;

pub use device_repo::DeviceRepo;
