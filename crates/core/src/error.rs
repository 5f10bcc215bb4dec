#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// `key` is `None` when a collection lookup came back empty.
    #[error("{entity} not found")]
    NotFound {
        entity: &'static str,
        key: Option<String>,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing device keyed by its external id.
    pub fn device_not_found(device_id: &str) -> Self {
        CoreError::NotFound {
            entity: "Device",
            key: Some(device_id.to_string()),
        }
    }
}
