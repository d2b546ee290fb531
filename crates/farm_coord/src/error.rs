use farm_core::EngineError;

/// Typed failure surface of the coordinator. Never silently swallowed;
/// the daemon maps these onto HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum CoordError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Optimistic transaction kept losing the version race.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<EngineError> for CoordError {
    fn from(err: EngineError) -> Self {
        CoordError::InvalidArgument(err.to_string())
    }
}
