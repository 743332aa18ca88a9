use thiserror::Error;

/// Process-level errors raised outside of request handling
#[derive(Error, Debug)]
pub enum ClinicError {
    /// Network communication errors (binding the listener)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    ServerError(String),

    /// Database connection, migration or seed errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Wrapped external errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClinicError {
    /// Stable code for this error, shared with API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            ClinicError::NetworkError(_) | ClinicError::ServerError(_) => {
                crate::codes::system::SERVER_FAILURE
            }
            ClinicError::DatabaseError(_) => crate::codes::database::QUERY_FAILED,
            ClinicError::ConfigError(_) => crate::codes::system::CONFIGURATION,
            ClinicError::Other(_) => crate::codes::system::INTERNAL,
        }
    }
}

/// Result type alias for process-level operations
pub type Result<T> = std::result::Result<T, ClinicError>;

/// Log a process-level error with its code
pub fn log_error(context: &str, error: &ClinicError) {
    tracing::error!(
        context = context,
        error_code = error.code(),
        error = %error,
        "Clinic server error occurred"
    );
}
