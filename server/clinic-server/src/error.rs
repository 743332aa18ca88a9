use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use database_layer::DatabaseError;
use error_common::codes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Error body returned by every failing endpoint
///
/// The frontend reads `error` and shows it to the user as-is.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Unique error ID for tracking
    pub error_id: String,
    /// Error type
    pub error_type: String,
    /// Stable error code
    pub code: String,
    /// Timestamp when error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// `{"message": ...}` body for deletions and other acknowledgements
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Main API error enum
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    Authentication { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    BadRequest { message: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Map a unique violation to a domain message, pass anything else through
    ///
    /// Covers the race between an existence check and the insert.
    pub fn on_unique_violation(message: &'static str) -> impl Fn(sqlx::Error) -> ApiError {
        move |err| match DatabaseError::from(err) {
            db_err if db_err.is_unique_violation() => ApiError::validation(message),
            db_err => ApiError::Database(db_err),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Database(db_err) => match db_err {
                DatabaseError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DatabaseError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DatabaseError::ConnectionFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "validation_error",
            ApiError::Authentication { .. } => "authentication_error",
            ApiError::NotFound { .. } => "not_found",
            ApiError::Database(_) => "database_error",
            ApiError::Internal { .. } => "internal_error",
            ApiError::BadRequest { .. } => "bad_request",
        }
    }

    /// Get the stable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => codes::validation::MISSING_REQUIRED_FIELD,
            ApiError::BadRequest { .. } => codes::validation::INVALID_FORMAT,
            ApiError::Authentication { .. } => codes::authentication::TOKEN_INVALID,
            ApiError::NotFound { .. } => codes::resource::NOT_FOUND,
            ApiError::Database(db_err) => match db_err {
                DatabaseError::ConnectionFailed(_) => codes::database::CONNECTION_FAILED,
                DatabaseError::UniqueViolation { .. }
                | DatabaseError::ForeignKeyViolation { .. } => {
                    codes::database::CONSTRAINT_VIOLATION
                }
                _ => codes::database::QUERY_FAILED,
            },
            ApiError::Internal { .. } => codes::system::INTERNAL,
        }
    }

    /// Message shown to the client; internal details never leave the server
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Database(db_err) => match db_err {
                DatabaseError::ConnectionFailed(_) => {
                    "No se pudo conectar con la base de datos".to_string()
                }
                DatabaseError::UniqueViolation { .. } => {
                    "Ya existe un registro con esos datos".to_string()
                }
                DatabaseError::ForeignKeyViolation { .. } => {
                    "El registro relacionado no existe".to_string()
                }
                _ => "Error en la base de datos".to_string(),
            },
            ApiError::Internal { .. } => "Error interno del servidor".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();
        // Constraint details and search terms can carry cédulas
        let detail = logger_redacted::redact(&self.to_string());

        if status_code.is_server_error() {
            error!(
                error_id = %error_id,
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %detail,
                "API error occurred"
            );
        } else {
            warn!(
                error_id = %error_id,
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %detail,
                "API request rejected"
            );
        }

        let error_response = ApiErrorResponse {
            error: self.public_message(),
            error_id,
            error_type: self.error_type().to_string(),
            code: self.error_code().to_string(),
            timestamp: chrono::Utc::now(),
        };

        (status_code, Json(error_response)).into_response()
    }
}

/// Convert SQLx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(sqlx_error: sqlx::Error) -> Self {
        ApiError::Database(DatabaseError::from(sqlx_error))
    }
}

/// Convert anyhow errors to API errors
impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::Internal {
            message: error.to_string(),
        }
    }
}

/// Convert JSON body rejections to API errors
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest {
            message: format!("JSON inválido: {}", rejection.body_text()),
        }
    }
}

/// Convert query string rejections to API errors
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest {
            message: format!("Parámetros inválidos: {}", rejection.body_text()),
        }
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
