use thiserror::Error;

/// PostgreSQL SQLSTATE for unique constraint violations
pub const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL SQLSTATE for foreign key violations
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Unique constraint violated: {}", constraint.as_deref().unwrap_or("unknown"))]
    UniqueViolation { constraint: Option<String> },

    #[error("Foreign key violated: {}", constraint.as_deref().unwrap_or("unknown"))]
    ForeignKeyViolation { constraint: Option<String> },

    #[error("Database error: {0}")]
    SqlxError(#[source] sqlx::Error),
}

impl DatabaseError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::UniqueViolation { .. })
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        let (code, constraint) = match &err {
            sqlx::Error::Database(db) => (
                db.code().map(|c| c.into_owned()),
                db.constraint().map(str::to_owned),
            ),
            _ => (None, None),
        };

        match code.as_deref() {
            Some(UNIQUE_VIOLATION) => DatabaseError::UniqueViolation { constraint },
            Some(FOREIGN_KEY_VIOLATION) => DatabaseError::ForeignKeyViolation { constraint },
            _ => match err {
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                    DatabaseError::ConnectionFailed(err.to_string())
                }
                other => DatabaseError::SqlxError(other),
            },
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationError(err.to_string())
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_connection_failure() {
        let err = DatabaseError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DatabaseError::ConnectionFailed(_)));
    }

    #[test]
    fn test_row_not_found_passes_through() {
        let err = DatabaseError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DatabaseError::SqlxError(sqlx::Error::RowNotFound)));
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn test_violation_display() {
        let err = DatabaseError::UniqueViolation {
            constraint: Some("cliente_cedula_key".to_string()),
        };
        assert!(err.is_unique_violation());
        assert_eq!(err.to_string(), "Unique constraint violated: cliente_cedula_key");
    }
}
