use crate::auth::JwtService;
use crate::config::ServerConfig;
use anyhow::{Context, Result};
use database_layer::DatabasePool;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared application state handed to every handler
#[derive(Clone, Debug)]
pub struct ClinicServer {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Database connection pool
    pub database: DatabasePool,
    /// Session token service
    pub jwt: JwtService,
}

impl ClinicServer {
    /// Connect to the database described by the configuration
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let database = DatabasePool::new(&config.database_url, config.db_max_connections)
            .await
            .context("Failed to connect to the database")?;

        Ok(Self::with_database(database, config))
    }

    /// Create a server instance with a provided database pool
    /// This is useful for testing
    pub fn new_with_pool(pool: PgPool, config: ServerConfig) -> Self {
        Self::with_database(DatabasePool::from_pool(pool), config)
    }

    fn with_database(database: DatabasePool, config: ServerConfig) -> Self {
        let jwt = JwtService::new(&config.jwt_secret, config.token_ttl_hours);
        Self {
            config: Arc::new(config),
            database,
            jwt,
        }
    }

    /// Pool for running queries
    pub fn db(&self) -> &PgPool {
        self.database.pool()
    }
}
