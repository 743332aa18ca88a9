//! Server configuration
//!
//! Values are layered: built-in defaults, then an optional config file, then
//! environment variables (`PORT`, `DATABASE_URL`, `JWT_SECRET`,
//! `FRONTEND_URL`, ...). A `.env` file is loaded into the environment by the
//! binary before this runs.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::fmt;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24 * 7;
/// Ten years
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365 * 10;
pub const DEFAULT_BCRYPT_COST: u32 = 10;
/// Exam images and photos travel inline as base64, so bodies are large.
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;
/// Colombia, no daylight saving
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = -5;

#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection string
    pub database_url: String,
    /// HS256 signing secret for session tokens
    pub jwt_secret: String,
    /// Allowed browser origin; any origin is mirrored when unset
    #[serde(default)]
    pub frontend_url: Option<String>,
    /// Token lifetime
    pub token_ttl_hours: i64,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
    /// Request body limit
    pub max_body_bytes: usize,
    /// Clinic-local offset used for default note times
    pub utc_offset_hours: i32,
    /// Allow anyone to register once users exist
    pub open_registration: bool,
    /// Maximum pooled database connections
    pub db_max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            database_url: String::new(),
            jwt_secret: String::new(),
            frontend_url: None,
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            open_registration: false,
            db_max_connections: 10,
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .field("frontend_url", &self.frontend_url)
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("utc_offset_hours", &self.utc_offset_hours)
            .field("open_registration", &self.open_registration)
            .field("db_max_connections", &self.db_max_connections)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("database_url", defaults.database_url)?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("token_ttl_hours", defaults.token_ttl_hours)?
            .set_default("bcrypt_cost", i64::from(defaults.bcrypt_cost))?
            .set_default(
                "max_body_bytes",
                i64::try_from(defaults.max_body_bytes).unwrap_or(i64::MAX),
            )?
            .set_default("utc_offset_hours", i64::from(defaults.utc_offset_hours))?
            .set_default("open_registration", defaults.open_registration)?
            .set_default("db_max_connections", i64::from(defaults.db_max_connections))?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let config: Self = builder
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message("JWT_SECRET must be set".to_string()));
        }
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Message("DATABASE_URL must be set".to_string()));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Message(
                "BCRYPT_COST must be between 4 and 31".to_string(),
            ));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(ConfigError::Message(
                "UTC_OFFSET_HOURS must be between -12 and 14".to_string(),
            ));
        }
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.token_ttl_hours) {
            return Err(ConfigError::Message(format!(
                "TOKEN_TTL_HOURS must be between 1 and {}",
                MAX_TOKEN_TTL_HOURS
            )));
        }
        Ok(())
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
