//! Database layer for the clinic server
//!
//! Owns the PostgreSQL connection pool, the embedded schema migrations under
//! `migrations/`, and the error type every query failure is classified into.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use database_layer::DatabasePool;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = DatabasePool::new("postgresql://localhost/clinica", 10).await?;
//!     db.run_migrations().await?;
//!     assert!(db.is_healthy().await);
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod error;

pub use connection::*;
pub use error::*;
