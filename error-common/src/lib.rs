//! Common error handling utilities for the clinic server
//!
//! This crate holds the process-level error type used by the binary
//! (startup, configuration, migrations, serving) and the stable error codes
//! attached to every API error body.
//!
//! # Example
//!
//! ```rust
//! use error_common::{ClinicError, Result};
//!
//! fn parse_port(raw: &str) -> Result<u16> {
//!     raw.parse()
//!         .map_err(|_| ClinicError::ConfigError(format!("invalid port: {raw}")))
//! }
//!
//! assert!(parse_port("3001").is_ok());
//! assert!(parse_port("abc").is_err());
//! ```

pub mod codes;
pub mod types;

pub use codes::*;
pub use types::*;
