//! Clinic server - patient records and billing API
//!
//! This library provides the HTTP API of a small clinic: staff
//! authentication, patients, clinical histories with exam images,
//! prescriptions, reminders and invoices.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod seed;
pub mod server;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::*;
pub use server::ClinicServer;

use axum::{extract::DefaultBodyLimit, middleware::from_fn, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the main application router with all routes and middleware
pub fn create_app(server: ClinicServer) -> Router {
    let body_limit = server.config.max_body_bytes;

    routes::create_routes(&server)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::create_cors_layer(&server.config))
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(from_fn(middleware::request_timing_middleware))
                .layer(from_fn(middleware::audit_logging_middleware)),
        )
        .with_state(server)
}
