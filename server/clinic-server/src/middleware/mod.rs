//! HTTP middleware: authentication, CORS, timing and audit logging

pub mod auth_context;
pub mod extractors;

pub use auth_context::{parse_bearer, require_auth, AuthContext};
pub use extractors::{ApiJson, ApiPath, ApiQuery, FormOrJson};

use crate::config::ServerConfig;
use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Request timing middleware
pub async fn request_timing_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    // Search terms in query strings are often names or cédulas
    let uri = logger_redacted::redact(&request.uri().to_string());

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        duration_ms = start.elapsed().as_millis(),
        status = response.status().as_u16(),
        "Request processed"
    );

    response
}

/// Audit logging middleware
///
/// Records every state-changing request with the authenticated user, if any.
pub async fn audit_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    if matches!(method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return next.run(request).await;
    }
    let path = logger_redacted::redact(request.uri().path());

    let response = next.run(request).await;

    let user_id = response
        .extensions()
        .get::<AuthContext>()
        .map(|auth| auth.user_id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    tracing::info!(
        target: "audit",
        method = %method,
        path = %path,
        user_id = %user_id,
        status = response.status().as_u16(),
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Audit log: Request handled"
    );

    response
}

/// Create CORS layer for the application
///
/// Only the configured frontend origin is allowed; without one the request
/// origin is mirrored back. Credentials are allowed either way.
pub fn create_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origin = match config
        .frontend_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
    {
        Some(url) => match HeaderValue::from_str(url.trim_end_matches('/')) {
            Ok(value) => AllowOrigin::exact(value),
            Err(e) => {
                tracing::warn!(error = %e, "FRONTEND_URL is not a valid origin, mirroring request origin");
                AllowOrigin::mirror_request()
            }
        },
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}
