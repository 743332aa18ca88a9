//! Authentication context extraction middleware
//!
//! `require_auth` guards the protected routers: it validates the bearer
//! token and stores an [`AuthContext`] in the request extensions. Handlers
//! that need the caller take `AuthContext` as an extractor, which reads the
//! stored context or validates the header itself on unguarded routes.

use crate::error::ApiError;
use crate::server::ClinicServer;
use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::{header::AUTHORIZATION, request::Parts};
use axum::middleware::Next;
use axum::response::Response;

/// Authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: i32,
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
///
/// The scheme is matched case-insensitively and the value must be exactly
/// two space-separated parts.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, ApiError> {
    let header = header.ok_or_else(|| ApiError::authentication("Token no proporcionado"))?;

    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(ApiError::authentication("Token mal formateado")),
    }
}

/// Validate the request's bearer token
fn authenticate(parts: &Parts, server: &ClinicServer) -> Result<AuthContext, ApiError> {
    let header = match parts.headers.get(AUTHORIZATION) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| ApiError::authentication("Token mal formateado"))?,
        ),
        None => None,
    };
    let token = parse_bearer(header)?;
    let claims = server.jwt.verify(token)?;

    Ok(AuthContext { user_id: claims.id })
}

/// Reject unauthenticated requests before they reach a protected handler
pub async fn require_auth(
    State(server): State<ClinicServer>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();
    let auth = authenticate(&parts, &server)?;
    parts.extensions.insert(auth);

    let mut response = next.run(Request::from_parts(parts, body)).await;
    // Lets the audit log name the caller
    response.extensions_mut().insert(auth);
    Ok(response)
}

#[async_trait]
impl FromRequestParts<ClinicServer> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        server: &ClinicServer,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<AuthContext>() {
            return Ok(*auth);
        }

        let auth = authenticate(parts, server)?;
        parts.extensions.insert(auth);
        Ok(auth)
    }
}
