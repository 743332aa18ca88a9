use crate::auth::{hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::middleware::{ApiJson, AuthContext};
use crate::server::ClinicServer;
use crate::validate_required;
use crate::validation::RequestValidation;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Stored user row, including the password hash
#[derive(Debug, Clone, FromRow)]
pub struct Usuario {
    pub id: i32,
    pub usuario: String,
    pub password: String,
    pub nombre: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// User as exposed to clients
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, PartialEq, Eq)]
pub struct UsuarioPublico {
    pub id: i32,
    pub usuario: String,
    pub nombre: String,
}

impl From<Usuario> for UsuarioPublico {
    fn from(user: Usuario) -> Self {
        Self {
            id: user.id,
            usuario: user.usuario,
            nombre: user.nombre,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub usuario: Option<String>,
    pub password: Option<String>,
    pub nombre: Option<String>,
}

impl RequestValidation for RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.usuario, "Todos los campos son requeridos");
        validate_required!(self.password, "Todos los campos son requeridos");
        validate_required!(self.nombre, "Todos los campos son requeridos");
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub usuario: Option<String>,
    pub password: Option<String>,
}

impl RequestValidation for LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.usuario, "Usuario y contraseña son requeridos");
        validate_required!(self.password, "Usuario y contraseña son requeridos");
        Ok(())
    }
}

/// Successful login or registration
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub usuario: UsuarioPublico,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub usuario: UsuarioPublico,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// Register a new user
///
/// Anyone may register while no user exists (first-run setup) or when open
/// registration is configured. Otherwise the caller must be logged in.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Missing fields or user already registered", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Registration requires an authenticated user", body = crate::error::ApiErrorResponse)
    ),
    tag = "authentication"
)]
pub async fn register(
    State(server): State<ClinicServer>,
    caller: Option<AuthContext>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    request.validate()?;

    if caller.is_none() && !server.config.open_registration {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usuario")
            .fetch_one(server.db())
            .await?;
        if existing > 0 {
            return Err(ApiError::authentication(
                "Se requiere iniciar sesión para registrar usuarios",
            ));
        }
    }

    let usuario = request.usuario.unwrap_or_default().trim().to_string();
    let password = request.password.unwrap_or_default();
    let nombre = request.nombre.unwrap_or_default().trim().to_string();

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM usuario WHERE usuario = $1)")
        .bind(&usuario)
        .fetch_one(server.db())
        .await?;
    if taken {
        return Err(ApiError::validation("El usuario ya está registrado"));
    }

    let hash = hash_password(&password, server.config.bcrypt_cost).await?;

    let user = sqlx::query_as::<_, UsuarioPublico>(
        r#"
        INSERT INTO usuario (usuario, password, nombre)
        VALUES ($1, $2, $3)
        RETURNING id, usuario, nombre
        "#,
    )
    .bind(&usuario)
    .bind(&hash)
    .bind(&nombre)
    .fetch_one(server.db())
    .await
    .map_err(ApiError::on_unique_violation("El usuario ya está registrado"))?;

    let token = server.jwt.issue(user.id)?;

    tracing::info!(
        user_id = user.id,
        registered_by = ?caller.map(|c| c.user_id),
        "User registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            usuario: user,
            token,
        }),
    ))
}

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing credentials", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiErrorResponse)
    ),
    tag = "authentication"
)]
pub async fn login(
    State(server): State<ClinicServer>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    request.validate()?;

    let usuario = request.usuario.unwrap_or_default();
    let password = request.password.unwrap_or_default();

    let user = sqlx::query_as::<_, Usuario>("SELECT * FROM usuario WHERE usuario = $1")
        .bind(usuario.trim())
        .fetch_optional(server.db())
        .await?;

    // Same answer for unknown user and wrong password
    let Some(user) = user else {
        return Err(ApiError::authentication("Credenciales inválidas"));
    };
    if !verify_password(&password, &user.password).await? {
        return Err(ApiError::authentication("Credenciales inválidas"));
    }

    let token = server.jwt.issue(user.id)?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(AuthResponse {
        usuario: user.into(),
        token,
    }))
}

/// Current user for the presented token
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Authenticated user", body = MeResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ApiErrorResponse)
    ),
    tag = "authentication",
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(server): State<ClinicServer>,
    auth: AuthContext,
) -> ApiResult<Json<MeResponse>> {
    let user = sqlx::query_as::<_, UsuarioPublico>(
        "SELECT id, usuario, nombre FROM usuario WHERE id = $1",
    )
    .bind(auth.user_id)
    .fetch_optional(server.db())
    .await?
    .ok_or_else(|| ApiError::authentication("Usuario no encontrado"))?;

    Ok(Json(MeResponse { usuario: user }))
}
