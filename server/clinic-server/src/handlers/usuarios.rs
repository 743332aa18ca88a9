use crate::auth::{hash_password, verify_password};
use crate::error::{ApiError, ApiResult, MessageResponse};
use crate::handlers::auth::{Usuario, UsuarioPublico};
use crate::handlers::non_blank;
use crate::middleware::{ApiJson, ApiPath, AuthContext};
use crate::server::ClinicServer;
use crate::validate_required;
use crate::validation::RequestValidation;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UsuarioListItem {
    pub id: i32,
    pub usuario: String,
    pub nombre: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Blank values leave the stored field unchanged
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUsuarioRequest {
    pub usuario: Option<String>,
    pub nombre: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// Checked only when given
    pub password_actual: Option<String>,
    pub password_nueva: Option<String>,
}

impl RequestValidation for ChangePasswordRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.password_nueva, "La nueva contraseña es requerida");
        Ok(())
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// List users
#[utoipa::path(
    get,
    path = "/api/auth/usuarios",
    responses(
        (status = 200, description = "Users", body = Vec<UsuarioListItem>),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse)
    ),
    tag = "usuarios",
    security(("bearer_auth" = []))
)]
pub async fn list_usuarios(
    State(server): State<ClinicServer>,
) -> ApiResult<Json<Vec<UsuarioListItem>>> {
    let usuarios = sqlx::query_as::<_, UsuarioListItem>(
        "SELECT id, usuario, nombre, created_at FROM usuario ORDER BY id",
    )
    .fetch_all(server.db())
    .await?;

    Ok(Json(usuarios))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/api/auth/usuarios/{id}",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UsuarioPublico),
        (status = 404, description = "User not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "usuarios",
    security(("bearer_auth" = []))
)]
pub async fn get_usuario(
    State(server): State<ClinicServer>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<UsuarioPublico>> {
    let usuario = sqlx::query_as::<_, UsuarioPublico>(
        "SELECT id, usuario, nombre FROM usuario WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(server.db())
    .await?
    .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    Ok(Json(usuario))
}

/// Update a user's login or display name
#[utoipa::path(
    put,
    path = "/api/auth/usuarios/{id}",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUsuarioRequest,
    responses(
        (status = 200, description = "User updated", body = UsuarioPublico),
        (status = 400, description = "Login already in use", body = crate::error::ApiErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "usuarios",
    security(("bearer_auth" = []))
)]
pub async fn update_usuario(
    State(server): State<ClinicServer>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateUsuarioRequest>,
) -> ApiResult<Json<UsuarioPublico>> {
    let usuario = non_blank(request.usuario);
    let nombre = non_blank(request.nombre);

    if let Some(ref login) = usuario {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM usuario WHERE usuario = $1 AND id <> $2)",
        )
        .bind(login)
        .bind(id)
        .fetch_one(server.db())
        .await?;
        if taken {
            return Err(ApiError::validation("El nombre de usuario ya está en uso"));
        }
    }

    let updated = sqlx::query_as::<_, UsuarioPublico>(
        r#"
        UPDATE usuario
        SET usuario = COALESCE($2, usuario),
            nombre = COALESCE($3, nombre),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, usuario, nombre
        "#,
    )
    .bind(id)
    .bind(usuario)
    .bind(nombre)
    .fetch_optional(server.db())
    .await
    .map_err(ApiError::on_unique_violation("El nombre de usuario ya está en uso"))?
    .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    Ok(Json(updated))
}

/// Change a user's password
#[utoipa::path(
    put,
    path = "/api/auth/usuarios/{id}/password",
    params(("id" = i32, Path, description = "User ID")),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "New password missing", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Current password incorrect", body = crate::error::ApiErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "usuarios",
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    request.validate()?;

    let user = sqlx::query_as::<_, Usuario>("SELECT * FROM usuario WHERE id = $1")
        .bind(id)
        .fetch_optional(server.db())
        .await?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    if let Some(actual) = request.password_actual.filter(|p| !p.is_empty()) {
        if !verify_password(&actual, &user.password).await? {
            return Err(ApiError::authentication("Contraseña actual incorrecta"));
        }
    }

    let nueva = request.password_nueva.unwrap_or_default();
    let hash = hash_password(&nueva, server.config.bcrypt_cost).await?;

    sqlx::query("UPDATE usuario SET password = $2, updated_at = NOW() WHERE id = $1")
        .bind(user.id)
        .bind(&hash)
        .execute(server.db())
        .await?;

    tracing::info!(user_id = user.id, changed_by = auth.user_id, "Password changed");

    Ok(MessageResponse::new("Contraseña actualizada correctamente"))
}

/// Delete a user
///
/// The last remaining user cannot be deleted.
#[utoipa::path(
    delete,
    path = "/api/auth/usuarios/{id}",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "Only user in the system", body = crate::error::ApiErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "usuarios",
    security(("bearer_auth" = []))
)]
pub async fn delete_usuario(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<MessageResponse>> {
    let mut tx = server.database.begin().await?;

    // Serialize concurrent deletions so the count stays meaningful
    sqlx::query("LOCK TABLE usuario IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut *tx)
        .await?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usuario")
        .fetch_one(&mut *tx)
        .await?;
    if count <= 1 {
        return Err(ApiError::validation(
            "No se puede eliminar el único usuario del sistema",
        ));
    }

    let deleted = sqlx::query("DELETE FROM usuario WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::not_found("Usuario no encontrado"));
    }

    tx.commit().await?;
    tracing::info!(user_id = id, deleted_by = auth.user_id, "User deleted");

    Ok(MessageResponse::new("Usuario eliminado correctamente"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_password_required() {
        let request: ChangePasswordRequest =
            serde_json::from_str(r#"{"passwordActual": "admin123"}"#).unwrap();
        assert_eq!(
            request.validate().unwrap_err().to_string(),
            "La nueva contraseña es requerida"
        );
    }

    #[test]
    fn test_list_item_serializes_camel_case() {
        let item = UsuarioListItem {
            id: 1,
            usuario: "admin".into(),
            nombre: "Administrador".into(),
            created_at: chrono::Utc::now(),
        };
        let json = serde_json::to_value(item).unwrap();
        assert!(json.get("createdAt").is_some());
    }
}
