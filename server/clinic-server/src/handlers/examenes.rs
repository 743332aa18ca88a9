use crate::error::{ApiError, ApiResult, MessageResponse};
use crate::handlers::non_blank;
use crate::middleware::{ApiPath, AuthContext};
use crate::server::ClinicServer;
use crate::utils::numbers::lenient_i32;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use utoipa::ToSchema;

const NOMBRE_POR_DEFECTO: &str = "Examen";

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Exam image attached to a clinical history
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Examen {
    pub id: i32,
    pub historia_id: i32,
    pub nombre: String,
    /// `data:` URL or bare base64
    pub imagen: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Exam sent along with a history
///
/// Entries that already carry an `id` are stored ones echoed back by the
/// client and are ignored.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NuevoExamen {
    #[serde(default, deserialize_with = "lenient_i32")]
    pub id: Option<i32>,
    pub nombre: Option<String>,
    pub imagen: Option<String>,
}

impl NuevoExamen {
    fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

pub(crate) fn validate_nuevos(examenes: &[NuevoExamen]) -> Result<(), ApiError> {
    let missing_image = examenes
        .iter()
        .filter(|e| e.is_new())
        .any(|e| e.imagen.as_deref().map_or(true, |i| i.trim().is_empty()));
    if missing_image {
        return Err(ApiError::validation("Cada examen requiere una imagen"));
    }
    Ok(())
}

// ============================================================================
// SHARED QUERIES
// ============================================================================

/// Store the new exams of a history inside the caller's transaction
pub(crate) async fn insert_nuevos(
    tx: &mut Transaction<'_, Postgres>,
    historia_id: i32,
    examenes: &[NuevoExamen],
) -> ApiResult<()> {
    for examen in examenes.iter().filter(|e| e.is_new()) {
        let nombre =
            non_blank(examen.nombre.clone()).unwrap_or_else(|| NOMBRE_POR_DEFECTO.to_string());
        sqlx::query("INSERT INTO examen (historia_id, nombre, imagen) VALUES ($1, $2, $3)")
            .bind(historia_id)
            .bind(nombre)
            .bind(examen.imagen.as_deref().unwrap_or_default())
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

pub(crate) async fn fetch_de_historia(db: &PgPool, historia_id: i32) -> ApiResult<Vec<Examen>> {
    Ok(
        sqlx::query_as::<_, Examen>("SELECT * FROM examen WHERE historia_id = $1 ORDER BY id")
            .bind(historia_id)
            .fetch_all(db)
            .await?,
    )
}

pub(crate) async fn fetch_de_historias(db: &PgPool, historia_ids: &[i32]) -> ApiResult<Vec<Examen>> {
    if historia_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(sqlx::query_as::<_, Examen>(
        "SELECT * FROM examen WHERE historia_id = ANY($1) ORDER BY id",
    )
    .bind(historia_ids)
    .fetch_all(db)
    .await?)
}

// ============================================================================
// HANDLERS
// ============================================================================

/// Delete an exam image
#[utoipa::path(
    delete,
    path = "/api/examenes/{id}",
    params(("id" = i32, Path, description = "Exam ID")),
    responses(
        (status = 200, description = "Exam deleted", body = MessageResponse),
        (status = 404, description = "Exam not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "historias",
    security(("bearer_auth" = []))
)]
pub async fn delete_examen(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<MessageResponse>> {
    let deleted = sqlx::query("DELETE FROM examen WHERE id = $1")
        .bind(id)
        .execute(server.db())
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::not_found("Examen no encontrado"));
    }

    tracing::info!(examen_id = id, user_id = auth.user_id, "Examen deleted");
    Ok(MessageResponse::new("Examen eliminado correctamente"))
}
