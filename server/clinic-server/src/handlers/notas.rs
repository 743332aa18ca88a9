use crate::error::{ApiError, ApiResult, MessageResponse};
use crate::handlers::non_blank;
use crate::middleware::{ApiJson, ApiPath, ApiQuery, AuthContext};
use crate::server::ClinicServer;
use crate::utils::query_builder::SearchQuery;
use crate::utils::timestamps::{hora_local, parse_fecha_opt};
use crate::validate_required;
use crate::validation::RequestValidation;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Reminder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotaEstado {
    Abierta,
    Cerrada,
}

impl NotaEstado {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotaEstado::Abierta => "abierta",
            NotaEstado::Cerrada => "cerrada",
        }
    }
}

impl fmt::Display for NotaEstado {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotaEstado {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abierta" => Ok(NotaEstado::Abierta),
            "cerrada" => Ok(NotaEstado::Cerrada),
            _ => Err(ApiError::validation("Estado inválido")),
        }
    }
}

/// Free-text reminder
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Nota {
    pub id: i32,
    pub contenido: String,
    pub fecha: chrono::DateTime<chrono::Utc>,
    /// Clinic-local `HH:MM`
    pub hora: String,
    /// `abierta` or `cerrada`
    pub estado: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateNotaRequest {
    pub contenido: Option<String>,
    /// Defaults to now
    pub fecha: Option<String>,
    /// Defaults to the current clinic-local time
    pub hora: Option<String>,
}

impl RequestValidation for CreateNotaRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.contenido, "El contenido es requerido");
        Ok(())
    }
}

/// Absent fields keep their stored value
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateNotaRequest {
    pub contenido: Option<String>,
    pub fecha: Option<String>,
    pub hora: Option<String>,
    pub estado: Option<String>,
}

impl UpdateNotaRequest {
    fn parsed_estado(&self) -> Result<Option<NotaEstado>, ApiError> {
        self.estado.as_deref().map(NotaEstado::from_str).transpose()
    }
}

impl RequestValidation for UpdateNotaRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.contenido.is_some() {
            validate_required!(self.contenido, "El contenido es requerido");
        }
        self.parsed_estado().map(|_| ())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateEstadoRequest {
    pub estado: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListNotasParams {
    /// `abierta` or `cerrada`
    pub estado: Option<String>,
    /// Matches contenido
    pub search: Option<String>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// List reminders, newest first
#[utoipa::path(
    get,
    path = "/api/notas",
    params(ListNotasParams),
    responses(
        (status = 200, description = "Reminders", body = Vec<Nota>),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse)
    ),
    tag = "notas",
    security(("bearer_auth" = []))
)]
pub async fn list_notas(
    State(server): State<ClinicServer>,
    ApiQuery(params): ApiQuery<ListNotasParams>,
) -> ApiResult<Json<Vec<Nota>>> {
    let mut query = SearchQuery::new("SELECT n.* FROM nota n WHERE TRUE");
    query
        .filter_eq("n.estado", non_blank(params.estado))
        .search(&["n.contenido"], params.search.as_deref())
        .order_by("n.fecha", "DESC")
        .order_by("n.id", "DESC");

    let notas: Vec<Nota> = query.build_query_as().fetch_all(server.db()).await?;
    Ok(Json(notas))
}

/// Get a reminder
#[utoipa::path(
    get,
    path = "/api/notas/{id}",
    params(("id" = i32, Path, description = "Reminder ID")),
    responses(
        (status = 200, description = "Reminder", body = Nota),
        (status = 404, description = "Reminder not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "notas",
    security(("bearer_auth" = []))
)]
pub async fn get_nota(
    State(server): State<ClinicServer>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Nota>> {
    sqlx::query_as::<_, Nota>("SELECT * FROM nota WHERE id = $1")
        .bind(id)
        .fetch_optional(server.db())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Nota no encontrada"))
}

/// Create an open reminder
#[utoipa::path(
    post,
    path = "/api/notas",
    request_body = CreateNotaRequest,
    responses(
        (status = 201, description = "Reminder created", body = Nota),
        (status = 400, description = "Missing content", body = crate::error::ApiErrorResponse)
    ),
    tag = "notas",
    security(("bearer_auth" = []))
)]
pub async fn create_nota(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    ApiJson(request): ApiJson<CreateNotaRequest>,
) -> ApiResult<(StatusCode, Json<Nota>)> {
    request.validate()?;

    let now = chrono::Utc::now();
    let fecha = parse_fecha_opt(request.fecha.as_deref())?.unwrap_or(now);
    let hora = non_blank(request.hora)
        .unwrap_or_else(|| hora_local(now, server.config.utc_offset_hours));

    let nota = sqlx::query_as::<_, Nota>(
        r#"
        INSERT INTO nota (contenido, fecha, hora, estado)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(request.contenido.unwrap_or_default())
    .bind(fecha)
    .bind(&hora)
    .bind(NotaEstado::Abierta.as_str())
    .fetch_one(server.db())
    .await?;

    tracing::info!(nota_id = nota.id, user_id = auth.user_id, "Nota created");
    Ok((StatusCode::CREATED, Json(nota)))
}

/// Update a reminder
#[utoipa::path(
    put,
    path = "/api/notas/{id}",
    params(("id" = i32, Path, description = "Reminder ID")),
    request_body = UpdateNotaRequest,
    responses(
        (status = 200, description = "Reminder updated", body = Nota),
        (status = 400, description = "Invalid state or blank content", body = crate::error::ApiErrorResponse),
        (status = 404, description = "Reminder not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "notas",
    security(("bearer_auth" = []))
)]
pub async fn update_nota(
    State(server): State<ClinicServer>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateNotaRequest>,
) -> ApiResult<Json<Nota>> {
    request.validate()?;

    let estado = request.parsed_estado()?;
    let fecha = parse_fecha_opt(request.fecha.as_deref())?;

    sqlx::query_as::<_, Nota>(
        r#"
        UPDATE nota
        SET contenido = COALESCE($2, contenido),
            fecha = COALESCE($3, fecha),
            hora = COALESCE($4, hora),
            estado = COALESCE($5, estado),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(request.contenido)
    .bind(fecha)
    .bind(non_blank(request.hora))
    .bind(estado.map(|e| e.as_str()))
    .fetch_optional(server.db())
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::not_found("Nota no encontrada"))
}

/// Open or close a reminder
#[utoipa::path(
    patch,
    path = "/api/notas/{id}/estado",
    params(("id" = i32, Path, description = "Reminder ID")),
    request_body = UpdateEstadoRequest,
    responses(
        (status = 200, description = "State changed", body = Nota),
        (status = 400, description = "Invalid state", body = crate::error::ApiErrorResponse),
        (status = 404, description = "Reminder not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "notas",
    security(("bearer_auth" = []))
)]
pub async fn update_nota_estado(
    State(server): State<ClinicServer>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateEstadoRequest>,
) -> ApiResult<Json<Nota>> {
    let estado: NotaEstado = request.estado.as_deref().unwrap_or_default().parse()?;

    sqlx::query_as::<_, Nota>(
        "UPDATE nota SET estado = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(estado.as_str())
    .fetch_optional(server.db())
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::not_found("Nota no encontrada"))
}

/// Delete a reminder
#[utoipa::path(
    delete,
    path = "/api/notas/{id}",
    params(("id" = i32, Path, description = "Reminder ID")),
    responses(
        (status = 200, description = "Reminder deleted", body = MessageResponse),
        (status = 404, description = "Reminder not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "notas",
    security(("bearer_auth" = []))
)]
pub async fn delete_nota(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<MessageResponse>> {
    let deleted = sqlx::query("DELETE FROM nota WHERE id = $1")
        .bind(id)
        .execute(server.db())
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::not_found("Nota no encontrada"));
    }

    tracing::info!(nota_id = id, user_id = auth.user_id, "Nota deleted");
    Ok(MessageResponse::new("Nota eliminada correctamente"))
}
