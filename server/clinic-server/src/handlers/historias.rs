use crate::error::{ApiError, ApiResult, MessageResponse};
use crate::handlers::clientes::{self, Cliente, ClienteResumen};
use crate::handlers::examenes::{self, Examen, NuevoExamen};
use crate::handlers::{group_by, non_blank};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, AuthContext};
use crate::server::ClinicServer;
use crate::utils::numbers::{lenient_f64, lenient_i32};
use crate::utils::query_builder::SearchQuery;
use crate::utils::timestamps::parse_fecha_opt;
use crate::validate_required;
use crate::validation::RequestValidation;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use utoipa::{IntoParams, ToSchema};

const TIPO_PAGO_POR_DEFECTO: &str = "pago";

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Clinical visit note
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Historia {
    pub id: i32,
    pub cliente_id: i32,
    pub fecha: chrono::DateTime<chrono::Utc>,
    pub observaciones: String,
    pub valor: Option<f64>,
    pub tipo_pago: String,
    pub referido: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoriaListItem {
    #[serde(flatten)]
    pub historia: Historia,
    pub cliente: Option<ClienteResumen>,
    pub examenes: Vec<Examen>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoriaDetalle {
    #[serde(flatten)]
    pub historia: Historia,
    pub cliente: Cliente,
    pub examenes: Vec<Examen>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateHistoriaRequest {
    #[serde(default, deserialize_with = "lenient_i32")]
    pub cliente_id: Option<i32>,
    pub observaciones: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub valor: Option<f64>,
    /// Defaults to now
    pub fecha: Option<String>,
    pub tipo_pago: Option<String>,
    pub referido: Option<String>,
    #[serde(default)]
    pub examenes: Vec<NuevoExamen>,
}

impl RequestValidation for CreateHistoriaRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.cliente_id, "Cliente y observaciones son requeridos");
        validate_required!(self.observaciones, "Cliente y observaciones son requeridos");
        examenes::validate_nuevos(&self.examenes)
    }
}

/// Update payload
///
/// `valor`, `tipoPago` and `referido` are always replaced: leaving them out
/// resets them. `observaciones` and `fecha` are kept when absent. Exams
/// carrying an `id` are already stored and are skipped.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHistoriaRequest {
    pub observaciones: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub valor: Option<f64>,
    pub fecha: Option<String>,
    pub tipo_pago: Option<String>,
    pub referido: Option<String>,
    #[serde(default)]
    pub examenes: Vec<NuevoExamen>,
}

impl RequestValidation for UpdateHistoriaRequest {
    fn validate(&self) -> Result<(), ApiError> {
        examenes::validate_nuevos(&self.examenes)
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListHistoriasParams {
    /// Matches observaciones, patient name or cédula
    pub search: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub cliente_id: Option<i32>,
}

// ============================================================================
// SHARED QUERIES
// ============================================================================

async fn fetch_detalle(db: &PgPool, id: i32) -> ApiResult<Option<HistoriaDetalle>> {
    let Some(historia) = sqlx::query_as::<_, Historia>("SELECT * FROM historia WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?
    else {
        return Ok(None);
    };

    let cliente = clientes::fetch_cliente(db, historia.cliente_id)
        .await?
        .ok_or_else(|| ApiError::internal(format!("historia {} has no cliente", id)))?;
    let examenes = examenes::fetch_de_historia(db, id).await?;

    Ok(Some(HistoriaDetalle {
        historia,
        cliente,
        examenes,
    }))
}

// ============================================================================
// HANDLERS
// ============================================================================

/// List clinical histories, most recent visit first
#[utoipa::path(
    get,
    path = "/api/historias",
    params(ListHistoriasParams),
    responses(
        (status = 200, description = "Histories with patient summary and exams", body = Vec<HistoriaListItem>),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse)
    ),
    tag = "historias",
    security(("bearer_auth" = []))
)]
pub async fn list_historias(
    State(server): State<ClinicServer>,
    ApiQuery(params): ApiQuery<ListHistoriasParams>,
) -> ApiResult<Json<Vec<HistoriaListItem>>> {
    let db = server.db();

    let mut query = SearchQuery::new(
        "SELECT h.* FROM historia h JOIN cliente c ON c.id = h.cliente_id WHERE TRUE",
    );
    query
        .filter_eq("h.cliente_id", params.cliente_id)
        .search(
            &["h.observaciones", "c.nombre", "c.cedula"],
            params.search.as_deref(),
        )
        .order_by("h.fecha", "DESC")
        .order_by("h.id", "DESC");

    let historias: Vec<Historia> = query.build_query_as().fetch_all(db).await?;

    let historia_ids: Vec<i32> = historias.iter().map(|h| h.id).collect();
    let cliente_ids: Vec<i32> = historias.iter().map(|h| h.cliente_id).collect();

    let clientes = clientes::fetch_resumenes(db, &cliente_ids).await?;
    let mut examenes = group_by(
        examenes::fetch_de_historias(db, &historia_ids).await?,
        |e| e.historia_id,
    );

    let items = historias
        .into_iter()
        .map(|historia| HistoriaListItem {
            cliente: clientes.get(&historia.cliente_id).cloned(),
            examenes: examenes.remove(&historia.id).unwrap_or_default(),
            historia,
        })
        .collect();

    Ok(Json(items))
}

/// Get a clinical history with its patient and exams
#[utoipa::path(
    get,
    path = "/api/historias/{id}",
    params(("id" = i32, Path, description = "History ID")),
    responses(
        (status = 200, description = "History", body = HistoriaDetalle),
        (status = 404, description = "History not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "historias",
    security(("bearer_auth" = []))
)]
pub async fn get_historia(
    State(server): State<ClinicServer>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<HistoriaDetalle>> {
    fetch_detalle(server.db(), id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Historia no encontrada"))
}

/// Record a clinical visit, optionally with exam images
#[utoipa::path(
    post,
    path = "/api/historias",
    request_body = CreateHistoriaRequest,
    responses(
        (status = 201, description = "History created", body = HistoriaDetalle),
        (status = 400, description = "Missing patient or observations", body = crate::error::ApiErrorResponse)
    ),
    tag = "historias",
    security(("bearer_auth" = []))
)]
pub async fn create_historia(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    ApiJson(request): ApiJson<CreateHistoriaRequest>,
) -> ApiResult<(StatusCode, Json<HistoriaDetalle>)> {
    request.validate()?;

    let cliente_id = request.cliente_id.unwrap_or_default();
    let fecha = parse_fecha_opt(request.fecha.as_deref())?.unwrap_or_else(chrono::Utc::now);
    let tipo_pago = non_blank(request.tipo_pago).unwrap_or_else(|| TIPO_PAGO_POR_DEFECTO.to_string());

    clientes::ensure_cliente_exists(server.db(), cliente_id).await?;

    let mut tx = server.database.begin().await?;

    let historia_id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO historia (cliente_id, fecha, observaciones, valor, tipo_pago, referido)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(cliente_id)
    .bind(fecha)
    .bind(request.observaciones.unwrap_or_default())
    .bind(request.valor)
    .bind(&tipo_pago)
    .bind(non_blank(request.referido))
    .fetch_one(&mut *tx)
    .await?;

    examenes::insert_nuevos(&mut tx, historia_id, &request.examenes).await?;
    tx.commit().await?;

    tracing::info!(
        historia_id,
        cliente_id,
        examenes = request.examenes.len(),
        user_id = auth.user_id,
        "Historia created"
    );

    let detalle = fetch_detalle(server.db(), historia_id)
        .await?
        .ok_or_else(|| ApiError::internal("historia vanished after insert"))?;

    Ok((StatusCode::CREATED, Json(detalle)))
}

/// Update a clinical history and append new exams
#[utoipa::path(
    put,
    path = "/api/historias/{id}",
    params(("id" = i32, Path, description = "History ID")),
    request_body = UpdateHistoriaRequest,
    responses(
        (status = 200, description = "History updated", body = HistoriaDetalle),
        (status = 404, description = "History not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "historias",
    security(("bearer_auth" = []))
)]
pub async fn update_historia(
    State(server): State<ClinicServer>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateHistoriaRequest>,
) -> ApiResult<Json<HistoriaDetalle>> {
    request.validate()?;

    let fecha = parse_fecha_opt(request.fecha.as_deref())?;
    let tipo_pago = non_blank(request.tipo_pago).unwrap_or_else(|| TIPO_PAGO_POR_DEFECTO.to_string());

    let mut tx = server.database.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE historia
        SET observaciones = COALESCE($2, observaciones),
            valor = $3,
            fecha = COALESCE($4, fecha),
            tipo_pago = $5,
            referido = $6,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(non_blank(request.observaciones))
    .bind(request.valor)
    .bind(fecha)
    .bind(&tipo_pago)
    .bind(non_blank(request.referido))
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(ApiError::not_found("Historia no encontrada"));
    }

    examenes::insert_nuevos(&mut tx, id, &request.examenes).await?;
    tx.commit().await?;

    fetch_detalle(server.db(), id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Historia no encontrada"))
}

/// Delete a clinical history and its exams
#[utoipa::path(
    delete,
    path = "/api/historias/{id}",
    params(("id" = i32, Path, description = "History ID")),
    responses(
        (status = 200, description = "History deleted", body = MessageResponse),
        (status = 404, description = "History not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "historias",
    security(("bearer_auth" = []))
)]
pub async fn delete_historia(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<MessageResponse>> {
    let deleted = sqlx::query("DELETE FROM historia WHERE id = $1")
        .bind(id)
        .execute(server.db())
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::not_found("Historia no encontrada"));
    }

    tracing::info!(historia_id = id, user_id = auth.user_id, "Historia deleted");
    Ok(MessageResponse::new("Historia eliminada correctamente"))
}
