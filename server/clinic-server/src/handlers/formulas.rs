use crate::error::{ApiError, ApiResult, MessageResponse};
use crate::handlers::clientes::{self, Cliente, ClienteResumen};
use crate::handlers::{group_by, non_blank};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, AuthContext};
use crate::server::ClinicServer;
use crate::utils::numbers::lenient_i32;
use crate::utils::query_builder::SearchQuery;
use crate::utils::timestamps::parse_fecha_opt;
use crate::validation::RequestValidation;
use crate::{validate_field, validate_required};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use utoipa::{IntoParams, ToSchema};

const UNIDAD_POR_DEFECTO: &str = "FRASCOS";

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Prescription header
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Formula {
    pub id: i32,
    pub cliente_id: i32,
    pub fecha: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Prescription line
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FormulaItem {
    pub id: i32,
    pub formula_id: i32,
    pub nombre: String,
    pub cantidad: i32,
    pub unidad: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FormulaConItems {
    #[serde(flatten)]
    pub formula: Formula,
    pub items: Vec<FormulaItem>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FormulaListItem {
    #[serde(flatten)]
    pub formula: Formula,
    pub cliente: Option<ClienteResumen>,
    pub items: Vec<FormulaItem>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FormulaDetalle {
    #[serde(flatten)]
    pub formula: Formula,
    pub cliente: Cliente,
    pub items: Vec<FormulaItem>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NuevoFormulaItem {
    pub nombre: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub cantidad: Option<i32>,
    /// Defaults to `FRASCOS`
    pub unidad: Option<String>,
}

fn validate_items(items: &[NuevoFormulaItem]) -> Result<(), ApiError> {
    for item in items {
        validate_required!(item.nombre, "Cada item requiere nombre y cantidad");
        validate_field!(
            item.cantidad,
            item.cantidad.is_some_and(|c| c > 0),
            "Cada item requiere nombre y cantidad"
        );
    }
    Ok(())
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormulaRequest {
    #[serde(default, deserialize_with = "lenient_i32")]
    pub cliente_id: Option<i32>,
    pub items: Option<Vec<NuevoFormulaItem>>,
    /// Defaults to now
    pub fecha: Option<String>,
}

impl RequestValidation for CreateFormulaRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.cliente_id, "Cliente e items son requeridos");
        validate_required!(self.items, "Cliente e items son requeridos");
        validate_items(self.items.as_deref().unwrap_or_default())
    }
}

/// Replaces every line of the prescription
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFormulaRequest {
    pub items: Option<Vec<NuevoFormulaItem>>,
    pub fecha: Option<String>,
}

impl RequestValidation for UpdateFormulaRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.items, "Los items son requeridos");
        validate_items(self.items.as_deref().unwrap_or_default())
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListFormulasParams {
    /// Matches patient name or cédula
    pub search: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub cliente_id: Option<i32>,
}

// ============================================================================
// SHARED QUERIES
// ============================================================================

async fn fetch_items(db: &PgPool, formula_ids: &[i32]) -> ApiResult<Vec<FormulaItem>> {
    if formula_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(sqlx::query_as::<_, FormulaItem>(
        "SELECT * FROM formula_item WHERE formula_id = ANY($1) ORDER BY id",
    )
    .bind(formula_ids)
    .fetch_all(db)
    .await?)
}

/// A patient's prescriptions with their lines, newest first
pub(crate) async fn fetch_formulas_de_cliente(
    db: &PgPool,
    cliente_id: i32,
) -> ApiResult<Vec<FormulaConItems>> {
    let formulas = sqlx::query_as::<_, Formula>(
        "SELECT * FROM formula WHERE cliente_id = $1 ORDER BY fecha DESC, id DESC",
    )
    .bind(cliente_id)
    .fetch_all(db)
    .await?;

    let ids: Vec<i32> = formulas.iter().map(|f| f.id).collect();
    let mut items = group_by(fetch_items(db, &ids).await?, |i| i.formula_id);

    Ok(formulas
        .into_iter()
        .map(|formula| FormulaConItems {
            items: items.remove(&formula.id).unwrap_or_default(),
            formula,
        })
        .collect())
}

async fn fetch_detalle(db: &PgPool, id: i32) -> ApiResult<Option<FormulaDetalle>> {
    let Some(formula) = sqlx::query_as::<_, Formula>("SELECT * FROM formula WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?
    else {
        return Ok(None);
    };

    let cliente = clientes::fetch_cliente(db, formula.cliente_id)
        .await?
        .ok_or_else(|| ApiError::internal(format!("formula {} has no cliente", id)))?;
    let items = fetch_items(db, &[id]).await?;

    Ok(Some(FormulaDetalle {
        formula,
        cliente,
        items,
    }))
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    formula_id: i32,
    items: &[NuevoFormulaItem],
) -> ApiResult<()> {
    for item in items {
        sqlx::query(
            "INSERT INTO formula_item (formula_id, nombre, cantidad, unidad) VALUES ($1, $2, $3, $4)",
        )
        .bind(formula_id)
        .bind(non_blank(item.nombre.clone()).unwrap_or_default())
        .bind(item.cantidad.unwrap_or_default())
        .bind(non_blank(item.unidad.clone()).unwrap_or_else(|| UNIDAD_POR_DEFECTO.to_string()))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

// ============================================================================
// HANDLERS
// ============================================================================

/// List prescriptions, newest first
#[utoipa::path(
    get,
    path = "/api/formulas",
    params(ListFormulasParams),
    responses(
        (status = 200, description = "Prescriptions with patient summary and items", body = Vec<FormulaListItem>),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse)
    ),
    tag = "formulas",
    security(("bearer_auth" = []))
)]
pub async fn list_formulas(
    State(server): State<ClinicServer>,
    ApiQuery(params): ApiQuery<ListFormulasParams>,
) -> ApiResult<Json<Vec<FormulaListItem>>> {
    let db = server.db();

    let mut query = SearchQuery::new(
        "SELECT f.* FROM formula f JOIN cliente c ON c.id = f.cliente_id WHERE TRUE",
    );
    query
        .filter_eq("f.cliente_id", params.cliente_id)
        .search(&["c.nombre", "c.cedula"], params.search.as_deref())
        .order_by("f.fecha", "DESC")
        .order_by("f.id", "DESC");

    let formulas: Vec<Formula> = query.build_query_as().fetch_all(db).await?;

    let formula_ids: Vec<i32> = formulas.iter().map(|f| f.id).collect();
    let cliente_ids: Vec<i32> = formulas.iter().map(|f| f.cliente_id).collect();

    let clientes = clientes::fetch_resumenes(db, &cliente_ids).await?;
    let mut items = group_by(fetch_items(db, &formula_ids).await?, |i| i.formula_id);

    Ok(Json(
        formulas
            .into_iter()
            .map(|formula| FormulaListItem {
                cliente: clientes.get(&formula.cliente_id).cloned(),
                items: items.remove(&formula.id).unwrap_or_default(),
                formula,
            })
            .collect(),
    ))
}

/// Get a prescription with its patient and items
#[utoipa::path(
    get,
    path = "/api/formulas/{id}",
    params(("id" = i32, Path, description = "Prescription ID")),
    responses(
        (status = 200, description = "Prescription", body = FormulaDetalle),
        (status = 404, description = "Prescription not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "formulas",
    security(("bearer_auth" = []))
)]
pub async fn get_formula(
    State(server): State<ClinicServer>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<FormulaDetalle>> {
    fetch_detalle(server.db(), id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Fórmula no encontrada"))
}

/// Write a prescription
#[utoipa::path(
    post,
    path = "/api/formulas",
    request_body = CreateFormulaRequest,
    responses(
        (status = 201, description = "Prescription created", body = FormulaDetalle),
        (status = 400, description = "Missing patient or items", body = crate::error::ApiErrorResponse)
    ),
    tag = "formulas",
    security(("bearer_auth" = []))
)]
pub async fn create_formula(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    ApiJson(request): ApiJson<CreateFormulaRequest>,
) -> ApiResult<(StatusCode, Json<FormulaDetalle>)> {
    request.validate()?;

    let cliente_id = request.cliente_id.unwrap_or_default();
    let items = request.items.unwrap_or_default();
    let fecha = parse_fecha_opt(request.fecha.as_deref())?.unwrap_or_else(chrono::Utc::now);

    clientes::ensure_cliente_exists(server.db(), cliente_id).await?;

    let mut tx = server.database.begin().await?;

    let formula_id: i32 = sqlx::query_scalar(
        "INSERT INTO formula (cliente_id, fecha) VALUES ($1, $2) RETURNING id",
    )
    .bind(cliente_id)
    .bind(fecha)
    .fetch_one(&mut *tx)
    .await?;

    insert_items(&mut tx, formula_id, &items).await?;
    tx.commit().await?;

    tracing::info!(
        formula_id,
        cliente_id,
        items = items.len(),
        user_id = auth.user_id,
        "Formula created"
    );

    let detalle = fetch_detalle(server.db(), formula_id)
        .await?
        .ok_or_else(|| ApiError::internal("formula vanished after insert"))?;

    Ok((StatusCode::CREATED, Json(detalle)))
}

/// Replace a prescription's items
///
/// Old lines are deleted and the new ones inserted in one transaction.
#[utoipa::path(
    put,
    path = "/api/formulas/{id}",
    params(("id" = i32, Path, description = "Prescription ID")),
    request_body = UpdateFormulaRequest,
    responses(
        (status = 200, description = "Prescription updated", body = FormulaDetalle),
        (status = 400, description = "Missing items", body = crate::error::ApiErrorResponse),
        (status = 404, description = "Prescription not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "formulas",
    security(("bearer_auth" = []))
)]
pub async fn update_formula(
    State(server): State<ClinicServer>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateFormulaRequest>,
) -> ApiResult<Json<FormulaDetalle>> {
    request.validate()?;

    let items = request.items.unwrap_or_default();
    let fecha = parse_fecha_opt(request.fecha.as_deref())?;

    let mut tx = server.database.begin().await?;

    let updated = sqlx::query(
        "UPDATE formula SET fecha = COALESCE($2, fecha), updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(fecha)
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(ApiError::not_found("Fórmula no encontrada"));
    }

    sqlx::query("DELETE FROM formula_item WHERE formula_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    insert_items(&mut tx, id, &items).await?;
    tx.commit().await?;

    fetch_detalle(server.db(), id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Fórmula no encontrada"))
}

/// Delete a prescription
#[utoipa::path(
    delete,
    path = "/api/formulas/{id}",
    params(("id" = i32, Path, description = "Prescription ID")),
    responses(
        (status = 200, description = "Prescription deleted", body = MessageResponse),
        (status = 404, description = "Prescription not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "formulas",
    security(("bearer_auth" = []))
)]
pub async fn delete_formula(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<MessageResponse>> {
    let deleted = sqlx::query("DELETE FROM formula WHERE id = $1")
        .bind(id)
        .execute(server.db())
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::not_found("Fórmula no encontrada"));
    }

    tracing::info!(formula_id = id, user_id = auth.user_id, "Formula deleted");
    Ok(MessageResponse::new("Fórmula eliminada correctamente"))
}
