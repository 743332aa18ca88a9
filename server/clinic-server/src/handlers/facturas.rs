use crate::error::{ApiError, ApiResult, MessageResponse};
use crate::handlers::clientes::{self, Cliente, ClienteResumen};
use crate::handlers::{group_by, non_blank};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, AuthContext};
use crate::server::ClinicServer;
use crate::utils::numbers::{lenient_f64, lenient_i32, round_money};
use crate::utils::query_builder::SearchQuery;
use crate::utils::timestamps::{parse_fecha_opt, vencimiento_por_defecto};
use crate::validation::RequestValidation;
use crate::{validate_field, validate_required};
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use utoipa::{IntoParams, ToSchema};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Invoice header
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Factura {
    pub id: i32,
    /// Sequential invoice number
    pub numero: i32,
    pub cliente_id: i32,
    pub fecha: DateTime<Utc>,
    pub vencimiento: Option<DateTime<Utc>>,
    pub total: f64,
    /// Outstanding balance
    pub saldo: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Factura {
    /// Stored due date, or thirty days after the invoice date
    pub fn fecha_vencimiento(&self) -> DateTime<Utc> {
        self.vencimiento
            .unwrap_or_else(|| vencimiento_por_defecto(self.fecha))
    }
}

/// Invoice line
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FacturaItem {
    pub id: i32,
    pub factura_id: i32,
    pub cantidad: i32,
    pub descripcion: String,
    pub precio_unitario: f64,
    pub total: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FacturaListItem {
    #[serde(flatten)]
    pub factura: Factura,
    pub fecha_vencimiento: DateTime<Utc>,
    pub cliente: Option<ClienteResumen>,
    pub items: Vec<FacturaItem>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FacturaDetalle {
    #[serde(flatten)]
    pub factura: Factura,
    pub fecha_vencimiento: DateTime<Utc>,
    pub cliente: Cliente,
    pub items: Vec<FacturaItem>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NuevoFacturaItem {
    #[serde(default, deserialize_with = "lenient_i32")]
    pub cantidad: Option<i32>,
    pub descripcion: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub precio_unitario: Option<f64>,
}

/// Line ready to store, with its computed total
#[derive(Debug, Clone, PartialEq)]
struct Linea {
    cantidad: i32,
    descripcion: String,
    precio_unitario: f64,
    total: f64,
}

/// Line totals and the invoice total
fn calcular_totales(items: &[NuevoFacturaItem]) -> (Vec<Linea>, f64) {
    let lineas: Vec<Linea> = items
        .iter()
        .map(|item| {
            let cantidad = item.cantidad.unwrap_or_default();
            let precio_unitario = round_money(item.precio_unitario.unwrap_or_default());
            Linea {
                cantidad,
                descripcion: non_blank(item.descripcion.clone()).unwrap_or_default(),
                precio_unitario,
                total: round_money(f64::from(cantidad) * precio_unitario),
            }
        })
        .collect();
    let total = round_money(lineas.iter().map(|l| l.total).sum());
    (lineas, total)
}

/// Keeps every line total, and any body-sized sum of them, finite
const MAX_PRECIO_UNITARIO: f64 = 1_000_000_000_000.0;

fn validate_items(items: &[NuevoFacturaItem]) -> Result<(), ApiError> {
    for item in items {
        validate_required!(item.descripcion, "Cliente e items son requeridos");
        validate_field!(
            item.cantidad,
            item.cantidad.is_some_and(|c| c >= 1),
            "La cantidad de cada item debe ser al menos 1"
        );
        validate_field!(
            item.precio_unitario,
            item.precio_unitario.is_some_and(|p| p >= 0.0),
            "El precio unitario debe ser un número mayor o igual a cero"
        );
        validate_field!(
            item.precio_unitario,
            item.precio_unitario.is_some_and(|p| p <= MAX_PRECIO_UNITARIO),
            "El precio unitario es demasiado grande"
        );
    }
    Ok(())
}

fn validate_saldo(saldo: Option<f64>) -> Result<(), ApiError> {
    validate_field!(
        saldo,
        saldo.map_or(true, |s| s >= 0.0),
        "El saldo no puede ser negativo"
    );
    Ok(())
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFacturaRequest {
    #[serde(default, deserialize_with = "lenient_i32")]
    pub cliente_id: Option<i32>,
    /// Defaults to now
    pub fecha: Option<String>,
    pub vencimiento: Option<String>,
    pub items: Option<Vec<NuevoFacturaItem>>,
    /// Defaults to the invoice total
    #[serde(default, deserialize_with = "lenient_f64")]
    pub saldo: Option<f64>,
}

impl RequestValidation for CreateFacturaRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.cliente_id, "Cliente e items son requeridos");
        validate_required!(self.items, "Cliente e items son requeridos");
        validate_items(self.items.as_deref().unwrap_or_default())?;
        validate_saldo(self.saldo)
    }
}

/// Replaces dates and lines; number and patient never change
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFacturaRequest {
    pub fecha: Option<String>,
    /// `null` or blank clears the due date
    pub vencimiento: Option<String>,
    pub items: Option<Vec<NuevoFacturaItem>>,
    /// Defaults to the new total minus what was already paid
    #[serde(default, deserialize_with = "lenient_f64")]
    pub saldo: Option<f64>,
}

impl RequestValidation for UpdateFacturaRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.items, "Los items son requeridos");
        validate_items(self.items.as_deref().unwrap_or_default())?;
        validate_saldo(self.saldo)
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListFacturasParams {
    /// Matches patient name, cédula or invoice number
    pub search: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub cliente_id: Option<i32>,
}

/// Balance after the lines change: what was already paid stays paid
fn saldo_recalculado(anterior: &Factura, nuevo_total: f64) -> f64 {
    let pagado = (anterior.total - anterior.saldo).max(0.0);
    round_money((nuevo_total - pagado).max(0.0))
}

// ============================================================================
// SHARED QUERIES
// ============================================================================

async fn fetch_items(db: &PgPool, factura_ids: &[i32]) -> ApiResult<Vec<FacturaItem>> {
    if factura_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(sqlx::query_as::<_, FacturaItem>(
        "SELECT * FROM factura_item WHERE factura_id = ANY($1) ORDER BY id",
    )
    .bind(factura_ids)
    .fetch_all(db)
    .await?)
}

async fn fetch_detalle(db: &PgPool, id: i32) -> ApiResult<Option<FacturaDetalle>> {
    let Some(factura) = sqlx::query_as::<_, Factura>("SELECT * FROM factura WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?
    else {
        return Ok(None);
    };

    let cliente = clientes::fetch_cliente(db, factura.cliente_id)
        .await?
        .ok_or_else(|| ApiError::internal(format!("factura {} has no cliente", id)))?;
    let items = fetch_items(db, &[id]).await?;

    Ok(Some(FacturaDetalle {
        fecha_vencimiento: factura.fecha_vencimiento(),
        factura,
        cliente,
        items,
    }))
}

async fn insert_lineas(
    tx: &mut Transaction<'_, Postgres>,
    factura_id: i32,
    lineas: &[Linea],
) -> ApiResult<()> {
    for linea in lineas {
        sqlx::query(
            r#"
            INSERT INTO factura_item (factura_id, cantidad, descripcion, precio_unitario, total)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(factura_id)
        .bind(linea.cantidad)
        .bind(&linea.descripcion)
        .bind(linea.precio_unitario)
        .bind(linea.total)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

// ============================================================================
// HANDLERS
// ============================================================================

/// List invoices, newest first
#[utoipa::path(
    get,
    path = "/api/facturas",
    params(ListFacturasParams),
    responses(
        (status = 200, description = "Invoices with patient summary and items", body = Vec<FacturaListItem>),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse)
    ),
    tag = "facturas",
    security(("bearer_auth" = []))
)]
pub async fn list_facturas(
    State(server): State<ClinicServer>,
    ApiQuery(params): ApiQuery<ListFacturasParams>,
) -> ApiResult<Json<Vec<FacturaListItem>>> {
    let db = server.db();

    let mut query = SearchQuery::new(
        "SELECT f.* FROM factura f JOIN cliente c ON c.id = f.cliente_id WHERE TRUE",
    );
    query
        .filter_eq("f.cliente_id", params.cliente_id)
        .search(
            &["c.nombre", "c.cedula", "f.numero::text"],
            params.search.as_deref(),
        )
        .order_by("f.fecha", "DESC")
        .order_by("f.numero", "DESC");

    let facturas: Vec<Factura> = query.build_query_as().fetch_all(db).await?;

    let factura_ids: Vec<i32> = facturas.iter().map(|f| f.id).collect();
    let cliente_ids: Vec<i32> = facturas.iter().map(|f| f.cliente_id).collect();

    let clientes = clientes::fetch_resumenes(db, &cliente_ids).await?;
    let mut items = group_by(fetch_items(db, &factura_ids).await?, |i| i.factura_id);

    Ok(Json(
        facturas
            .into_iter()
            .map(|factura| FacturaListItem {
                fecha_vencimiento: factura.fecha_vencimiento(),
                cliente: clientes.get(&factura.cliente_id).cloned(),
                items: items.remove(&factura.id).unwrap_or_default(),
                factura,
            })
            .collect(),
    ))
}

/// Get an invoice with its patient and items
#[utoipa::path(
    get,
    path = "/api/facturas/{id}",
    params(("id" = i32, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice", body = FacturaDetalle),
        (status = 404, description = "Invoice not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "facturas",
    security(("bearer_auth" = []))
)]
pub async fn get_factura(
    State(server): State<ClinicServer>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<FacturaDetalle>> {
    fetch_detalle(server.db(), id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Factura no encontrada"))
}

/// Issue an invoice
///
/// Line totals are cantidad × precio unitario; the invoice total is their sum.
#[utoipa::path(
    post,
    path = "/api/facturas",
    request_body = CreateFacturaRequest,
    responses(
        (status = 201, description = "Invoice created", body = FacturaDetalle),
        (status = 400, description = "Missing patient or items, or invalid amounts", body = crate::error::ApiErrorResponse)
    ),
    tag = "facturas",
    security(("bearer_auth" = []))
)]
pub async fn create_factura(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    ApiJson(request): ApiJson<CreateFacturaRequest>,
) -> ApiResult<(StatusCode, Json<FacturaDetalle>)> {
    request.validate()?;

    let cliente_id = request.cliente_id.unwrap_or_default();
    let fecha = parse_fecha_opt(request.fecha.as_deref())?.unwrap_or_else(Utc::now);
    let vencimiento = parse_fecha_opt(request.vencimiento.as_deref())?;
    let (lineas, total) = calcular_totales(request.items.as_deref().unwrap_or_default());
    let saldo = request.saldo.map(round_money).unwrap_or(total);

    clientes::ensure_cliente_exists(server.db(), cliente_id).await?;

    let mut tx = server.database.begin().await?;

    let (factura_id, numero): (i32, i32) = sqlx::query_as(
        r#"
        INSERT INTO factura (cliente_id, fecha, vencimiento, total, saldo)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, numero
        "#,
    )
    .bind(cliente_id)
    .bind(fecha)
    .bind(vencimiento)
    .bind(total)
    .bind(saldo)
    .fetch_one(&mut *tx)
    .await?;

    insert_lineas(&mut tx, factura_id, &lineas).await?;
    tx.commit().await?;

    tracing::info!(
        factura_id,
        numero,
        cliente_id,
        total,
        user_id = auth.user_id,
        "Factura created"
    );

    let detalle = fetch_detalle(server.db(), factura_id)
        .await?
        .ok_or_else(|| ApiError::internal("factura vanished after insert"))?;

    Ok((StatusCode::CREATED, Json(detalle)))
}

/// Update an invoice's dates and lines
///
/// Lines are replaced and totals recomputed in one transaction.
#[utoipa::path(
    put,
    path = "/api/facturas/{id}",
    params(("id" = i32, Path, description = "Invoice ID")),
    request_body = UpdateFacturaRequest,
    responses(
        (status = 200, description = "Invoice updated", body = FacturaDetalle),
        (status = 400, description = "Missing items or invalid amounts", body = crate::error::ApiErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "facturas",
    security(("bearer_auth" = []))
)]
pub async fn update_factura(
    State(server): State<ClinicServer>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateFacturaRequest>,
) -> ApiResult<Json<FacturaDetalle>> {
    request.validate()?;

    let fecha = parse_fecha_opt(request.fecha.as_deref())?;
    let vencimiento = parse_fecha_opt(request.vencimiento.as_deref())?;
    let (lineas, total) = calcular_totales(request.items.as_deref().unwrap_or_default());

    let mut tx = server.database.begin().await?;

    let anterior = sqlx::query_as::<_, Factura>("SELECT * FROM factura WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Factura no encontrada"))?;

    let saldo = request
        .saldo
        .map(round_money)
        .unwrap_or_else(|| saldo_recalculado(&anterior, total));

    sqlx::query(
        r#"
        UPDATE factura
        SET fecha = COALESCE($2, fecha),
            vencimiento = $3,
            total = $4,
            saldo = $5,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(fecha)
    .bind(vencimiento)
    .bind(total)
    .bind(saldo)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM factura_item WHERE factura_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    insert_lineas(&mut tx, id, &lineas).await?;
    tx.commit().await?;

    fetch_detalle(server.db(), id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Factura no encontrada"))
}

/// Delete an invoice
#[utoipa::path(
    delete,
    path = "/api/facturas/{id}",
    params(("id" = i32, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice deleted", body = MessageResponse),
        (status = 404, description = "Invoice not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "facturas",
    security(("bearer_auth" = []))
)]
pub async fn delete_factura(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<MessageResponse>> {
    let deleted = sqlx::query("DELETE FROM factura WHERE id = $1")
        .bind(id)
        .execute(server.db())
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::not_found("Factura no encontrada"));
    }

    tracing::info!(factura_id = id, user_id = auth.user_id, "Factura deleted");
    Ok(MessageResponse::new("Factura eliminada correctamente"))
}
