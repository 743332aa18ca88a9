use crate::error::{ApiError, ApiResult, MessageResponse};
use crate::handlers::formulas::{self, FormulaConItems};
use crate::handlers::historias::Historia;
use crate::handlers::non_blank;
use crate::middleware::{ApiPath, ApiQuery, AuthContext, FormOrJson};
use crate::server::ClinicServer;
use crate::utils::query_builder::SearchQuery;
use crate::validate_required;
use crate::validation::RequestValidation;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Patient record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Cliente {
    pub id: i32,
    pub nombre: String,
    pub cedula: String,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    /// Inline `data:` URL
    pub foto: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Patient fields embedded in list rows of other records
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct ClienteResumen {
    pub id: i32,
    pub nombre: String,
    pub cedula: String,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
}

#[derive(Debug, FromRow)]
struct ClienteConConteo {
    #[sqlx(flatten)]
    cliente: Cliente,
    historias_count: i64,
    formulas_count: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClienteCount {
    pub historias: i64,
    pub formulas: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClienteListItem {
    #[serde(flatten)]
    pub cliente: Cliente,
    #[serde(rename = "_count")]
    pub count: ClienteCount,
}

impl From<ClienteConConteo> for ClienteListItem {
    fn from(row: ClienteConConteo) -> Self {
        Self {
            cliente: row.cliente,
            count: ClienteCount {
                historias: row.historias_count,
                formulas: row.formulas_count,
            },
        }
    }
}

/// Patient with their histories and prescriptions, newest first
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClienteDetalle {
    #[serde(flatten)]
    pub cliente: Cliente,
    pub historias: Vec<Historia>,
    pub formulas: Vec<FormulaConItems>,
}

/// Create/update payload, sent as multipart form or JSON
///
/// On update, absent fields keep their stored value.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClienteRequest {
    pub nombre: Option<String>,
    pub cedula: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    /// Image file (multipart) or `data:` URL (JSON)
    pub foto: Option<String>,
}

impl RequestValidation for ClienteRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.nombre, "Nombre y cédula son requeridos");
        validate_required!(self.cedula, "Nombre y cédula son requeridos");
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListClientesParams {
    /// Matches nombre or cédula
    pub search: Option<String>,
}

const DUPLICATE_CEDULA: &str = "Ya existe un cliente con esa cédula";

// ============================================================================
// SHARED QUERIES
// ============================================================================

/// Full patient record
pub(crate) async fn fetch_cliente(db: &PgPool, id: i32) -> ApiResult<Option<Cliente>> {
    Ok(sqlx::query_as::<_, Cliente>("SELECT * FROM cliente WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?)
}

/// Summaries for the given patient ids, keyed by id
pub(crate) async fn fetch_resumenes(
    db: &PgPool,
    ids: &[i32],
) -> ApiResult<HashMap<i32, ClienteResumen>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, ClienteResumen>(
        "SELECT id, nombre, cedula, telefono, direccion FROM cliente WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(|c| (c.id, c)).collect())
}

/// Reject writes that reference a missing patient
pub(crate) async fn ensure_cliente_exists(db: &PgPool, id: i32) -> ApiResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM cliente WHERE id = $1)")
        .bind(id)
        .fetch_one(db)
        .await?;
    if !exists {
        return Err(ApiError::validation("El cliente no existe"));
    }
    Ok(())
}

async fn cedula_taken(db: &PgPool, cedula: &str, except_id: Option<i32>) -> ApiResult<bool> {
    Ok(sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM cliente WHERE cedula = $1 AND id IS DISTINCT FROM $2)",
    )
    .bind(cedula)
    .bind(except_id)
    .fetch_one(db)
    .await?)
}

// ============================================================================
// HANDLERS
// ============================================================================

/// List patients, newest first
#[utoipa::path(
    get,
    path = "/api/clientes",
    params(ListClientesParams),
    responses(
        (status = 200, description = "Patients with history and prescription counts", body = Vec<ClienteListItem>),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse)
    ),
    tag = "clientes",
    security(("bearer_auth" = []))
)]
pub async fn list_clientes(
    State(server): State<ClinicServer>,
    ApiQuery(params): ApiQuery<ListClientesParams>,
) -> ApiResult<Json<Vec<ClienteListItem>>> {
    let mut query = SearchQuery::new(
        r#"
        SELECT c.*,
               (SELECT COUNT(*) FROM historia h WHERE h.cliente_id = c.id) AS historias_count,
               (SELECT COUNT(*) FROM formula f WHERE f.cliente_id = c.id) AS formulas_count
        FROM cliente c
        WHERE TRUE"#,
    );
    query
        .search(&["c.nombre", "c.cedula"], params.search.as_deref())
        .order_by("c.created_at", "DESC")
        .order_by("c.id", "DESC");

    let rows: Vec<ClienteConConteo> = query.build_query_as().fetch_all(server.db()).await?;

    Ok(Json(rows.into_iter().map(ClienteListItem::from).collect()))
}

/// Get a patient with their histories and prescriptions
#[utoipa::path(
    get,
    path = "/api/clientes/{id}",
    params(("id" = i32, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Patient", body = ClienteDetalle),
        (status = 404, description = "Patient not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "clientes",
    security(("bearer_auth" = []))
)]
pub async fn get_cliente(
    State(server): State<ClinicServer>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<ClienteDetalle>> {
    let db = server.db();
    let cliente = fetch_cliente(db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Cliente no encontrado"))?;

    let historias = sqlx::query_as::<_, Historia>(
        "SELECT * FROM historia WHERE cliente_id = $1 ORDER BY fecha DESC, id DESC",
    )
    .bind(id)
    .fetch_all(db)
    .await?;

    let formulas = formulas::fetch_formulas_de_cliente(db, id).await?;

    Ok(Json(ClienteDetalle {
        cliente,
        historias,
        formulas,
    }))
}

/// Register a patient
#[utoipa::path(
    post,
    path = "/api/clientes",
    request_body(content = ClienteRequest, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Patient created", body = Cliente),
        (status = 400, description = "Missing fields or duplicate cédula", body = crate::error::ApiErrorResponse)
    ),
    tag = "clientes",
    security(("bearer_auth" = []))
)]
pub async fn create_cliente(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    FormOrJson(request): FormOrJson<ClienteRequest>,
) -> ApiResult<(StatusCode, Json<Cliente>)> {
    request.validate()?;

    let nombre = non_blank(request.nombre).unwrap_or_default();
    let cedula = non_blank(request.cedula).unwrap_or_default();

    if cedula_taken(server.db(), &cedula, None).await? {
        return Err(ApiError::validation(DUPLICATE_CEDULA));
    }

    let cliente = sqlx::query_as::<_, Cliente>(
        r#"
        INSERT INTO cliente (nombre, cedula, telefono, direccion, foto)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&nombre)
    .bind(&cedula)
    .bind(non_blank(request.telefono))
    .bind(non_blank(request.direccion))
    .bind(non_blank(request.foto))
    .fetch_one(server.db())
    .await
    .map_err(ApiError::on_unique_violation(DUPLICATE_CEDULA))?;

    tracing::info!(cliente_id = cliente.id, user_id = auth.user_id, "Cliente created");

    Ok((StatusCode::CREATED, Json(cliente)))
}

/// Update a patient
///
/// Fields left out of the request keep their stored value; a new photo
/// replaces the old one.
#[utoipa::path(
    put,
    path = "/api/clientes/{id}",
    params(("id" = i32, Path, description = "Patient ID")),
    request_body(content = ClienteRequest, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Patient updated", body = Cliente),
        (status = 400, description = "Blank name or cédula, or duplicate cédula", body = crate::error::ApiErrorResponse),
        (status = 404, description = "Patient not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "clientes",
    security(("bearer_auth" = []))
)]
pub async fn update_cliente(
    State(server): State<ClinicServer>,
    ApiPath(id): ApiPath<i32>,
    FormOrJson(request): FormOrJson<ClienteRequest>,
) -> ApiResult<Json<Cliente>> {
    let db = server.db();
    let current = fetch_cliente(db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Cliente no encontrado"))?;

    let merged = merge_cliente(current, request)?;

    if cedula_taken(db, &merged.cedula, Some(id)).await? {
        return Err(ApiError::validation(DUPLICATE_CEDULA));
    }

    let cliente = sqlx::query_as::<_, Cliente>(
        r#"
        UPDATE cliente
        SET nombre = $2, cedula = $3, telefono = $4, direccion = $5, foto = $6,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&merged.nombre)
    .bind(&merged.cedula)
    .bind(&merged.telefono)
    .bind(&merged.direccion)
    .bind(&merged.foto)
    .fetch_optional(db)
    .await
    .map_err(ApiError::on_unique_violation(DUPLICATE_CEDULA))?
    .ok_or_else(|| ApiError::not_found("Cliente no encontrado"))?;

    Ok(Json(cliente))
}

/// Apply an update request on top of the stored record
fn merge_cliente(mut cliente: Cliente, request: ClienteRequest) -> Result<Cliente, ApiError> {
    if let Some(nombre) = request.nombre {
        cliente.nombre = non_blank(Some(nombre))
            .ok_or_else(|| ApiError::validation("Nombre y cédula son requeridos"))?;
    }
    if let Some(cedula) = request.cedula {
        cliente.cedula = non_blank(Some(cedula))
            .ok_or_else(|| ApiError::validation("Nombre y cédula son requeridos"))?;
    }
    if let Some(telefono) = request.telefono {
        cliente.telefono = non_blank(Some(telefono));
    }
    if let Some(direccion) = request.direccion {
        cliente.direccion = non_blank(Some(direccion));
    }
    if let Some(foto) = non_blank(request.foto) {
        cliente.foto = Some(foto);
    }
    Ok(cliente)
}

/// Delete a patient and everything recorded for them
#[utoipa::path(
    delete,
    path = "/api/clientes/{id}",
    params(("id" = i32, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Patient deleted", body = MessageResponse),
        (status = 404, description = "Patient not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "clientes",
    security(("bearer_auth" = []))
)]
pub async fn delete_cliente(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<MessageResponse>> {
    let deleted = sqlx::query("DELETE FROM cliente WHERE id = $1")
        .bind(id)
        .execute(server.db())
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::not_found("Cliente no encontrado"));
    }

    tracing::info!(cliente_id = id, user_id = auth.user_id, "Cliente deleted");
    Ok(MessageResponse::new("Cliente eliminado correctamente"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> Cliente {
        Cliente {
            id: 1,
            nombre: "María López".into(),
            cedula: "1234567890".into(),
            telefono: Some("3001234567".into()),
            direccion: Some("Calle 10 # 5-20".into()),
            foto: Some("data:image/png;base64,AAAA".into()),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_create_requires_nombre_and_cedula() {
        let request = ClienteRequest {
            nombre: Some("Ana".into()),
            ..Default::default()
        };
        assert_eq!(
            request.validate().unwrap_err().to_string(),
            "Nombre y cédula son requeridos"
        );
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let request = ClienteRequest {
            telefono: Some("3109876543".into()),
            ..Default::default()
        };
        let merged = merge_cliente(stored(), request).unwrap();
        assert_eq!(merged.nombre, "María López");
        assert_eq!(merged.telefono.as_deref(), Some("3109876543"));
        assert_eq!(merged.foto.as_deref(), Some("data:image/png;base64,AAAA"));
    }

    #[test]
    fn test_merge_blank_optional_fields_clear_them() {
        let request = ClienteRequest {
            direccion: Some("".into()),
            foto: Some("".into()),
            ..Default::default()
        };
        let merged = merge_cliente(stored(), request).unwrap();
        assert!(merged.direccion.is_none());
        // An empty file input does not remove the photo
        assert!(merged.foto.is_some());
    }

    #[test]
    fn test_merge_rejects_blank_cedula() {
        let request = ClienteRequest {
            cedula: Some("  ".into()),
            ..Default::default()
        };
        assert!(merge_cliente(stored(), request).is_err());
    }

    #[test]
    fn test_list_item_count_field() {
        let item = ClienteListItem::from(ClienteConConteo {
            cliente: stored(),
            historias_count: 3,
            formulas_count: 1,
        });
        let json = serde_json::to_value(item).unwrap();
        assert_eq!(json["_count"]["historias"], 3);
        assert_eq!(json["_count"]["formulas"], 1);
        assert_eq!(json["cedula"], "1234567890");
        assert!(json.get("createdAt").is_some());
    }
}
