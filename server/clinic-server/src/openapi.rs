use crate::handlers::{
    auth, clientes, examenes, facturas, formulas, health, historias, notas, usuarios,
};
use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Registers the bearer scheme referenced by every protected route
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token returned by /api/auth/login"))
                        .build(),
                ),
            );
        }
    }
}

/// Main OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        health::health_check,

        // Authentication endpoints
        auth::register,
        auth::login,
        auth::me,

        // User management
        usuarios::list_usuarios,
        usuarios::get_usuario,
        usuarios::update_usuario,
        usuarios::change_password,
        usuarios::delete_usuario,

        // Patients
        clientes::list_clientes,
        clientes::get_cliente,
        clientes::create_cliente,
        clientes::update_cliente,
        clientes::delete_cliente,

        // Clinical histories and exams
        historias::list_historias,
        historias::get_historia,
        historias::create_historia,
        historias::update_historia,
        historias::delete_historia,
        examenes::delete_examen,

        // Prescriptions
        formulas::list_formulas,
        formulas::get_formula,
        formulas::create_formula,
        formulas::update_formula,
        formulas::delete_formula,

        // Reminders
        notas::list_notas,
        notas::get_nota,
        notas::create_nota,
        notas::update_nota,
        notas::update_nota_estado,
        notas::delete_nota,

        // Invoices
        facturas::list_facturas,
        facturas::get_factura,
        facturas::create_factura,
        facturas::update_factura,
        facturas::delete_factura,
    ),
    components(
        schemas(
            crate::error::ApiErrorResponse,
            crate::error::MessageResponse,
            health::HealthResponse,

            auth::UsuarioPublico,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            auth::MeResponse,

            usuarios::UsuarioListItem,
            usuarios::UpdateUsuarioRequest,
            usuarios::ChangePasswordRequest,

            clientes::Cliente,
            clientes::ClienteResumen,
            clientes::ClienteCount,
            clientes::ClienteListItem,
            clientes::ClienteDetalle,
            clientes::ClienteRequest,

            historias::Historia,
            historias::HistoriaListItem,
            historias::HistoriaDetalle,
            historias::CreateHistoriaRequest,
            historias::UpdateHistoriaRequest,
            examenes::Examen,
            examenes::NuevoExamen,

            formulas::Formula,
            formulas::FormulaItem,
            formulas::FormulaConItems,
            formulas::FormulaListItem,
            formulas::FormulaDetalle,
            formulas::NuevoFormulaItem,
            formulas::CreateFormulaRequest,
            formulas::UpdateFormulaRequest,

            notas::NotaEstado,
            notas::Nota,
            notas::CreateNotaRequest,
            notas::UpdateNotaRequest,
            notas::UpdateEstadoRequest,

            facturas::Factura,
            facturas::FacturaItem,
            facturas::FacturaListItem,
            facturas::FacturaDetalle,
            facturas::NuevoFacturaItem,
            facturas::CreateFacturaRequest,
            facturas::UpdateFacturaRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Service and database health"),
        (name = "authentication", description = "Login, registration and current user"),
        (name = "usuarios", description = "Staff user management"),
        (name = "clientes", description = "Patient records"),
        (name = "historias", description = "Clinical histories and attached exams"),
        (name = "formulas", description = "Prescriptions"),
        (name = "notas", description = "Reminders"),
        (name = "facturas", description = "Invoices"),
    ),
    info(
        title = "Clinic Server API",
        version = "0.1.0",
        description = "Patient records, clinical histories, prescriptions, reminders and invoices for a small clinic.\n\nAuthentication: `Authorization: Bearer <token>` on every route except health, login and the first registration.",
    ),
)]
pub struct ApiDoc;

/// Serve the generated OpenAPI document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
