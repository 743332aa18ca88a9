pub mod paths;

use crate::{
    handlers::{auth, clientes, examenes, facturas, formulas, health, historias, notas, usuarios},
    middleware::require_auth,
    openapi,
    server::ClinicServer,
};
use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
    Router,
};

/// Create health check and documentation routes
pub fn health_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::health::HEALTH, get(health::health_check))
        .route(paths::health::OPENAPI, get(openapi::openapi_json))
}

/// Create authentication routes
///
/// These authenticate the caller themselves where needed.
pub fn auth_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::auth::REGISTER, post(auth::register))
        .route(paths::auth::LOGIN, post(auth::login))
        .route(paths::auth::ME, get(auth::me))
}

/// Create user management routes
pub fn usuario_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::usuarios::USUARIOS, get(usuarios::list_usuarios))
        .route(
            paths::usuarios::USUARIO_BY_ID,
            get(usuarios::get_usuario)
                .put(usuarios::update_usuario)
                .delete(usuarios::delete_usuario),
        )
        .route(paths::usuarios::USUARIO_PASSWORD, put(usuarios::change_password))
}

/// Create patient routes
pub fn cliente_routes() -> Router<ClinicServer> {
    Router::new()
        .route(
            paths::clientes::CLIENTES,
            get(clientes::list_clientes).post(clientes::create_cliente),
        )
        .route(
            paths::clientes::CLIENTE_BY_ID,
            get(clientes::get_cliente)
                .put(clientes::update_cliente)
                .delete(clientes::delete_cliente),
        )
}

/// Create clinical history routes
pub fn historia_routes() -> Router<ClinicServer> {
    Router::new()
        .route(
            paths::historias::HISTORIAS,
            get(historias::list_historias).post(historias::create_historia),
        )
        .route(
            paths::historias::HISTORIA_BY_ID,
            get(historias::get_historia)
                .put(historias::update_historia)
                .delete(historias::delete_historia),
        )
        .route(paths::examenes::EXAMEN_BY_ID, delete(examenes::delete_examen))
}

/// Create prescription routes
pub fn formula_routes() -> Router<ClinicServer> {
    Router::new()
        .route(
            paths::formulas::FORMULAS,
            get(formulas::list_formulas).post(formulas::create_formula),
        )
        .route(
            paths::formulas::FORMULA_BY_ID,
            get(formulas::get_formula)
                .put(formulas::update_formula)
                .delete(formulas::delete_formula),
        )
}

/// Create reminder routes
pub fn nota_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::notas::NOTAS, get(notas::list_notas).post(notas::create_nota))
        .route(
            paths::notas::NOTA_BY_ID,
            get(notas::get_nota)
                .put(notas::update_nota)
                .delete(notas::delete_nota),
        )
        .route(paths::notas::NOTA_ESTADO, patch(notas::update_nota_estado))
}

/// Create invoice routes
pub fn factura_routes() -> Router<ClinicServer> {
    Router::new()
        .route(
            paths::facturas::FACTURAS,
            get(facturas::list_facturas).post(facturas::create_factura),
        )
        .route(
            paths::facturas::FACTURA_BY_ID,
            get(facturas::get_factura)
                .put(facturas::update_factura)
                .delete(facturas::delete_factura),
        )
}

/// Routes that require a valid bearer token
fn protected_routes(server: &ClinicServer) -> Router<ClinicServer> {
    Router::new()
        .merge(usuario_routes())
        .merge(cliente_routes())
        .merge(historia_routes())
        .merge(formula_routes())
        .merge(nota_routes())
        .merge(factura_routes())
        .route_layer(from_fn_with_state(server.clone(), require_auth))
}

/// Create all API routes
pub fn create_routes(server: &ClinicServer) -> Router<ClinicServer> {
    let api = Router::new()
        // No authentication required
        .merge(health_routes())
        .merge(auth_routes())
        .merge(protected_routes(server));

    Router::new().nest(paths::API, api)
}
