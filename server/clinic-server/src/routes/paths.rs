//! Centralized API route path constants
//!
//! utoipa `#[path(...)]` attributes need string literals, so the handler
//! annotations repeat these paths; keep both in step.

/// API base path
pub const API: &str = "/api";

/// Health check endpoints
pub mod health {
    pub const HEALTH: &str = "/health";
    pub const OPENAPI: &str = "/openapi.json";
}

/// Authentication endpoints
pub mod auth {
    pub const REGISTER: &str = "/auth/register";
    pub const LOGIN: &str = "/auth/login";
    pub const ME: &str = "/auth/me";
}

/// User management endpoints
pub mod usuarios {
    pub const USUARIOS: &str = "/auth/usuarios";
    pub const USUARIO_BY_ID: &str = "/auth/usuarios/:id";
    pub const USUARIO_PASSWORD: &str = "/auth/usuarios/:id/password";
}

/// Patient endpoints
pub mod clientes {
    pub const CLIENTES: &str = "/clientes";
    pub const CLIENTE_BY_ID: &str = "/clientes/:id";
}

/// Clinical history endpoints
pub mod historias {
    pub const HISTORIAS: &str = "/historias";
    pub const HISTORIA_BY_ID: &str = "/historias/:id";
}

/// Exam image endpoints
pub mod examenes {
    pub const EXAMEN_BY_ID: &str = "/examenes/:id";
}

/// Prescription endpoints
pub mod formulas {
    pub const FORMULAS: &str = "/formulas";
    pub const FORMULA_BY_ID: &str = "/formulas/:id";
}

/// Reminder endpoints
pub mod notas {
    pub const NOTAS: &str = "/notas";
    pub const NOTA_BY_ID: &str = "/notas/:id";
    pub const NOTA_ESTADO: &str = "/notas/:id/estado";
}

/// Invoice endpoints
pub mod facturas {
    pub const FACTURAS: &str = "/facturas";
    pub const FACTURA_BY_ID: &str = "/facturas/:id";
}
