// Stable error codes returned in API error bodies and process logs

pub mod validation {
    pub const MISSING_REQUIRED_FIELD: &str = "VALIDATION_1002";
    pub const INVALID_FORMAT: &str = "VALIDATION_1003";
}

pub mod authentication {
    pub const TOKEN_INVALID: &str = "AUTH_2002";
}

pub mod database {
    pub const CONNECTION_FAILED: &str = "DB_4001";
    pub const QUERY_FAILED: &str = "DB_4002";
    pub const CONSTRAINT_VIOLATION: &str = "DB_4003";
}

pub mod resource {
    pub const NOT_FOUND: &str = "RESOURCE_5001";
}

pub mod system {
    pub const INTERNAL: &str = "SYSTEM_9001";
    pub const CONFIGURATION: &str = "SYSTEM_9002";
    pub const SERVER_FAILURE: &str = "SYSTEM_9003";
}
