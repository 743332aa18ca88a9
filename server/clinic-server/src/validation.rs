//! Request validation utilities for consistent validation across handlers
//!
//! Request payloads deserialize with every field optional so that a missing
//! field produces the handler's own message instead of a serde rejection.
//! The `RequestValidation` trait and the macros below then check presence
//! before any database access.

use crate::error::ApiError;

/// Trait for validating request payloads
///
/// # Example
///
/// ```rust,ignore
/// impl RequestValidation for CreateNotaRequest {
///     fn validate(&self) -> Result<(), ApiError> {
///         validate_required!(self.contenido, "El contenido es requerido");
///         Ok(())
///     }
/// }
/// ```
pub trait RequestValidation {
    /// Validates the request and returns an error if validation fails
    fn validate(&self) -> Result<(), ApiError>;
}

/// Presence check used by `validate_required!`
///
/// Blank strings and empty lists count as missing.
pub trait Required {
    fn is_present(&self) -> bool;
}

impl Required for String {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl Required for str {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl<T> Required for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Required for i32 {
    fn is_present(&self) -> bool {
        true
    }
}

impl<T: Required> Required for Option<T> {
    fn is_present(&self) -> bool {
        self.as_ref().is_some_and(Required::is_present)
    }
}

/// Macro for validating fields with custom predicates
///
/// # Usage
///
/// ```rust,ignore
/// validate_field!(item.cantidad, item.cantidad > 0, "La cantidad debe ser mayor a cero");
/// ```
#[macro_export]
macro_rules! validate_field {
    ($field:expr, $predicate:expr, $message:expr) => {
        if !$predicate {
            return Err($crate::error::ApiError::validation($message));
        }
    };
}

/// Macro for validating required fields (present and not blank)
///
/// # Usage
///
/// ```rust,ignore
/// validate_required!(self.nombre, "Nombre y cédula son requeridos");
/// ```
#[macro_export]
macro_rules! validate_required {
    ($field:expr, $message:expr) => {
        $crate::validate_field!(
            $field,
            $crate::validation::Required::is_present(&$field),
            $message
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    struct TestRequest {
        nombre: Option<String>,
        cedula: Option<String>,
        items: Option<Vec<i32>>,
        cantidad: i32,
    }

    impl RequestValidation for TestRequest {
        fn validate(&self) -> Result<(), ApiError> {
            validate_required!(self.nombre, "Nombre requerido");
            validate_required!(self.cedula, "Cédula requerida");
            validate_required!(self.items, "Items requeridos");
            validate_field!(self.cantidad, self.cantidad > 0, "La cantidad debe ser mayor a cero");
            Ok(())
        }
    }

    fn valid() -> TestRequest {
        TestRequest {
            nombre: Some("Juan Pérez".to_string()),
            cedula: Some("12345678".to_string()),
            items: Some(vec![1]),
            cantidad: 3,
        }
    }

    fn message(request: &TestRequest) -> String {
        request
            .validate()
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default()
    }

    #[test]
    fn test_valid_request() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_and_blank_fields() {
        let mut request = valid();
        request.nombre = None;
        assert_eq!(message(&request), "Nombre requerido");

        let mut request = valid();
        request.cedula = Some("   ".to_string());
        assert_eq!(message(&request), "Cédula requerida");

        let mut request = valid();
        request.items = Some(vec![]);
        assert_eq!(message(&request), "Items requeridos");
    }

    #[test]
    fn test_field_predicate() {
        let mut request = valid();
        request.cantidad = 0;
        assert_eq!(message(&request), "La cantidad debe ser mayor a cero");
    }
}
