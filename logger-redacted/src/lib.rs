pub mod config;
pub mod macros;
pub mod redactor;

pub use config::*;
pub use redactor::*;

/// Log redaction for patient data
///
/// Request URIs, search terms and database error details routinely carry
/// patient identifiers (a `cédula` in `?search=`, a phone number in a
/// unique-violation message). Everything the server writes to its logs from
/// those sources passes through [`PiiRedactor`] first.
///
/// # Detected Data Types
///
/// - **Bearer tokens**: `eyJhbGci...` → `TOKEN[hash]`
/// - **Email Addresses**: `user@example.com` → `EMAIL[hash]`
/// - **Mobile Numbers**: `3001234567` → `PHONE[hash]`
/// - **Cédulas**: runs of 6 to 10 digits → `CEDULA[hash]`
/// - **Custom Patterns**: configurable regex replacements
///
/// Hashes are a truncated SHA-256 so the same identifier correlates across
/// log lines without being readable.
///
/// # Example
///
/// ```rust
/// use logger_redacted::redact;
///
/// let line = redact("GET /api/clientes?search=12345678");
/// assert!(!line.contains("12345678"));
/// ```
pub fn redact(text: &str) -> String {
    redactor::default_redactor().redact(text)
}

#[doc(hidden)]
pub use tracing as __tracing;
