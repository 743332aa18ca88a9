use crate::config::RedactionConfig;
use base64::{engine::general_purpose, Engine as _};
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

#[allow(clippy::unwrap_used)]
mod patterns {
    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        pub static ref TOKEN_REGEX: Regex =
            Regex::new(r"\beyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+").unwrap();
        pub static ref EMAIL_REGEX: Regex =
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
        pub static ref PHONE_REGEX: Regex =
            Regex::new(r"(?:\+?57[\s-]?)?\b3\d{2}[\s-]?\d{3}[\s-]?\d{4}\b").unwrap();
        pub static ref CEDULA_REGEX: Regex = Regex::new(r"\b\d{6,10}\b").unwrap();
        pub static ref DEFAULT_REDACTOR: super::PiiRedactor =
            super::PiiRedactor::new(crate::config::RedactionConfig::default());
    }
}

use patterns::{CEDULA_REGEX, EMAIL_REGEX, PHONE_REGEX, TOKEN_REGEX};

/// Shared redactor with the default configuration
pub fn default_redactor() -> &'static PiiRedactor {
    &patterns::DEFAULT_REDACTOR
}

/// PII redactor for log messages
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        // Tokens go first: a JWT payload can contain digit runs. They are
        // never hashed.
        if self.config.redact_tokens {
            result = TOKEN_REGEX.replace_all(&result, "TOKEN[***]").to_string();
        }

        if self.config.redact_emails {
            result = self.replace(&EMAIL_REGEX, &result, "EMAIL", mask_email);
        }

        // Phones before cédulas, a 10 digit mobile also matches the cédula pattern.
        if self.config.redact_phones {
            result = self.replace(&PHONE_REGEX, &result, "PHONE", |_| "***-***-****".to_string());
        }

        if self.config.redact_cedulas {
            result = self.replace(&CEDULA_REGEX, &result, "CEDULA", mask_keep_last_three);
        }

        for (pattern, replacement) in &self.config.custom_patterns {
            result = pattern.replace_all(&result, replacement.as_str()).to_string();
        }

        result
    }

    fn replace(
        &self,
        pattern: &Regex,
        text: &str,
        label: &str,
        mask: impl Fn(&str) -> String,
    ) -> String {
        pattern
            .replace_all(text, |caps: &Captures| {
                let matched = caps.get(0).map_or("", |m| m.as_str());
                if self.config.hash_for_correlation {
                    format!("{}[{}]", label, self.hash_value(matched))
                } else {
                    mask(matched)
                }
            })
            .to_string()
    }

    fn hash_value(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        let result = hasher.finalize();
        // First 8 bytes keep the marker short
        general_purpose::STANDARD.encode(result.get(..8).unwrap_or_default())
    }
}

fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((user, domain)) => {
            let user_initial = user.chars().next().unwrap_or('*');
            let domain_initial = domain.chars().next().unwrap_or('*');
            format!("{user_initial}***@{domain_initial}***")
        }
        None => "***@***".to_string(),
    }
}

fn mask_keep_last_three(digits: &str) -> String {
    let len = digits.chars().count();
    digits
        .chars()
        .enumerate()
        .map(|(i, c)| if i + 3 >= len { c } else { '*' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_email_redaction() {
        let redactor = PiiRedactor::new(RedactionConfig::masked());

        let text = "Usuario jorge.perez@example.com inició sesión";
        let redacted = redactor.redact(text);
        assert!(redacted.contains("j***@e***"));
        assert!(!redacted.contains("jorge.perez"));
    }

    #[test]
    fn test_phone_redaction() {
        let redactor = PiiRedactor::new(RedactionConfig::masked());

        let redacted = redactor.redact("Llamar al 3001234567 mañana");
        assert_eq!(redacted, "Llamar al ***-***-**** mañana");

        let redacted = redactor.redact("tel +57 310 987 6543");
        assert!(!redacted.contains("987"));
    }

    #[test]
    fn test_cedula_masking_keeps_last_digits() {
        let redactor = PiiRedactor::new(RedactionConfig::masked());

        let redacted = redactor.redact("/api/clientes?search=87654321");
        assert_eq!(redacted, "/api/clientes?search=*****321");
    }

    #[test]
    fn test_short_numbers_untouched() {
        let redactor = PiiRedactor::new(RedactionConfig::masked());

        let text = "/api/historias?clienteId=42&fecha=2024-05-01";
        assert_eq!(redactor.redact(text), text);
    }

    #[test]
    fn test_token_redaction() {
        let redactor = PiiRedactor::new(RedactionConfig::default());

        let text = "Bearer eyJhbGciOiJIUzI1NiJ9.eyJpZCI6MX0.c2lnbmF0dXJl";
        let redacted = redactor.redact(text);
        assert_eq!(redacted, "Bearer TOKEN[***]");
    }

    #[test]
    fn test_hash_correlation_is_stable() {
        let redactor = PiiRedactor::new(RedactionConfig::default());

        let first = redactor.redact("cedula 12345678");
        let second = redactor.redact("otra vez 12345678");
        let marker = first.trim_start_matches("cedula ");
        assert!(marker.starts_with("CEDULA["));
        assert!(second.ends_with(marker));
    }

    #[test]
    fn test_custom_pattern() {
        let config = RedactionConfig::masked()
            .with_custom_pattern(r"Paciente \w+", "Paciente [NOMBRE]")
            .unwrap();
        let redactor = PiiRedactor::new(config);

        assert_eq!(redactor.redact("Paciente Juan llegó"), "Paciente [NOMBRE] llegó");
    }

    #[test]
    fn test_invalid_custom_pattern_rejected() {
        assert!(RedactionConfig::default().with_custom_pattern("(", "x").is_err());
    }

    proptest! {
        #[test]
        fn cedulas_never_survive(cedula in "[1-9][0-9]{5,9}") {
            let line = format!("GET /api/clientes?search={cedula}");
            let redacted = crate::redact(&line);
            prop_assert!(!redacted.contains(&cedula));
        }
    }
}
