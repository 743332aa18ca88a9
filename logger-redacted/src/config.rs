// Redaction configuration
use regex::Regex;

/// PII redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_tokens: bool,
    pub redact_emails: bool,
    pub redact_phones: bool,
    pub redact_cedulas: bool,
    pub hash_for_correlation: bool,
    pub custom_patterns: Vec<(Regex, String)>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_tokens: true,
            redact_emails: true,
            redact_phones: true,
            redact_cedulas: true,
            hash_for_correlation: true,
            custom_patterns: Vec::new(),
        }
    }
}

impl RedactionConfig {
    /// Mask values instead of hashing them
    pub fn masked() -> Self {
        Self {
            hash_for_correlation: false,
            ..Self::default()
        }
    }

    /// Add a custom pattern; invalid expressions are rejected
    pub fn with_custom_pattern(
        mut self,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        self.custom_patterns
            .push((Regex::new(pattern)?, replacement.into()));
        Ok(self)
    }
}
