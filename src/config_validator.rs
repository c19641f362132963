//! Configuration Validation
//!
//! Validates fairness configuration before any controller is built.
//! Every offending field is reported, not just the first one.

/// A single rejected configuration field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    pub field: String,
    pub value: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid configuration for '{}': {} (value: {})",
            self.field, self.message, self.value
        )
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result of config validation
pub type ConfigResult<T> = Result<T, Vec<ConfigValidationError>>;

/// Configuration validator
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ConfigValidationError>,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn error(&mut self, field: &str, value: impl std::fmt::Display, message: &str) {
        self.errors.push(ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            message: message.to_string(),
        });
    }

    /// Value must be strictly greater than zero
    pub fn validate_positive(&mut self, field: &str, value: u64) -> &mut Self {
        if value == 0 {
            self.error(field, value, "Value must be positive");
        }
        self
    }

    /// Value must be at least `min`
    pub fn validate_at_least(&mut self, field: &str, value: u64, min: u64) -> &mut Self {
        if value < min {
            self.error(field, value, &format!("Value must be at least {}", min));
        }
        self
    }

    /// List must contain at least one non-blank entry
    pub fn validate_non_empty_list(&mut self, field: &str, values: &[String]) -> &mut Self {
        if values.iter().all(|v| v.trim().is_empty()) {
            self.error(field, format!("{:?}", values), "List cannot be empty");
        }
        self
    }

    /// Every entry must have the `<namespace>.<instance>` shape with a
    /// non-empty namespace part
    pub fn validate_qualified_names(&mut self, field: &str, values: &[String]) -> &mut Self {
        for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
            let namespace = value.split('.').next().unwrap_or("");
            if namespace.trim().is_empty() {
                self.error(field, value, "Entry must start with a namespace");
            }
        }
        self
    }

    /// Finish validation and return result
    pub fn finish(self) -> ConfigResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    /// Check if any errors occurred
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Get current errors
    pub fn errors(&self) -> &[ConfigValidationError] {
        &self.errors
    }
}

/// Format validation errors for display
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}
