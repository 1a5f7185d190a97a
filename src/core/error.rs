use thiserror::Error;

/// Errors that can occur while building, signing or emitting a document.
///
/// Failures talking to the tax authority are not represented here: they are
/// absorbed into the emission state (see `sri::SriError`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FacturaError {
    /// The sale request is malformed (no items, missing product codes).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A tax-authority business rule forbids the sale as requested.
    #[error("regulatory rule violated: {0}")]
    Regulatory(String),

    /// Signing credentials are missing, unreadable or unusable.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// The signature block could not be computed or attached.
    #[error("signature error: {0}")]
    Signature(String),

    /// Issuer configuration is incomplete or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Sequential numbering error.
    #[error("numbering error: {0}")]
    Numbering(String),

    /// XML generation error.
    #[error("XML error: {0}")]
    Xml(String),

    /// The invoice store rejected a read or write.
    #[error("store error: {0}")]
    Store(String),

    /// The secret store could not decrypt a credential.
    #[error("secret error: {0}")]
    Secret(String),
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "issuer.ruc").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
    /// Rule identifier if applicable (e.g. "RUC-LENGTH").
    pub rule: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "[{}] {}: {}", rule, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl ValidationError {
    /// Create a validation error without a rule ID.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: None,
        }
    }

    /// Create a validation error with a rule ID.
    pub fn with_rule(
        field: impl Into<String>,
        message: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: Some(rule.into()),
        }
    }
}

/// Join several validation errors into one message.
pub fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
