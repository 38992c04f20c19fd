//! Error taxonomy for the scoring engine

use thiserror::Error;

/// Client-side faults: the payload is missing or malformed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    TypeConversion { field: String, value: String },

    #[error("Payload uses the {found} fraud schema but this deployment expects {expected}")]
    SchemaVariantMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// Failures surfaced by the encoder, scorer, predictors and router
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),
}

impl ScoringError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::Validation(_) => "validation",
            ScoringError::SchemaMismatch(_) => "schema_mismatch",
            ScoringError::Inference(_) => "inference",
            ScoringError::UnknownModule(_) => "unknown_module",
        }
    }

    /// Whether the caller caused the failure
    pub fn is_client_error(&self) -> bool {
        matches!(self, ScoringError::Validation(_))
    }

    pub(crate) fn missing_field(field: &str) -> Self {
        ValidationError::MissingField {
            field: field.to_string(),
        }
        .into()
    }

    pub(crate) fn type_conversion(field: &str, value: impl ToString) -> Self {
        ValidationError::TypeConversion {
            field: field.to_string(),
            value: value.to_string(),
        }
        .into()
    }
}

pub type Result<T> = std::result::Result<T, ScoringError>;
