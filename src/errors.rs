use std::result::Result as StdResult;

use thiserror::Error;

/// Setup and programming errors raised while wiring a form together.
///
/// These are not user-recoverable: they surface at registration or call time
/// and indicate the form definition or the caller is wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Field `{0}` is already registered")]
    DuplicateField(String),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Form has no fields")]
    EmptyForm,
    #[error("Field name cannot be empty")]
    InvalidFieldName,
    #[error("Unknown trigger: {0}")]
    UnknownTrigger(String),
    #[error("LOV `{binding}` maps into unknown field `{field}`")]
    InvalidBinding { binding: String, field: String },
}

pub type Result<T> = StdResult<T, FormError>;

/// Failure reported by an injected query or persistence capability.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Request rejected: {0}")]
    Rejected(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Runtime failures surfaced to the user through `ON_ERROR` and the
/// presentation gateway. The form always stays usable afterwards.
#[derive(Debug, Error)]
pub enum FormFailure {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("Query failed: {0}")]
    Query(#[source] CapabilityError),
    #[error("Save failed: {0}")]
    Save(#[source] CapabilityError),
    #[error("List of values `{binding}` failed: {source}")]
    Lov {
        binding: String,
        #[source]
        source: CapabilityError,
    },
}

/// Error returned by a trigger callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TriggerError {
    pub message: String,
}

impl TriggerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
