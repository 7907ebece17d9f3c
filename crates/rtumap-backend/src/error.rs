use thiserror::Error;

/// Errors raised while constructing a [`BackendClient`](crate::BackendClient).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid backend base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Errors from the remote detection service (`POST /upload`).
#[derive(Debug, Error)]
pub enum DetectionError {
    /// Network or TLS failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-2xx status.
    #[error("detection service returned HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The service answered 2xx but the payload is not a detection result.
    #[error("malformed detection response: {reason}")]
    Malformed { reason: String },
}

/// One backend validation failure, attributed to a form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted field path with the request-location prefix removed,
    /// e.g. `"zip_code"`.
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors from the persistence endpoints (history, save, delete, approve).
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Network or TLS failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected individual fields; each one is reported.
    #[error("validation errors: {}", format_fields(.errors))]
    FieldValidation { errors: Vec<FieldError> },

    #[error("{what} not found")]
    NotFound { what: String },

    /// Any other non-2xx answer.
    #[error("backend returned HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    /// Field-level validation failures, empty for every other variant.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            PersistenceError::FieldValidation { errors } => errors,
            _ => &[],
        }
    }
}

fn format_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
