//! Error taxonomy for Flocktrack.
//!
//! Repository and service methods surface failures as typed [`Error`]
//! values so callers can render an appropriate response; nothing in the
//! core logs-and-swallows a validation failure. The one deliberately
//! lenient path is loading persisted stores, where a malformed individual
//! record is skipped with a warning instead of aborting startup.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced entity id does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A field constraint was violated.
    #[error("{0}")]
    Validation(String),

    /// Deletion blocked by live dependents.
    #[error("{0}")]
    Conflict(String),

    /// The backing store could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// A store file could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Error::Conflict(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, label) = match &self {
            Error::NotFound { .. } => (StatusCode::NOT_FOUND, "Not Found"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            Error::Storage(_) | Error::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };

        let message = match &self {
            // Don't leak I/O details to clients; the handler logs them.
            Error::Storage(_) | Error::Serialization(_) => {
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "message": message, "error": label }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            Error::not_found("Flock", "flock-1").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::validation("Number of deaths must be positive.")
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::conflict("Farm still has flocks").into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = Error::not_found("Farm", "farm-123");
        assert_eq!(err.to_string(), "Farm not found: farm-123");
    }
}
