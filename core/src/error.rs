//! Error types for the resource client.
//!
//! # Design
//! `NotFound` and `Authorization` get dedicated variants because callers
//! frequently need to know that "this resource is unavailable to me". Some
//! servers answer a missing id with 403 rather than 404, so
//! [`ApiError::is_unavailable`] folds both into one outcome. Local contract
//! violations (wrong element type, missing id) never touch the network.

/// Errors returned by entity and collection operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server returned 404: the requested resource does not exist.
    #[error("resource not found")]
    NotFound,

    /// The server returned 401 or 403 for this resource.
    #[error("not authorized to access resource (HTTP {status}): {body}")]
    Authorization { status: u16, body: String },

    /// The server rejected the submitted field values (400 or 422).
    #[error("validation failed (HTTP {status}): {body}")]
    Validation { status: u16, body: String },

    /// The server returned any other non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// A value of the wrong resource type was offered to a typed container.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },

    /// Ids are assigned server-side and start at 1.
    #[error("invalid resource id {0}")]
    InvalidId(u64),

    #[error("entity has not been persisted yet")]
    NotPersisted,

    #[error("entity is already persisted with id {0}")]
    AlreadyPersisted(u64),

    #[error("filter key `{key}` is not allowed on {resource}")]
    InvalidFilter { resource: &'static str, key: String },

    #[error("{resource} does not support `{operation}`")]
    Unsupported {
        resource: &'static str,
        operation: &'static str,
    },

    /// The server answered with a well-formed body that breaks the list contract.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network or I/O failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    #[error("serialization failed: {0}")]
    SerializationError(String),
}

impl ApiError {
    /// True for outcomes meaning "this resource cannot be read by me",
    /// whether the server phrased it as not-found or as forbidden.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ApiError::NotFound | ApiError::Authorization { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(ApiError::NotFound.to_string(), "resource not found");
        assert_eq!(
            ApiError::HttpError {
                status: 500,
                body: "boom".to_string()
            }
            .to_string(),
            "HTTP 500: boom"
        );
        assert_eq!(
            ApiError::InvalidFilter {
                resource: "abstractimage",
                key: "color".to_string()
            }
            .to_string(),
            "filter key `color` is not allowed on abstractimage"
        );
    }

    #[test]
    fn not_found_and_forbidden_are_both_unavailable() {
        assert!(ApiError::NotFound.is_unavailable());
        assert!(ApiError::Authorization {
            status: 403,
            body: String::new()
        }
        .is_unavailable());
        assert!(!ApiError::Validation {
            status: 400,
            body: String::new()
        }
        .is_unavailable());
        assert!(!ApiError::Transport("reset".to_string()).is_unavailable());
    }
}
