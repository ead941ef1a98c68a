//! Filter descriptor narrowing collection fetches.

use std::fmt;

use crate::error::ApiError;
use crate::schema::Schema;

/// An immutable `(key, value)` constraint, e.g. `project = 42`.
///
/// On the wire it becomes a path prefix: `/{key}/{value}/{resource}.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    key: String,
    value: String,
}

impl Filter {
    pub fn new(key: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Reject keys the resource does not declare.
    pub(crate) fn check<S: Schema>(&self) -> Result<(), ApiError> {
        if S::ALLOWED_FILTERS.is_empty() || S::ALLOWED_FILTERS.contains(&self.key.as_str()) {
            return Ok(());
        }
        Err(ApiError::InvalidFilter {
            resource: S::RESOURCE,
            key: self.key.clone(),
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
