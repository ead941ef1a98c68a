//! Wire DTOs shared by every resource type.
//!
//! # Design
//! List endpoints answer with an envelope carrying one page of objects and
//! the total count of the (filtered) result set. Some endpoints answer with
//! a bare array instead; that is read as a single, complete page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which list endpoint a collection fetch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    All,
    /// Entities not referenced by any other resource (server-defined).
    Unused,
}

/// Paginated list envelope as sent by the server.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEnvelope {
    #[serde(default)]
    pub collection: Vec<Value>,
    /// Total number of items in the result set, across all pages.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub offset: u64,
    /// Page size the server actually applied (may be lower than requested).
    #[serde(default)]
    pub per_page: u64,
    #[serde(default)]
    pub total_pages: u64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListBody {
    Bare(Vec<Value>),
    Paged(ListEnvelope),
}

/// One decoded page of a list endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub per_page: u64,
}
