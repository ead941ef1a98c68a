//! Client-side data-access layer for REST resources.
//!
//! # Overview
//! Maps remote resources onto typed [`Entity`] values and exposes list
//! endpoints as paginated, filterable [`Collection`]s that can be consumed
//! page by page or fully materialized across many requests.
//!
//! # Design
//! - Request building and response parsing are pure (`ApiClient::build_*` /
//!   `ApiClient::parse_*`); all I/O goes through a [`Transport`].
//! - Resource types are described by a [`Schema`] field struct, not by
//!   subtyping: `Entity<S>` and `Collection<S>` are generic over it.
//! - Collection fetches commit all-or-nothing.
//! - Page indices are zero-based.

pub mod client;
pub mod collection;
pub mod config;
pub mod cursor;
pub mod entity;
pub mod error;
pub mod http;
pub mod query;
pub mod schema;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use client::ApiClient;
pub use collection::{Collection, CollectionOptions, Extent};
pub use config::ClientConfig;
pub use cursor::Cursor;
pub use entity::Entity;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use query::Filter;
pub use schema::Schema;
pub use transport::ReqwestTransport;
pub use types::{ListEnvelope, Listing, Page};
