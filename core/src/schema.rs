//! Per-resource metadata.
//!
//! A resource type is described by its field struct: the struct carries the
//! open set of typed fields and the trait carries the endpoint and class tag.
//! `Entity<S>` and `Collection<S>` are generic over it, so every concrete
//! resource is a schema instantiation rather than a subtype.

use serde::{de::DeserializeOwned, Serialize};

/// Field schema and endpoint metadata for one remote resource type.
///
/// Implementors must not declare `id` or `class` fields; those are managed
/// by [`Entity`](crate::Entity) and written/checked on the wire.
pub trait Schema: Serialize + DeserializeOwned + Clone + Default + Send + Sync + 'static {
    /// Endpoint segment, e.g. `abstractimage` for `/abstractimage/{id}.json`.
    const RESOURCE: &'static str;

    /// Type tag reported by the server in each object's `class` field.
    const CLASS: &'static str;

    /// Filter keys accepted by the list endpoint. Empty means unrestricted.
    const ALLOWED_FILTERS: &'static [&'static str] = &[];

    /// Whether `/{resource}/unused.json` exists.
    const SUPPORTS_UNUSED: bool = false;
}
