//! A single remote resource instance.
//!
//! # Design
//! `Entity<S>` pairs a server-assigned id with the field struct `S`. Field
//! access goes through `Deref`/`DerefMut`, so `image.filename` reads as it
//! would on a plain struct. An entity without id is transient; the only way
//! it becomes persisted is a successful create.
//!
//! Every networked method takes `&mut self` and writes the server's answer
//! back only once the whole round-trip has succeeded, so a failed call never
//! leaves a half-updated instance behind.

use std::ops::{Deref, DerefMut};

use serde_json::{Map, Value};
use tracing::debug;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::schema::Schema;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity<S> {
    id: Option<u64>,
    fields: S,
}

impl<S: Schema> Entity<S> {
    /// A transient entity holding client-supplied fields.
    pub fn new(fields: S) -> Self {
        Self { id: None, fields }
    }

    /// An id-only handle, to be populated by [`Entity::refresh`].
    pub fn with_id(id: u64) -> Self {
        Self {
            id: Some(id),
            fields: S::default(),
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn fields(&self) -> &S {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut S {
        &mut self.fields
    }

    pub fn into_fields(self) -> S {
        self.fields
    }

    /// Fetch the entity with `id` from the server.
    pub async fn fetch(client: &ApiClient, id: u64) -> Result<Self, ApiError> {
        let mut entity = Self::with_id(id);
        entity.refresh(client).await?;
        Ok(entity)
    }

    /// Overwrite every local field with the server's values for this id.
    pub async fn refresh(&mut self, client: &ApiClient) -> Result<(), ApiError> {
        let id = self.id.ok_or(ApiError::NotPersisted)?;
        let fetched = read::<S>(client, id).await?;
        self.adopt(fetched, id);
        Ok(())
    }

    /// Create the entity on the server. Fails if it already has an id.
    pub async fn save(&mut self, client: &ApiClient) -> Result<(), ApiError> {
        if let Some(id) = self.id {
            return Err(ApiError::AlreadyPersisted(id));
        }
        self.create(client).await
    }

    /// Create a new server record from the current fields, whatever the
    /// local id. The id is never sent; the server assigns a fresh one.
    pub async fn create(&mut self, client: &ApiClient) -> Result<(), ApiError> {
        let body = self.wire_body(false)?;
        let response = client.execute(client.build_create::<S>(&body)?).await?;
        let created = client.parse_entity::<S>(response)?;
        let id = created
            .id
            .ok_or_else(|| ApiError::InvalidResponse(format!("created {} carries no id", S::RESOURCE)))?;
        debug!(resource = S::RESOURCE, id, "created");
        self.adopt(created, id);
        Ok(())
    }

    /// Push the current fields to the server and adopt its post-write state.
    pub async fn update(&mut self, client: &ApiClient) -> Result<(), ApiError> {
        let id = self.id.ok_or(ApiError::NotPersisted)?;
        let body = self.wire_body(true)?;
        let response = client.execute(client.build_update::<S>(id, &body)?).await?;
        let updated = client.parse_entity::<S>(response)?;
        self.adopt(updated, id);
        Ok(())
    }

    /// Delete the record with `id`. Local instances holding that id are
    /// left as they are.
    pub async fn delete(client: &ApiClient, id: u64) -> Result<(), ApiError> {
        if id == 0 {
            return Err(ApiError::InvalidId(id));
        }
        let response = client.execute(client.build_delete::<S>(id)).await?;
        client.parse_delete(response)?;
        debug!(resource = S::RESOURCE, id, "deleted");
        Ok(())
    }

    /// Wire representation: the fields plus `class`, and `id` when persisted.
    pub fn to_wire(&self) -> Result<Value, ApiError> {
        self.wire_body(true)
    }

    /// Decode one wire object. A `class` tag, when present, must name `S`;
    /// an id of 0 or null means transient.
    pub fn from_wire(value: Value) -> Result<Self, ApiError> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(ApiError::TypeMismatch {
                    expected: S::CLASS,
                    found: describe(&other),
                })
            }
        };

        if let Some(class) = map.remove("class") {
            if class.as_str() != Some(S::CLASS) {
                return Err(ApiError::TypeMismatch {
                    expected: S::CLASS,
                    found: class.as_str().map_or_else(|| class.to_string(), str::to_string),
                });
            }
        }

        let id = match map.remove("id") {
            None | Some(Value::Null) => None,
            Some(v) => {
                let id = v
                    .as_u64()
                    .ok_or_else(|| ApiError::DeserializationError(format!("invalid id: {v}")))?;
                (id != 0).then_some(id)
            }
        };

        let fields = serde_json::from_value(Value::Object(map))
            .map_err(|e| ApiError::DeserializationError(e.to_string()))?;
        Ok(Self { id, fields })
    }

    fn wire_body(&self, include_id: bool) -> Result<Value, ApiError> {
        let mut map = match serde_json::to_value(&self.fields) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => Map::new(),
            Ok(other) => {
                return Err(ApiError::SerializationError(format!(
                    "{} fields must serialize to an object, got {}",
                    S::RESOURCE,
                    describe(&other)
                )))
            }
            Err(e) => return Err(ApiError::SerializationError(e.to_string())),
        };
        map.insert("class".to_string(), Value::from(S::CLASS));
        if let (true, Some(id)) = (include_id, self.id) {
            map.insert("id".to_string(), Value::from(id));
        }
        Ok(Value::Object(map))
    }

    fn adopt(&mut self, other: Self, fallback_id: u64) {
        self.id = Some(other.id.unwrap_or(fallback_id));
        self.fields = other.fields;
    }
}

async fn read<S: Schema>(client: &ApiClient, id: u64) -> Result<Entity<S>, ApiError> {
    if id == 0 {
        return Err(ApiError::InvalidId(id));
    }
    let response = client.execute(client.build_get::<S>(id)).await?;
    client.parse_entity::<S>(response)
}

/// Short description of a JSON value for type-mismatch messages.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(_) => "array".to_string(),
        Value::Object(map) => match map.get("class").and_then(Value::as_str) {
            Some(class) => class.to_string(),
            None => "object without class".to_string(),
        },
    }
}

impl<S> Deref for Entity<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.fields
    }
}

impl<S> DerefMut for Entity<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.fields
    }
}
