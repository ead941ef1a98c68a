use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

/// Behaviour switches for the mock server.
#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    /// Upper bound applied to every list page, whatever `max` asks for.
    pub max_per_page: Option<u64>,
    /// `(resource, field)` pairs that must be present and non-null on writes.
    pub required_fields: Vec<(String, String)>,
    /// When set, every request must carry `Authorization: Bearer <token>`.
    pub token: Option<String>,
    /// Answer 403 instead of 404 for ids that do not exist.
    pub forbid_missing: bool,
}

impl ServerConfig {
    pub fn with_max_per_page(mut self, max: u64) -> Self {
        self.max_per_page = Some(max);
        self
    }

    pub fn require(mut self, resource: &str, field: &str) -> Self {
        self.required_fields.push((resource.to_string(), field.to_string()));
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn forbidding_missing(mut self) -> Self {
        self.forbid_missing = true;
        self
    }
}

/// Items per resource, in creation order. Ids are global and start at 1.
#[derive(Debug, Default)]
pub struct Store {
    resources: HashMap<String, BTreeMap<u64, Map<String, Value>>>,
    last_id: u64,
}

#[derive(Clone)]
struct AppState {
    db: Arc<RwLock<Store>>,
    config: Arc<ServerConfig>,
}

pub fn app() -> Router {
    app_with(ServerConfig::default())
}

pub fn app_with(config: ServerConfig) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Store::default())),
        config: Arc::new(config),
    };
    Router::new()
        .route("/api/{*path}", any(dispatch))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, ServerConfig::default()).await
}

pub async fn run_with(listener: TcpListener, config: ServerConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

#[derive(Debug, PartialEq, Eq)]
enum Route {
    List {
        filter: Option<(String, String)>,
        resource: String,
        unused: bool,
    },
    Item {
        resource: String,
        id: u64,
    },
}

/// `a.json`, `a/unused.json`, `a/7.json`, `k/v/a.json`, `k/v/a/unused.json`.
fn parse_route(path: &str) -> Result<Route, StatusCode> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let last = segments
        .last()
        .and_then(|s| s.strip_suffix(".json"))
        .ok_or(StatusCode::NOT_FOUND)?;
    let filter = || Some((segments[0].to_string(), segments[1].to_string()));

    match segments.len() {
        1 => Ok(Route::List {
            filter: None,
            resource: last.to_string(),
            unused: false,
        }),
        2 if last == "unused" => Ok(Route::List {
            filter: None,
            resource: segments[0].to_string(),
            unused: true,
        }),
        2 => Ok(Route::Item {
            resource: segments[0].to_string(),
            id: last.parse().map_err(|_| StatusCode::BAD_REQUEST)?,
        }),
        3 => Ok(Route::List {
            filter: filter(),
            resource: last.to_string(),
            unused: false,
        }),
        4 if last == "unused" => Ok(Route::List {
            filter: filter(),
            resource: segments[2].to_string(),
            unused: true,
        }),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

#[derive(Debug, Deserialize)]
struct Paging {
    max: Option<u64>,
    offset: Option<u64>,
}

async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Path(path): Path<String>,
    Query(paging): Query<Paging>,
    body: String,
) -> Response {
    debug!("{method} /api/{path}");

    if let Some(token) = &state.config.token {
        let expected = format!("Bearer {token}");
        let given = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
        if given != Some(expected.as_str()) {
            return error(StatusCode::UNAUTHORIZED, "authentication required");
        }
    }

    let route = match parse_route(&path) {
        Ok(route) => route,
        Err(status) => return error(status, "no such endpoint"),
    };
    let config = &state.config;

    match (method, route) {
        (Method::GET, Route::List { filter, resource, unused }) => {
            let store = state.db.read().await;
            list(&store, config, &resource, filter, unused, paging)
        }
        (Method::POST, Route::List { filter: None, resource, unused: false }) => {
            let mut store = state.db.write().await;
            create(&mut store, config, &resource, &body)
        }
        (Method::GET, Route::Item { resource, id }) => {
            let store = state.db.read().await;
            match store.resources.get(&resource).and_then(|items| items.get(&id)) {
                Some(item) => (StatusCode::OK, Json(Value::Object(item.clone()))).into_response(),
                None => missing(config, &resource, id),
            }
        }
        (Method::PUT, Route::Item { resource, id }) => {
            let mut store = state.db.write().await;
            update(&mut store, config, &resource, id, &body)
        }
        (Method::DELETE, Route::Item { resource, id }) => {
            let mut store = state.db.write().await;
            match store.resources.get_mut(&resource).and_then(|items| items.remove(&id)) {
                Some(item) => wrapped(StatusCode::OK, &resource, item, "deleted"),
                None => missing(config, &resource, id),
            }
        }
        _ => error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
    }
}

fn list(
    store: &Store,
    config: &ServerConfig,
    resource: &str,
    filter: Option<(String, String)>,
    unused: bool,
    paging: Paging,
) -> Response {
    let referenced = if unused {
        referenced_ids(store, resource)
    } else {
        HashSet::new()
    };

    let matching: Vec<&Map<String, Value>> = store
        .resources
        .get(resource)
        .into_iter()
        .flat_map(|items| items.iter())
        .filter(|(id, _)| !referenced.contains(*id))
        .map(|(_, item)| item)
        .filter(|item| match &filter {
            Some((key, value)) => item.get(key).map(as_text).as_deref() == Some(value.as_str()),
            None => true,
        })
        .collect();

    let total = matching.len() as u64;
    let offset = paging.offset.unwrap_or(0);
    let per_page = match (paging.max.filter(|m| *m > 0), config.max_per_page) {
        (Some(max), Some(cap)) => max.min(cap),
        (Some(max), None) => max,
        (None, Some(cap)) => cap,
        (None, None) => total,
    };
    let collection: Vec<Value> = matching
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(usize::try_from(per_page).unwrap_or(usize::MAX))
        .map(|item| Value::Object(item.clone()))
        .collect();

    let total_pages = if per_page == 0 { 0 } else { total.div_ceil(per_page) };
    Json(json!({
        "collection": collection,
        "size": total,
        "offset": offset,
        "perPage": per_page,
        "totalPages": total_pages,
    }))
    .into_response()
}

/// Ids of `resource` that some item of another resource points at through a
/// field named after `resource`.
fn referenced_ids(store: &Store, resource: &str) -> HashSet<u64> {
    store
        .resources
        .iter()
        .filter(|(name, _)| name.as_str() != resource)
        .flat_map(|(_, items)| items.values())
        .filter_map(|item| item.get(resource))
        .filter_map(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .collect()
}

fn create(store: &mut Store, config: &ServerConfig, resource: &str, body: &str) -> Response {
    let mut fields = match parse_object(body) {
        Ok(fields) => fields,
        Err(response) => return response,
    };
    fields.remove("id");
    if let Err(response) = check_required(config, resource, &fields) {
        return response;
    }

    store.last_id += 1;
    let id = store.last_id;
    fields.insert("id".to_string(), json!(id));
    store
        .resources
        .entry(resource.to_string())
        .or_default()
        .insert(id, fields.clone());
    wrapped(StatusCode::CREATED, resource, fields, "created")
}

fn update(store: &mut Store, config: &ServerConfig, resource: &str, id: u64, body: &str) -> Response {
    let changes = match parse_object(body) {
        Ok(changes) => changes,
        Err(response) => return response,
    };
    let Some(item) = store.resources.get_mut(resource).and_then(|items| items.get_mut(&id)) else {
        return missing(config, resource, id);
    };

    let mut merged = item.clone();
    for (key, value) in changes {
        if key != "id" {
            merged.insert(key, value);
        }
    }
    if let Err(response) = check_required(config, resource, &merged) {
        return response;
    }
    *item = merged.clone();
    wrapped(StatusCode::OK, resource, merged, "updated")
}

fn parse_object(body: &str) -> Result<Map<String, Value>, Response> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(error(StatusCode::BAD_REQUEST, "body must be a JSON object")),
    }
}

fn check_required(config: &ServerConfig, resource: &str, fields: &Map<String, Value>) -> Result<(), Response> {
    for (owner, field) in &config.required_fields {
        if owner == resource && fields.get(field).is_none_or(Value::is_null) {
            return Err(error(StatusCode::BAD_REQUEST, &format!("{field} is required")));
        }
    }
    Ok(())
}

fn missing(config: &ServerConfig, resource: &str, id: u64) -> Response {
    if config.forbid_missing {
        error(
            StatusCode::FORBIDDEN,
            &format!("You don't have the right to read or modify this resource! {resource} {id}"),
        )
    } else {
        error(StatusCode::NOT_FOUND, &format!("{resource} {id} not found"))
    }
}

fn wrapped(status: StatusCode, resource: &str, item: Map<String, Value>, verb: &str) -> Response {
    let id = item.get("id").cloned().unwrap_or(Value::Null);
    let mut body = Map::new();
    body.insert(resource.to_string(), Value::Object(item));
    body.insert("message".to_string(), json!(format!("{resource} {id} {verb}")));
    body.insert("printMessage".to_string(), json!(true));
    (status, Json(Value::Object(body))).into_response()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"success": false, "errors": message}))).into_response()
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
