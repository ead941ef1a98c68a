//! HTTP request builder, response parser and executor for resource endpoints.
//!
//! # Design
//! Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! Both halves are pure and generic over the resource [`Schema`]; the only
//! I/O goes through [`ApiClient::execute`], which delegates to the injected
//! [`Transport`]. Entities and collections are written on top of these
//! three steps.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::entity::Entity;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::query::Filter;
use crate::schema::Schema;
use crate::transport::ReqwestTransport;
use crate::types::{ListBody, Listing, Page};

/// Entry point for every networked operation.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    max_concurrent_requests: usize,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Build a client backed by [`ReqwestTransport`].
    pub fn connect(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(&config.base_url, Arc::new(transport))
            .with_max_concurrent_requests(config.max_concurrent_requests))
    }

    pub fn with_transport(base_url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            max_concurrent_requests: ClientConfig::default().max_concurrent_requests,
        }
    }

    pub fn with_max_concurrent_requests(mut self, n: usize) -> Self {
        self.max_concurrent_requests = n.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    /// Run one request through the transport.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(
            method = request.method.as_str(),
            url = %request.path,
            query = ?request.query,
            "sending request"
        );
        let method = request.method;
        let path = request.path.clone();
        let response = self.transport.execute(request).await?;
        if !(200..300).contains(&response.status) {
            warn!("{} {} returned {}", method.as_str(), path, response.status);
        }
        Ok(response)
    }

    // ------------------------------------------------------------------
    // Build
    // ------------------------------------------------------------------

    pub fn build_get<S: Schema>(&self, id: u64) -> HttpRequest {
        self.plain(HttpMethod::Get, self.entity_url::<S>(id))
    }

    pub fn build_create<S: Schema>(&self, body: &Value) -> Result<HttpRequest, ApiError> {
        let url = format!("{}/{}.json", self.base_url, S::RESOURCE);
        self.with_json(HttpMethod::Post, url, body)
    }

    pub fn build_update<S: Schema>(&self, id: u64, body: &Value) -> Result<HttpRequest, ApiError> {
        self.with_json(HttpMethod::Put, self.entity_url::<S>(id), body)
    }

    pub fn build_delete<S: Schema>(&self, id: u64) -> HttpRequest {
        self.plain(HttpMethod::Delete, self.entity_url::<S>(id))
    }

    /// List request for one page. `max = None` leaves the page size to the
    /// server; `offset` is always sent when `max` is.
    pub fn build_list<S: Schema>(
        &self,
        listing: Listing,
        filter: Option<&Filter>,
        max: Option<u64>,
        offset: u64,
    ) -> HttpRequest {
        let prefix = match filter {
            Some(filter) => format!(
                "{}/{}/{}",
                self.base_url,
                urlencoding::encode(filter.key()),
                urlencoding::encode(filter.value())
            ),
            None => self.base_url.clone(),
        };
        let url = match listing {
            Listing::All => format!("{prefix}/{}.json", S::RESOURCE),
            Listing::Unused => format!("{prefix}/{}/unused.json", S::RESOURCE),
        };

        let mut request = self.plain(HttpMethod::Get, url);
        if let Some(max) = max {
            request.query.push(("max".to_string(), max.to_string()));
            request.query.push(("offset".to_string(), offset.to_string()));
        }
        request
    }

    // ------------------------------------------------------------------
    // Parse
    // ------------------------------------------------------------------

    /// Parse a single-entity response. Write responses may wrap the entity
    /// under the resource name; the wrapper is stripped when present.
    pub fn parse_entity<S: Schema>(&self, response: HttpResponse) -> Result<Entity<S>, ApiError> {
        check_status(&response)?;
        let mut body: Value = decode(&response.body)?;
        if body.get(S::RESOURCE).is_some_and(Value::is_object) {
            body = body[S::RESOURCE].take();
        }
        Entity::from_wire(body)
    }

    pub fn parse_delete(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_list<S: Schema>(&self, response: HttpResponse) -> Result<Page<Entity<S>>, ApiError> {
        check_status(&response)?;
        let body: ListBody = decode(&response.body)?;
        let (raw, total, offset, per_page) = match body {
            ListBody::Bare(items) => {
                let total = items.len() as u64;
                (items, total, 0, 0)
            }
            ListBody::Paged(envelope) => {
                let seen = envelope.offset + envelope.collection.len() as u64;
                let total = envelope.size.max(seen);
                (envelope.collection, total, envelope.offset, envelope.per_page)
            }
        };
        let items = raw
            .into_iter()
            .map(Entity::from_wire)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            total,
            offset,
            per_page,
        })
    }

    fn entity_url<S: Schema>(&self, id: u64) -> String {
        format!("{}/{}/{id}.json", self.base_url, S::RESOURCE)
    }

    fn plain(&self, method: HttpMethod, path: String) -> HttpRequest {
        HttpRequest {
            method,
            path,
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    fn with_json(&self, method: HttpMethod, path: String, body: &Value) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(body).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(HttpRequest {
            method,
            path,
            query: Vec::new(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    let status = response.status;
    let body = || response.body.clone();
    match status {
        200..=299 => Ok(()),
        404 => Err(ApiError::NotFound),
        401 | 403 => Err(ApiError::Authorization { status, body: body() }),
        400 | 422 => Err(ApiError::Validation { status, body: body() }),
        _ => Err(ApiError::HttpError { status, body: body() }),
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::testing::PagedTransport;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Image {
        filename: String,
        #[serde(default)]
        width: u32,
    }

    impl Schema for Image {
        const RESOURCE: &'static str = "abstractimage";
        const CLASS: &'static str = "be.cytomine.image.AbstractImage";
    }

    fn client() -> ApiClient {
        ApiClient::with_transport("http://localhost:3000/api", Arc::new(PagedTransport::new(Vec::new())))
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_get_produces_correct_request() {
        let req = client().build_get::<Image>(7);
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:3000/api/abstractimage/7.json");
        assert!(req.query.is_empty());
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn build_create_produces_correct_request() {
        let body = serde_json::json!({"filename": "a.tif", "class": Image::CLASS});
        let req = client().build_create::<Image>(&body).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/api/abstractimage.json");
        assert_eq!(
            req.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        let sent: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(sent, body);
    }

    #[test]
    fn build_update_and_delete_target_the_entity() {
        let c = client();
        let req = c.build_update::<Image>(3, &serde_json::json!({"id": 3})).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.path, "http://localhost:3000/api/abstractimage/3.json");

        let req = c.build_delete::<Image>(3);
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.path, "http://localhost:3000/api/abstractimage/3.json");
        assert!(req.body.is_none());
    }

    #[test]
    fn build_list_with_paging_and_filter() {
        let filter = Filter::new("project", 42);
        let req = client().build_list::<Image>(Listing::All, Some(&filter), Some(10), 20);
        assert_eq!(req.path, "http://localhost:3000/api/project/42/abstractimage.json");
        assert_eq!(
            req.query,
            vec![
                ("max".to_string(), "10".to_string()),
                ("offset".to_string(), "20".to_string())
            ]
        );
    }

    #[test]
    fn build_list_escapes_filter_segments() {
        let filter = Filter::new("name", "a/b?c#d e");
        let req = client().build_list::<Image>(Listing::All, Some(&filter), None, 0);
        assert_eq!(req.path, "http://localhost:3000/api/name/a%2Fb%3Fc%23d%20e/abstractimage.json");
    }

    #[test]
    fn build_list_unbounded_sends_no_paging() {
        let req = client().build_list::<Image>(Listing::Unused, None, None, 0);
        assert_eq!(req.path, "http://localhost:3000/api/abstractimage/unused.json");
        assert!(req.query.is_empty());
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = ApiClient::with_transport("http://localhost:3000/api/", Arc::new(PagedTransport::new(Vec::new())));
        let req = client.build_get::<Image>(1);
        assert_eq!(req.path, "http://localhost:3000/api/abstractimage/1.json");
    }

    #[test]
    fn parse_entity_plain_body() {
        let body = r#"{"id":5,"class":"be.cytomine.image.AbstractImage","filename":"x.tif","width":500,"created":"123"}"#;
        let image = client().parse_entity::<Image>(response(200, body)).unwrap();
        assert_eq!(image.id(), Some(5));
        assert_eq!(image.filename, "x.tif");
        assert_eq!(image.width, 500);
    }

    #[test]
    fn parse_entity_unwraps_write_envelope() {
        let body = r#"{"message":"created","printMessage":true,"abstractimage":{"id":9,"filename":"y.tif"}}"#;
        let image = client().parse_entity::<Image>(response(201, body)).unwrap();
        assert_eq!(image.id(), Some(9));
        assert_eq!(image.filename, "y.tif");
    }

    #[test]
    fn parse_entity_status_mapping() {
        let c = client();
        assert!(matches!(
            c.parse_entity::<Image>(response(404, "")).unwrap_err(),
            ApiError::NotFound
        ));
        assert!(matches!(
            c.parse_entity::<Image>(response(403, "no rights")).unwrap_err(),
            ApiError::Authorization { status: 403, .. }
        ));
        assert!(matches!(
            c.parse_entity::<Image>(response(400, "missing filename")).unwrap_err(),
            ApiError::Validation { status: 400, .. }
        ));
        assert!(matches!(
            c.parse_entity::<Image>(response(500, "internal error")).unwrap_err(),
            ApiError::HttpError { status: 500, .. }
        ));
    }

    #[test]
    fn parse_entity_rejects_foreign_class() {
        let body = r#"{"id":5,"class":"be.cytomine.security.User","filename":"x"}"#;
        let err = client().parse_entity::<Image>(response(200, body)).unwrap_err();
        assert!(matches!(err, ApiError::TypeMismatch { .. }));
    }

    #[test]
    fn parse_entity_bad_json() {
        let err = client().parse_entity::<Image>(response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn parse_list_envelope() {
        let body = r#"{"collection":[{"id":1,"filename":"a"},{"id":2,"filename":"b"}],"size":5,"offset":2,"perPage":2,"totalPages":3}"#;
        let page = client().parse_list::<Image>(response(200, body)).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.offset, 2);
        assert_eq!(page.per_page, 2);
        let names: Vec<&str> = page.items.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn parse_list_bare_array_is_complete() {
        let body = r#"[{"id":1,"filename":"a"}]"#;
        let page = client().parse_list::<Image>(response(200, body)).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.per_page, 0);
    }

    #[test]
    fn parse_delete_not_found() {
        let err = client().parse_delete(response(404, "")).unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
        assert!(client().parse_delete(response(200, "{}")).is_ok());
    }
}
