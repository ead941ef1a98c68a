//! Scripted transport for unit tests.
//!
//! Serves list requests from a fixed item set using the same `max`/`offset`
//! envelope as the real server, with optional page-size capping, per-offset
//! latency and per-offset failures.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

type Latency = fn(u64) -> Duration;

pub(crate) struct PagedTransport {
    items: Vec<Value>,
    cap: Option<u64>,
    status: Option<u16>,
    fail_offset: Option<u64>,
    latency: Option<Latency>,
    reported_per_page: Option<u64>,
    reported_total: Option<u64>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl PagedTransport {
    pub(crate) fn new(items: Vec<Value>) -> Self {
        Self {
            items,
            cap: None,
            status: None,
            fail_offset: None,
            latency: None,
            reported_per_page: None,
            reported_total: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `n` objects of class `class`, with ids `1..=n` and `name` "item-{id}".
    pub(crate) fn numbered(class: &str, n: u64) -> Self {
        Self::new(
            (1..=n)
                .map(|id| json!({"id": id, "class": class, "name": format!("item-{id}"), "used": id % 2 == 0}))
                .collect(),
        )
    }

    /// Never return more than `cap` items per page.
    pub(crate) fn capped(mut self, cap: u64) -> Self {
        self.cap = Some(cap);
        self
    }

    /// Answer every request with `status` and an empty body.
    pub(crate) fn failing_with(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Answer 500 to the page starting at `offset`.
    pub(crate) fn failing_at_offset(mut self, offset: u64) -> Self {
        self.fail_offset = Some(offset);
        self
    }

    /// Report `per_page` in every envelope regardless of what was served.
    pub(crate) fn reporting_per_page(mut self, per_page: u64) -> Self {
        self.reported_per_page = Some(per_page);
        self
    }

    /// Report `total` as the list size regardless of the item set.
    pub(crate) fn reporting_total(mut self, total: u64) -> Self {
        self.reported_total = Some(total);
        self
    }

    pub(crate) fn with_latency(mut self, latency: Latency) -> Self {
        self.latency = Some(latency);
        self
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn page(&self, request: &HttpRequest) -> HttpResponse {
        let param = |name: &str| {
            request
                .query
                .iter()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| v.parse::<u64>().ok())
        };
        let offset = param("offset").unwrap_or(0);
        let requested = param("max").filter(|m| *m > 0);

        if self.fail_offset == Some(offset) {
            return respond(500, "page failed".to_string());
        }

        let source: Vec<&Value> = if request.path.ends_with("/unused.json") {
            self.items.iter().filter(|v| v["used"] != json!(true)).collect()
        } else {
            self.items.iter().collect()
        };
        let total = source.len() as u64;
        let per_page = match (requested, self.cap) {
            (Some(max), Some(cap)) => max.min(cap),
            (Some(max), None) => max,
            (None, Some(cap)) => cap,
            (None, None) => total,
        };
        let collection: Vec<Value> = source
            .into_iter()
            .skip(offset as usize)
            .take(per_page as usize)
            .cloned()
            .collect();
        let reported_total = self.reported_total.unwrap_or(total);
        let body = json!({
            "collection": collection,
            "size": reported_total,
            "offset": offset,
            "perPage": self.reported_per_page.unwrap_or(per_page),
            "totalPages": if per_page == 0 { 0 } else { total.div_ceil(per_page) },
        });
        respond(200, body.to_string())
    }
}

fn respond(status: u16, body: String) -> HttpResponse {
    HttpResponse {
        status,
        headers: Vec::new(),
        body,
    }
}

#[async_trait]
impl Transport for PagedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(status) = self.status {
            return Ok(respond(status, String::new()));
        }
        if request.method != HttpMethod::Get {
            return Ok(respond(405, String::new()));
        }
        if let Some(latency) = self.latency {
            let offset = request
                .query
                .iter()
                .find(|(k, _)| k == "offset")
                .and_then(|(_, v)| v.parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(latency(offset)).await;
        }
        Ok(self.page(&request))
    }
}
