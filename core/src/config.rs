//! Configuration for [`ApiClient`](crate::ApiClient).

use std::env;

pub const ENV_URL: &str = "RESOURCE_API_URL";
pub const ENV_TOKEN: &str = "RESOURCE_API_TOKEN";
pub const ENV_MAX_CONCURRENCY: &str = "RESOURCE_API_MAX_CONCURRENCY";

/// Configuration for the resource API client
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// API root (e.g. "http://127.0.0.1:3000/api")
    pub base_url: String,
    /// Bearer token sent with every request, if any
    pub token: Option<String>,
    /// Connection timeout in milliseconds (default: 5000)
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds (default: 30000)
    pub read_timeout_ms: u64,
    /// Upper bound on page requests in flight during a full fetch (default: 4)
    pub max_concurrent_requests: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000/api".to_string(),
            token: None,
            connect_timeout_ms: 5000,
            read_timeout_ms: 30000,
            max_concurrent_requests: 4,
        }
    }
}

impl ClientConfig {
    /// Create a config pointing at a single API root
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    /// Read overrides from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var(ENV_URL) {
            config.base_url = url;
        }
        if let Ok(token) = env::var(ENV_TOKEN) {
            if !token.is_empty() {
                config.token = Some(token);
            }
        }
        if let Some(n) = env::var(ENV_MAX_CONCURRENCY)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            config.max_concurrent_requests = n;
        }
        config
    }

    /// Set the bearer token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Set timeouts
    pub fn with_timeouts(mut self, connect_ms: u64, read_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.read_timeout_ms = read_ms;
        self
    }

    /// Set the fetch-all concurrency limit; 0 is treated as 1
    pub fn with_max_concurrent_requests(mut self, n: usize) -> Self {
        self.max_concurrent_requests = n.max(1);
        self
    }
}
