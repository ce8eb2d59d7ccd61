//! External HTTP validation hooks.
//!
//! A hook receives the variable bag as its JSON body and must answer HTTP 200
//! with `{"valid": bool, "message"?: string, "route"?: string}`. Any other
//! status, or a body of another shape, is an error.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use flowcert_types::{FlowError, Result};

use crate::config::HookMode;

pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct HookRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookReply {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait HookTransport: Send + Sync {
    async fn send(&self, request: &HookRequest) -> Result<HookReply>;
}

/// HTTP transport backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HookTransport for ReqwestTransport {
    async fn send(&self, request: &HookRequest) -> Result<HookReply> {
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes()).map_err(|e| {
            FlowError::InvalidConfig(format!("hook method '{}': {e}", request.method))
        })?;
        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout)
            .json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let transport_error = |e: reqwest::Error| {
            if e.is_timeout() {
                FlowError::HookTimeout {
                    url: request.url.clone(),
                    timeout_ms: request.timeout.as_millis() as u64,
                }
            } else {
                FlowError::Hook {
                    url: request.url.clone(),
                    status: 0,
                    message: e.to_string(),
                }
            }
        };
        let resp = builder.send().await.map_err(transport_error)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(transport_error)?;
        Ok(HookReply { status, body })
    }
}

// ---------------------------------------------------------------------------
// Response + cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Replaces the matched route's output when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedResponse {
    stored_at: Instant,
    ttl: Duration,
    response: HookResponse,
}

impl CachedResponse {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

/// Calls hooks through a transport, caching valid replies per URL.
///
/// The cache sits behind an async `RwLock`, so one client can serve
/// concurrent evaluations.
#[derive(Clone)]
pub struct HookClient {
    transport: Arc<dyn HookTransport>,
    cache: Arc<RwLock<HashMap<String, CachedResponse>>>,
    default_timeout: Duration,
}

impl std::fmt::Debug for HookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookClient")
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for HookClient {
    fn default() -> Self {
        Self::new(ReqwestTransport::new())
    }
}

impl HookClient {
    pub fn new(transport: impl HookTransport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            cache: Arc::new(RwLock::new(HashMap::new())),
            default_timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Drop every cached reply.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    pub async fn cached_urls(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn call(&self, mode: &HookMode, vars: &serde_json::Map<String, Value>) -> Result<HookResponse> {
        let ttl = mode.cache_ttl_seconds.map(Duration::from_secs);
        if ttl.is_some() {
            if let Some(hit) = self.cache.read().await.get(&mode.url).filter(|c| c.is_fresh()) {
                tracing::debug!(url = %mode.url, "Hook cache hit");
                return Ok(hit.response.clone());
            }
        }

        let timeout = mode.timeout_ms.map(Duration::from_millis).unwrap_or(self.default_timeout);
        let request = HookRequest {
            url: mode.url.clone(),
            method: mode.method.clone(),
            headers: mode.headers.clone(),
            body: Value::Object(vars.clone()),
            timeout,
        };
        let timed_out = || FlowError::HookTimeout {
            url: mode.url.clone(),
            timeout_ms: timeout.as_millis() as u64,
        };
        let reply = tokio::time::timeout(timeout, self.transport.send(&request))
            .await
            .map_err(|_| timed_out())?
            .inspect_err(|e| tracing::warn!(url = %mode.url, error = %e, "Hook call failed"))?;

        if reply.status != 200 {
            tracing::warn!(url = %mode.url, status = reply.status, "Hook returned non-200");
            return Err(FlowError::Hook {
                url: mode.url.clone(),
                status: reply.status,
                message: truncate(&reply.body, 200),
            });
        }
        let response: HookResponse = serde_json::from_str(&reply.body).map_err(|e| {
            tracing::warn!(url = %mode.url, error = %e, "Hook returned a malformed body");
            FlowError::Hook {
                url: mode.url.clone(),
                status: reply.status,
                message: format!("malformed hook response: {e}"),
            }
        })?;

        if let Some(ttl) = ttl {
            self.cache.write().await.insert(
                mode.url.clone(),
                CachedResponse {
                    stored_at: Instant::now(),
                    ttl,
                    response: response.clone(),
                },
            );
        }
        tracing::debug!(url = %mode.url, valid = response.valid, "Hook answered");
        Ok(response)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
