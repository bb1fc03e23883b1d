use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde_json::Value;
use tracing::debug;

use super::request::{ApiRequest, ApiResponse};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// The network seam. Implementations send exactly one request and report the
/// status; they never retry and never interpret 401.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, req: &ApiRequest, bearer: Option<&str>) -> ClientResult<ApiResponse>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    root: String,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ClientError::config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { root: config.api_root().to_string(), client })
    }

    pub fn root(&self) -> &str { &self.root }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, req: &ApiRequest, bearer: Option<&str>) -> ClientResult<ApiResponse> {
        // Url::join would drop the API root's own path segment, so concatenate.
        let url = format!("{}{}", self.root, req.path);
        let mut rb = self.client.request(req.method.clone(), &url);
        if !req.query.is_empty() {
            rb = rb.query(&req.query);
        }
        if let Some(token) = bearer {
            let hv = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ClientError::invalid("access token is not a valid header value"))?;
            rb = rb.header(AUTHORIZATION, hv);
        }
        if let Some(body) = &req.body {
            rb = rb.json(body);
        }
        debug!(target: "velovis::gateway", "send {} {} auth={}", req.method, req.path, bearer.is_some());
        let resp = rb.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        debug!(target: "velovis::gateway", "recv {} {} status={}", req.method, req.path, status);
        Ok(ApiResponse { status, body })
    }
}
