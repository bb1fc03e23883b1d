//! In-process transport for unit tests: a closure plays the backend.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ApiRequest, ApiResponse, HttpTransport};
use crate::error::ClientResult;

type Handler = dyn Fn(&ApiRequest, Option<&str>) -> ClientResult<ApiResponse> + Send + Sync;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Seen {
    pub method: String,
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
}

pub(crate) struct FakeBackend {
    handler: Box<Handler>,
    delay: Duration,
    seen: Mutex<Vec<Seen>>,
}

impl FakeBackend {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ApiRequest, Option<&str>) -> ClientResult<ApiResponse> + Send + Sync + 'static,
    {
        Self { handler: Box::new(handler), delay: Duration::ZERO, seen: Mutex::new(Vec::new()) }
    }

    /// Every call sleeps this long before answering, so concurrent callers interleave.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn seen(&self) -> Vec<Seen> { self.seen.lock().clone() }

    pub fn calls_to(&self, path: &str) -> usize {
        self.seen.lock().iter().filter(|s| s.path == path).count()
    }
}

#[async_trait]
impl HttpTransport for FakeBackend {
    async fn execute(&self, req: &ApiRequest, bearer: Option<&str>) -> ClientResult<ApiResponse> {
        self.seen.lock().push(Seen {
            method: req.method.to_string(),
            path: req.path.clone(),
            bearer: bearer.map(str::to_string),
            body: req.body.clone(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.handler)(req, bearer)
    }
}
