//!
//! velovis request gateway
//! -----------------------
//! The single HTTP entry point used by every service. Per request it:
//! - attaches `Authorization: Bearer <access>` from the session (attach),
//! - issues the call through the `HttpTransport` (send),
//! - on 401, and only once per request, refreshes the tokens and resends.
//!
//! Refresh calls go straight to the transport so they never re-enter the 401
//! handling. Concurrent 401s share one refresh: the first request to take the
//! refresh lock calls the endpoint, later ones see the replaced tokens and
//! reuse them. A rejected refresh logs the session out and asks the host to
//! navigate to the login route, exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::identity::{SessionManager, Tokens};

mod navigator;
mod request;
mod transport;

pub use navigator::{Navigator, NoopNavigator, RecordingNavigator};
pub use request::{segment, ApiRequest, ApiResponse, AuthMode};
pub use transport::{HttpTransport, ReqwestTransport};

pub const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

pub struct RequestGateway {
    transport: Arc<dyn HttpTransport>,
    session: Arc<SessionManager>,
    navigator: Arc<dyn Navigator>,
    login_route: String,
    refresh_lock: Mutex<()>,
    refresh_calls: AtomicU64,
}

impl RequestGateway {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        session: Arc<SessionManager>,
        navigator: Arc<dyn Navigator>,
        login_route: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            session,
            navigator,
            login_route: login_route.into(),
            refresh_lock: Mutex::new(()),
            refresh_calls: AtomicU64::new(0),
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> { &self.session }

    /// Number of calls made to the refresh endpoint so far.
    pub fn refresh_count(&self) -> u64 { self.refresh_calls.load(Ordering::Relaxed) }

    pub async fn send(&self, mut req: ApiRequest) -> ClientResult<ApiResponse> {
        let sent_with = self.bearer_for(&req);
        let resp = self.transport.execute(&req, sent_with.as_deref()).await?;
        if resp.is_success() {
            return Ok(resp);
        }
        if resp.status != 401 || req.auth != AuthMode::Session || req.is_retried() {
            return Err(resp.into_error());
        }

        req.mark_retried();
        debug!(target: "velovis::gateway", "401 on {} {}; attempting refresh", req.method, req.path);
        let fresh = self.refresh_after_unauthorized(sent_with.as_deref(), resp).await?;
        let retry = self.transport.execute(&req, Some(&fresh.access_token)).await?;
        if retry.is_success() {
            Ok(retry)
        } else {
            // a retried request never refreshes again
            Err(retry.into_error())
        }
    }

    pub async fn send_json<T: DeserializeOwned>(&self, req: ApiRequest) -> ClientResult<T> {
        self.send(req).await?.json()
    }

    /// Like `send`, but gives up with `ClientError::Cancelled` as soon as `token` is cancelled.
    /// The in-flight HTTP call is dropped, which aborts it.
    pub async fn send_cancellable(&self, req: ApiRequest, token: &CancellationToken) -> ClientResult<ApiResponse> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(target: "velovis::gateway", "request cancelled by scope");
                Err(ClientError::Cancelled)
            }
            r = self.send(req) => r,
        }
    }

    fn bearer_for(&self, req: &ApiRequest) -> Option<String> {
        match &req.auth {
            AuthMode::Session => self.session.tokens().map(|t| t.access_token),
            AuthMode::Bearer(t) => Some(t.clone()),
            AuthMode::Anonymous => None,
        }
    }

    /// `stale` is the access token the failed request carried.
    async fn refresh_after_unauthorized(&self, stale: Option<&str>, original: ApiResponse) -> ClientResult<Tokens> {
        let _guard = self.refresh_lock.lock().await;

        let Some(current) = self.session.tokens() else {
            debug!(target: "velovis::gateway", "no refresh token; propagating 401");
            return Err(original.into_error());
        };
        if stale != Some(current.access_token.as_str()) {
            debug!(target: "velovis::gateway", "tokens already replaced by a concurrent refresh; reusing");
            return Ok(current);
        }

        self.refresh_calls.fetch_add(1, Ordering::Relaxed);
        let refresh_req = ApiRequest::post(REFRESH_PATH)
            .anonymous()
            .json(&RefreshBody { refresh_token: &current.refresh_token })?;
        let outcome = self.transport.execute(&refresh_req, None).await;

        let rejection = match outcome {
            Ok(resp) if resp.is_success() => match resp.json::<Tokens>() {
                Ok(tokens) => {
                    if self.session.set_tokens(tokens.clone()) {
                        info!(target: "velovis::gateway", "access token refreshed");
                        return Ok(tokens);
                    }
                    debug!(target: "velovis::gateway", "session ended while the refresh was in flight");
                    return Err(ClientError::session_expired("session ended during token refresh"));
                }
                Err(e) => ClientError::session_expired(format!("refresh returned unusable tokens: {}", e.message())),
            },
            Ok(resp) if resp.status >= 500 => {
                warn!(target: "velovis::gateway", "refresh endpoint failed status={}; keeping session", resp.status);
                return Err(resp.into_error());
            }
            Ok(resp) => ClientError::session_expired(resp.into_error().message().to_string()),
            Err(e) => {
                warn!(target: "velovis::gateway", "refresh call did not complete: {}; keeping session", e);
                return Err(e);
            }
        };

        warn!(target: "velovis::gateway", "refresh rejected; forcing logout");
        self.session.logout();
        self.navigator.navigate(&self.login_route);
        Err(rejection)
    }
}

#[cfg(test)]
pub(crate) mod testing;
