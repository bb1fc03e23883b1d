use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

/// How a request is authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Attach the session's access token and run the refresh-once protocol on 401.
    Session,
    /// Attach this token verbatim. A 401 is final.
    Bearer(String),
    /// No Authorization header. A 401 is final.
    Anonymous,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the API root, starting with `/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub auth: AuthMode,
    retried: bool,
}

impl ApiRequest {
    pub fn new<P: Into<String>>(method: Method, path: P) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') { path.insert(0, '/'); }
        Self { method, path, query: Vec::new(), body: None, auth: AuthMode::Session, retried: false }
    }

    pub fn get<P: Into<String>>(path: P) -> Self { Self::new(Method::GET, path) }
    pub fn post<P: Into<String>>(path: P) -> Self { Self::new(Method::POST, path) }
    pub fn patch<P: Into<String>>(path: P) -> Self { Self::new(Method::PATCH, path) }
    pub fn delete<P: Into<String>>(path: P) -> Self { Self::new(Method::DELETE, path) }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> ClientResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.auth = AuthMode::Anonymous;
        self
    }

    pub fn bearer<S: Into<String>>(mut self, token: S) -> Self {
        self.auth = AuthMode::Bearer(token.into());
        self
    }

    pub fn is_retried(&self) -> bool { self.retried }

    pub(crate) fn mark_retried(&mut self) { self.retried = true; }
}

/// Percent-encode one path segment (ids come from the backend and from users).
pub fn segment(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Decoded JSON body; `Null` for empty bodies, a JSON string for non-JSON text.
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self { Self { status, body } }

    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }

    pub fn json<T: DeserializeOwned>(self) -> ClientResult<T> {
        serde_json::from_value(self.body).map_err(|e| ClientError::decode(format!("unexpected response shape: {}", e)))
    }

    pub fn into_error(self) -> ClientError {
        ClientError::from_response(self.status, &self.body)
    }
}
