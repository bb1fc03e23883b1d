use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

pub const ENV_API_URL: &str = "VELOVIS_API_URL";
pub const ENV_STORAGE_DIR: &str = "VELOVIS_STORAGE_DIR";
pub const ENV_HTTP_TIMEOUT_MS: &str = "VELOVIS_HTTP_TIMEOUT_MS";
pub const ENV_LOGIN_ROUTE: &str = "VELOVIS_LOGIN_ROUTE";
pub const ENV_GUEST_CART: &str = "VELOVIS_GUEST_CART";

/// What happens to a guest cart when the visitor logs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GuestCartPolicy {
    /// The server cart replaces the guest cart; guest lines are dropped.
    #[default]
    Discard,
    /// Guest lines are posted to the server cart before it is fetched.
    Migrate,
}

impl GuestCartPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discard" => Some(GuestCartPolicy::Discard),
            "migrate" => Some(GuestCartPolicy::Migrate),
            _ => None,
        }
    }
}

/// Client settings. Unspecified fields in a config file fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Backend API root, e.g. `https://shop.example.com/api`.
    #[serde(default = "ClientConfig::default_api_base_url")]
    pub api_base_url: String,
    /// Directory for durable storage. `None` keeps state in memory only.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default = "ClientConfig::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Route the host navigates to when the session cannot be recovered.
    #[serde(default = "ClientConfig::default_login_route")]
    pub login_route: String,
    #[serde(default)]
    pub guest_cart_policy: GuestCartPolicy,
}

impl ClientConfig {
    fn default_api_base_url() -> String { "http://localhost:3000/api".to_string() }
    fn default_request_timeout_ms() -> u64 { 15_000 }
    fn default_login_route() -> String { "/login".to_string() }

    pub fn with_base_url<S: Into<String>>(base: S) -> Self {
        Self { api_base_url: base.into(), ..Self::default() }
    }

    /// Defaults overlaid with environment variables.
    pub fn from_env() -> ClientResult<Self> {
        let mut cfg = Self::default();
        cfg.apply_env(|k| std::env::var(k).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults, then the JSON file at `path` (if given), then environment variables.
    pub fn load(path: Option<&Path>) -> ClientResult<Self> {
        let mut cfg = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .map_err(|e| ClientError::config(format!("cannot read {}: {}", p.display(), e)))?;
                serde_json::from_str::<ClientConfig>(&text)
                    .map_err(|e| ClientError::config(format!("invalid config {}: {}", p.display(), e)))?
            }
            None => Self::default(),
        };
        cfg.apply_env(|k| std::env::var(k).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env<F>(&mut self, lookup: F) -> ClientResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = v.trim().to_string();
        }
        if let Some(v) = lookup(ENV_STORAGE_DIR).filter(|v| !v.trim().is_empty()) {
            self.storage_dir = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = lookup(ENV_HTTP_TIMEOUT_MS) {
            self.request_timeout_ms = v
                .trim()
                .parse()
                .map_err(|_| ClientError::config(format!("{} must be a number of milliseconds, got '{}'", ENV_HTTP_TIMEOUT_MS, v)))?;
        }
        if let Some(v) = lookup(ENV_LOGIN_ROUTE).filter(|v| !v.trim().is_empty()) {
            self.login_route = v.trim().to_string();
        }
        if let Some(v) = lookup(ENV_GUEST_CART) {
            self.guest_cart_policy = GuestCartPolicy::parse(&v)
                .ok_or_else(|| ClientError::config(format!("{} must be 'discard' or 'migrate', got '{}'", ENV_GUEST_CART, v)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ClientResult<()> {
        let url = reqwest::Url::parse(&self.api_base_url)
            .map_err(|e| ClientError::config(format!("invalid api_base_url '{}': {}", self.api_base_url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ClientError::config(format!("api_base_url must be http(s), got '{}'", url.scheme())));
        }
        if self.request_timeout_ms == 0 {
            return Err(ClientError::config("request_timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    /// Base URL without a trailing slash, ready for `format!("{}{}", base, "/path")`.
    pub fn api_root(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: Self::default_api_base_url(),
            storage_dir: None,
            request_timeout_ms: Self::default_request_timeout_ms(),
            login_route: Self::default_login_route(),
            guest_cart_policy: GuestCartPolicy::Discard,
        }
    }
}
