use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::Gateway;
use crate::error::{ClientError, ClientResult};
use crate::gateway::ApiRequest;
use crate::identity::{Tokens, UserProfile};

const MIN_PASSWORD_LEN: usize = 8;
const BAD_CREDENTIALS: &str = "invalid username or password";

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutBody<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChange<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    pub fn validate(&self) -> ClientResult<()> {
        for (label, v) in [("first name", &self.first_name), ("last name", &self.last_name), ("username", &self.username)] {
            if v.trim().is_empty() {
                return Err(ClientError::invalid(format!("{} is required", label)));
            }
        }
        if !self.email.contains('@') {
            return Err(ClientError::invalid("a valid e-mail is required"));
        }
        check_password(&self.password)
    }
}

fn check_password(p: &str) -> ClientResult<()> {
    if p.chars().count() < MIN_PASSWORD_LEN {
        return Err(ClientError::invalid(format!("password must be at least {} characters", MIN_PASSWORD_LEN)));
    }
    Ok(())
}

pub struct AuthApi {
    gateway: Gateway,
}

impl AuthApi {
    pub fn new(gateway: Gateway) -> Self { Self { gateway } }

    /// Exchange credentials for tokens, load the profile with the new access token,
    /// then install both in the session. Nothing changes if any step fails.
    pub async fn sign_in(&self, username: &str, password: &str) -> ClientResult<UserProfile> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ClientError::invalid("username and password are required"));
        }
        let login = ApiRequest::post("/auth/login").anonymous().json(&Credentials { username: username.trim(), password })?;
        let tokens: Tokens = match self.gateway.send_json(login).await {
            Ok(t) => t,
            Err(ClientError::Unauthorized { .. }) => return Err(ClientError::unauthorized(BAD_CREDENTIALS)),
            Err(e) => return Err(e),
        };
        let user: UserProfile = self.gateway.send_json(ApiRequest::get("/auth/me").bearer(tokens.access_token.clone())).await?;
        self.gateway.session().login(tokens, user.clone());
        Ok(user)
    }

    /// Best-effort server-side logout, then the local session is always cleared.
    pub async fn sign_out(&self) {
        if let Some(tokens) = self.gateway.session().tokens() {
            let req = ApiRequest::post("/auth/logout")
                .bearer(tokens.access_token.clone())
                .json(&LogoutBody { refresh_token: &tokens.refresh_token });
            let sent = match req {
                Ok(r) => self.gateway.send(r).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = sent {
                warn!(target: "velovis::api", "server logout failed: {}", e);
            }
        }
        self.gateway.session().logout();
    }

    /// Current profile from the backend.
    pub async fn me(&self) -> ClientResult<UserProfile> {
        self.gateway.send_json(ApiRequest::get("/auth/me")).await
    }

    pub async fn register(&self, form: &Registration) -> ClientResult<Value> {
        form.validate()?;
        let resp = self.gateway.send(ApiRequest::post("/auth/register").anonymous().json(form)?).await?;
        info!(target: "velovis::api", "registration accepted username={}", form.username);
        Ok(resp.body)
    }

    /// Confirm an account with the token from the activation mail.
    pub async fn activate(&self, token: &str) -> ClientResult<Value> {
        if token.trim().is_empty() {
            return Err(ClientError::invalid("activation token is missing"));
        }
        let resp = self.gateway.send(ApiRequest::get("/auth/activate").anonymous().query("token", token.trim())).await?;
        Ok(resp.body)
    }

    pub async fn change_password(&self, current: &str, new_password: &str) -> ClientResult<()> {
        if current.is_empty() {
            return Err(ClientError::invalid("current password is required"));
        }
        check_password(new_password)?;
        let req = ApiRequest::patch("/auth/change-password").json(&PasswordChange { current_password: current, new_password })?;
        self.gateway.send(req).await?;
        Ok(())
    }
}
