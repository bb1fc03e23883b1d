#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

pub const PASSWORD: &str = "dogru-sifre";

type Reply = (StatusCode, Json<Value>);

#[derive(Default)]
pub struct MockState {
    /// Access token the resources currently accept.
    pub valid_access: String,
    pub valid_refresh: String,
    pub refresh_enabled: bool,
    pub refresh_calls: u32,
    pub issued: u32,
    pub logouts: Vec<Value>,
    pub cart: Vec<Value>,
    pub reject_quantity_updates: bool,
}

#[derive(Clone)]
pub struct Mock(pub Arc<Mutex<MockState>>);

impl Mock {
    /// Make every outstanding access token stale, as if it had expired.
    pub fn expire_access(&self) {
        self.0.lock().valid_access = "expired-everywhere".into();
    }

    /// Reject refresh tokens too.
    pub fn expire_all(&self) {
        let mut st = self.0.lock();
        st.valid_access = "expired-everywhere".into();
        st.refresh_enabled = false;
    }

    pub fn refresh_calls(&self) -> u32 { self.0.lock().refresh_calls }
}

pub struct Backend {
    pub url: String,
    pub mock: Mock,
    handle: JoinHandle<()>,
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn reply(status: StatusCode, body: Value) -> Reply { (status, Json(body)) }
fn unauthorized() -> Reply { reply(StatusCode::UNAUTHORIZED, json!({"message": "Unauthorized", "statusCode": 401})) }

fn authorized(mock: &Mock, headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {}", mock.0.lock().valid_access);
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(expected.as_str())
}

fn issue(st: &mut MockState) -> Value {
    st.issued += 1;
    st.valid_access = format!("access-{}", st.issued);
    st.valid_refresh = format!("refresh-{}", st.issued);
    json!({"accessToken": st.valid_access, "refreshToken": st.valid_refresh})
}

fn product(id: &str) -> Value {
    json!({"id": id, "name": format!("Urun {}", id), "slug": id.to_lowercase(), "price": 150.0, "stockQuantity": 10, "primaryPhotoUrl": null, "photos": []})
}

async fn login(State(mock): State<Mock>, Json(body): Json<Value>) -> Reply {
    if body["password"] != PASSWORD {
        return unauthorized();
    }
    let mut st = mock.0.lock();
    st.refresh_enabled = true;
    reply(StatusCode::CREATED, issue(&mut st))
}

async fn me(State(mock): State<Mock>, headers: HeaderMap) -> Reply {
    if !authorized(&mock, &headers) {
        return unauthorized();
    }
    reply(
        StatusCode::OK,
        json!({"id": "u-1", "username": "ayse", "fullName": "Ayse Yilmaz", "email": "ayse@example.com", "roles": ["admin"], "permissions": ["roles:read"]}),
    )
}

async fn refresh(State(mock): State<Mock>, Json(body): Json<Value>) -> Reply {
    let mut st = mock.0.lock();
    st.refresh_calls += 1;
    if !st.refresh_enabled || body["refreshToken"] != st.valid_refresh.as_str() {
        return reply(StatusCode::UNAUTHORIZED, json!({"message": "Invalid refresh token"}));
    }
    reply(StatusCode::OK, issue(&mut st))
}

async fn logout(State(mock): State<Mock>, Json(body): Json<Value>) -> Reply {
    mock.0.lock().logouts.push(body);
    reply(StatusCode::OK, json!({"message": "ok"}))
}

async fn list_cart(State(mock): State<Mock>, headers: HeaderMap) -> Reply {
    if !authorized(&mock, &headers) {
        return unauthorized();
    }
    reply(StatusCode::OK, Value::Array(mock.0.lock().cart.clone()))
}

async fn add_cart(State(mock): State<Mock>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    if !authorized(&mock, &headers) {
        return unauthorized();
    }
    let pid = body["productId"].as_str().unwrap_or_default().to_string();
    let qty = body["quantity"].as_u64().unwrap_or(1);
    let size = body["size"].clone();
    let mut st = mock.0.lock();
    if let Some(line) = st.cart.iter_mut().find(|l| l["product"]["id"] == pid.as_str() && l["size"] == size) {
        let merged = line["quantity"].as_u64().unwrap_or(0) + qty;
        line["quantity"] = json!(merged);
        return reply(StatusCode::CREATED, line.clone());
    }
    let line = json!({"id": format!("ci-{}", st.cart.len() + 1), "quantity": qty, "size": size, "product": product(&pid)});
    st.cart.push(line.clone());
    reply(StatusCode::CREATED, line)
}

async fn patch_cart(State(mock): State<Mock>, headers: HeaderMap, Path(id): Path<String>, Json(body): Json<Value>) -> Reply {
    if !authorized(&mock, &headers) {
        return unauthorized();
    }
    let mut st = mock.0.lock();
    if st.reject_quantity_updates {
        return reply(StatusCode::BAD_REQUEST, json!({"message": ["Yetersiz stok"]}));
    }
    match st.cart.iter_mut().find(|l| l["id"] == id.as_str()) {
        Some(line) => {
            line["quantity"] = body["quantity"].clone();
            reply(StatusCode::OK, line.clone())
        }
        None => reply(StatusCode::NOT_FOUND, json!({"message": "Cart item not found"})),
    }
}

async fn delete_cart(State(mock): State<Mock>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    if !authorized(&mock, &headers) {
        return unauthorized();
    }
    mock.0.lock().cart.retain(|l| l["id"] != id.as_str());
    reply(StatusCode::OK, json!({"message": "deleted"}))
}

async fn get_product(Path(id): Path<String>) -> Reply {
    reply(StatusCode::OK, product(&id))
}

async fn track(Json(body): Json<Value>) -> Reply {
    if body["email"] != "ayse@example.com" {
        return reply(StatusCode::NOT_FOUND, json!({"message": "Order not found"}));
    }
    reply(StatusCode::OK, json!({"id": body["orderId"], "status": "SHIPPED", "totalPrice": 300.0}))
}

/// Mock storefront API on an ephemeral port, mounted under `/api`.
pub async fn start_backend() -> Backend {
    let mock = Mock(Arc::new(Mutex::new(MockState::default())));
    let api = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/cart-items", get(list_cart).post(add_cart))
        .route("/cart-items/{id}", patch(patch_cart).delete(delete_cart))
        .route("/products/{id}", get(get_product))
        .route("/orders/track", post(track))
        .with_state(mock.clone());
    let app = Router::new().nest("/api", api);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    let port = listener.local_addr().expect("local addr").port();
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("mock backend error: {e:?}");
        }
    });
    Backend { url: format!("http://127.0.0.1:{}/api", port), mock, handle }
}

/// Poll `cond` until it holds or `timeout` passes.
pub async fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
