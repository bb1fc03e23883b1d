use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Method;
use serde_json::{json, Value};

use super::*;
use crate::gateway::testing::FakeBackend;
use crate::gateway::{ApiResponse, RecordingNavigator};
use crate::identity::{Tokens, UserProfile};
use crate::storage::{MemoryStorage, Storage};

struct Rig {
    cart: Arc<CartSynchronizer>,
    backend: Arc<FakeBackend>,
    session: Arc<SessionManager>,
    storage: Arc<MemoryStorage>,
}

fn rig_with(backend: FakeBackend, storage: Arc<MemoryStorage>, policy: GuestCartPolicy) -> Rig {
    let session = Arc::new(SessionManager::restore(storage.clone()));
    let backend = Arc::new(backend);
    let gateway = Arc::new(RequestGateway::new(backend.clone(), session.clone(), Arc::new(RecordingNavigator::new()), "/login"));
    let cart = Arc::new(CartSynchronizer::new(gateway, storage.clone(), policy));
    Rig { cart, backend, session, storage }
}

fn rig(backend: FakeBackend) -> Rig {
    rig_with(backend, Arc::new(MemoryStorage::new()), GuestCartPolicy::Discard)
}

fn ok(body: Value) -> ClientResult<ApiResponse> { Ok(ApiResponse::new(200, body)) }

fn product_json(id: &str, stock: u32) -> Value {
    json!({"id": id, "name": format!("Urun {}", id), "slug": id.to_lowercase(), "price": 250.0, "stockQuantity": stock, "primaryPhotoUrl": null})
}

fn line_json(id: &str, product: &str, size: Option<&str>, qty: u32) -> Value {
    json!({"id": id, "quantity": qty, "size": size, "product": {"id": product, "name": product, "price": 100.0, "primaryPhotoUrl": null}})
}

fn login(session: &SessionManager) -> SessionChanged {
    let mut rx = session.subscribe();
    session.login(Tokens::new("a1", "r1"), UserProfile { id: "u1".into(), username: "ayse".into(), ..Default::default() });
    rx.try_recv().unwrap()
}

fn catalog_backend() -> FakeBackend {
    FakeBackend::new(|req, _| {
        let id = req.path.trim_start_matches("/products/");
        ok(product_json(id, 5))
    })
}

#[tokio::test]
async fn guest_adds_merge_into_one_line() {
    let r = rig(catalog_backend());
    r.cart.add_item("P1", 1, Some("M")).await.unwrap();
    let merged = r.cart.add_item("P1", 2, Some("M")).await.unwrap();
    assert_eq!(merged.quantity, 3);

    let items = r.cart.items();
    assert_eq!(items.len(), 1);
    assert!(items[0].is_guest());
    assert_eq!(items[0].product.stock_quantity, Some(5));
    // the detail fetch only happens for a brand-new line
    assert_eq!(r.backend.seen().len(), 1);

    let doc = r.storage.load(CART_STORAGE_KEY).unwrap().unwrap();
    assert_eq!(doc["items"][0]["quantity"], json!(3));
}

#[tokio::test]
async fn guest_sizes_are_separate_lines_newest_first() {
    let r = rig(catalog_backend());
    r.cart.add_item("P1", 1, Some("M")).await.unwrap();
    r.cart.add_item("P1", 1, Some("L")).await.unwrap();
    let sizes: Vec<Option<String>> = r.cart.items().into_iter().map(|i| i.size).collect();
    assert_eq!(sizes, vec![Some("L".to_string()), Some("M".to_string())]);
}

#[tokio::test]
async fn guest_stock_bound_is_enforced() {
    let r = rig(catalog_backend());
    r.cart.add_item("P1", 4, None).await.unwrap();
    let err = r.cart.add_item("P1", 2, None).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidInput { .. }));
    assert_eq!(r.cart.items()[0].quantity, 4);

    let id = r.cart.items()[0].id.clone();
    assert!(r.cart.update_item_quantity(&id, 6).await.is_err());
    assert_eq!(r.cart.items()[0].quantity, 4);
}

#[tokio::test]
async fn quantity_below_one_is_rejected_without_a_request() {
    let r = rig(catalog_backend());
    let err = r.cart.add_item("P1", 0, None).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidInput { .. }));
    assert!(r.backend.seen().is_empty());
    assert!(r.cart.update_item_quantity("anything", 0).await.is_err());
}

#[tokio::test]
async fn guest_cart_survives_restart() {
    let storage = Arc::new(MemoryStorage::new());
    {
        let r = rig_with(catalog_backend(), storage.clone(), GuestCartPolicy::Discard);
        r.cart.add_item("P9", 2, Some("S")).await.unwrap();
    }
    let r = rig_with(catalog_backend(), storage, GuestCartPolicy::Discard);
    let items = r.cart.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product.id, "P9");
    assert_eq!(items[0].quantity, 2);
}

#[tokio::test]
async fn authenticated_double_add_keeps_one_line() {
    let adds = Arc::new(Mutex::new(0u32));
    let counter = adds.clone();
    let r = rig(FakeBackend::new(move |req, _| {
        assert_eq!(req.path, CART_PATH);
        let mut n = counter.lock();
        *n += 1;
        // the backend merges quantities into the existing line
        ok(line_json("ci_1", "P2", Some("L"), *n))
    }));
    login(&r.session);

    r.cart.add_item("P2", 1, Some("L")).await.unwrap();
    r.cart.add_item("P2", 1, Some("L")).await.unwrap();

    let items = r.cart.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "ci_1");
    assert_eq!(items[0].quantity, 2);
    let seen = r.backend.seen();
    assert_eq!(seen[0].body, Some(json!({"productId": "P2", "quantity": 1, "size": "L"})));
    // nothing server-owned goes to local storage
    assert!(r.storage.load(CART_STORAGE_KEY).unwrap().is_none());
}

#[tokio::test]
async fn failed_quantity_update_rolls_back() {
    let r = rig(FakeBackend::new(|req, _| {
        if req.method == Method::PATCH {
            return Ok(ApiResponse::new(400, json!({"message": "Yetersiz stok"})));
        }
        ok(json!([line_json("ci_1", "P1", None, 2), line_json("ci_2", "P3", None, 1)]))
    }));
    login(&r.session);
    r.cart.fetch_cart().await.unwrap();

    let err = r.cart.update_item_quantity("ci_1", 5).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    let st = r.cart.snapshot();
    assert_eq!(st.find("ci_1").unwrap().quantity, 2);
    assert_eq!(st.find("ci_2").unwrap().quantity, 1);
    assert_eq!(st.error.as_deref(), Some("Yetersiz stok"));
}

#[tokio::test]
async fn quantity_update_shows_immediately_and_adopts_server_line() {
    let r = rig(
        FakeBackend::new(|req, _| {
            if req.method == Method::PATCH {
                return ok(line_json("ci_1", "P1", None, 3));
            }
            ok(json!([line_json("ci_1", "P1", None, 1)]))
        })
        .with_delay(Duration::from_millis(30)),
    );
    login(&r.session);
    r.cart.fetch_cart().await.unwrap();

    let cart = r.cart.clone();
    let pending = tokio::spawn(async move { cart.update_item_quantity("ci_1", 3).await });
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(r.cart.snapshot().find("ci_1").unwrap().quantity, 3);
    pending.await.unwrap().unwrap();
    assert_eq!(r.cart.snapshot().find("ci_1").unwrap().quantity, 3);
}

#[tokio::test]
async fn remove_deletes_on_server_then_locally() {
    let r = rig(FakeBackend::new(|req, _| {
        if req.method == Method::DELETE {
            return ok(Value::Null);
        }
        ok(json!([line_json("ci_1", "P1", None, 1), line_json("ci_2", "P2", None, 1)]))
    }));
    login(&r.session);
    r.cart.fetch_cart().await.unwrap();
    r.cart.remove_item("ci_1").await.unwrap();
    assert_eq!(r.cart.items().iter().map(|i| i.id.as_str()).collect::<Vec<_>>(), vec!["ci_2"]);
    let seen = r.backend.seen();
    assert_eq!(seen.last().unwrap().path, "/cart-items/ci_1");
}

#[tokio::test]
async fn logout_clears_cart_and_late_fetch_is_dropped() {
    let r = rig(FakeBackend::new(|_, _| ok(json!([line_json("ci_1", "P1", None, 1)]))).with_delay(Duration::from_millis(40)));
    let _ = login(&r.session);

    let cart = r.cart.clone();
    let inflight = tokio::spawn(async move { cart.fetch_cart().await });
    tokio::time::sleep(Duration::from_millis(5)).await;

    let mut rx = r.session.subscribe();
    r.session.logout();
    r.cart.handle_session_change(rx.recv().await.unwrap()).await;

    inflight.await.unwrap().unwrap();
    let st = r.cart.snapshot();
    assert!(st.items.is_empty(), "stale response repopulated the cart: {:?}", st.items);
    assert!(!st.is_loading);
}

#[tokio::test]
async fn login_replaces_guest_cart_with_server_cart() {
    let r = rig(FakeBackend::new(|req, _| {
        if req.path.starts_with("/products/") {
            return ok(product_json("P1", 10));
        }
        ok(json!([line_json("ci_7", "P7", Some("M"), 1)]))
    }));
    r.cart.add_item("P1", 2, Some("M")).await.unwrap();

    let ev = login(&r.session);
    r.cart.handle_session_change(ev).await;

    let items = r.cart.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "ci_7");
    assert!(r.storage.load(CART_STORAGE_KEY).unwrap().is_none());
    assert!(r.backend.seen().iter().all(|s| s.method != "POST"));

    let dropped = r.cart.discarded_guest_items();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].product.id, "P1");
    assert_eq!(dropped[0].quantity, 2);
    // still available after the next logout
    r.session.logout();
    r.cart.clear_client_cart();
    assert_eq!(r.cart.discarded_guest_items().len(), 1);
}

#[tokio::test]
async fn migrate_policy_posts_guest_lines_before_fetch() {
    let r = rig_with(
        FakeBackend::new(|req, _| {
            if req.path.starts_with("/products/") {
                return ok(product_json("P1", 10));
            }
            if req.method == Method::POST {
                return ok(line_json("ci_1", "P1", Some("M"), 2));
            }
            ok(json!([line_json("ci_1", "P1", Some("M"), 2)]))
        }),
        Arc::new(MemoryStorage::new()),
        GuestCartPolicy::Migrate,
    );
    r.cart.add_item("P1", 2, Some("M")).await.unwrap();

    let ev = login(&r.session);
    r.cart.handle_session_change(ev).await;

    let seen = r.backend.seen();
    let posts: Vec<_> = seen.iter().filter(|s| s.method == "POST").collect();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].body, Some(json!({"productId": "P1", "quantity": 2, "size": "M"})));
    assert_eq!(seen.last().unwrap().method, "GET");
    assert_eq!(r.cart.items()[0].id, "ci_1");
}

#[tokio::test]
async fn failed_fetch_sets_error_unless_auth() {
    let r = rig(FakeBackend::new(|_, _| Ok(ApiResponse::new(500, json!({})))));
    login(&r.session);
    assert!(r.cart.fetch_cart().await.is_err());
    let st = r.cart.snapshot();
    assert_eq!(st.error.as_deref(), Some(LOAD_FAILED));
    assert!(!st.is_loading);
}

#[tokio::test]
async fn attached_listener_follows_session() {
    let r = rig(FakeBackend::new(|_, _| ok(json!([line_json("ci_1", "P1", None, 1)]))));
    let listener = r.cart.attach(r.session.subscribe());

    login(&r.session);
    for _ in 0..100 {
        if !r.cart.items().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(r.cart.items().len(), 1);

    r.session.logout();
    for _ in 0..100 {
        if r.cart.items().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(r.cart.items().is_empty());
    listener.abort();
}

#[tokio::test]
async fn guest_fetch_is_a_no_op() {
    let r = rig(catalog_backend());
    r.cart.fetch_cart().await.unwrap();
    assert!(r.backend.seen().is_empty());
}

#[tokio::test]
async fn guest_merge_overflow_is_rejected() {
    let r = rig(FakeBackend::new(|req, _| {
        let id = req.path.trim_start_matches("/products/");
        ok(json!({"id": id, "name": "Urun", "price": 10.0}))
    }));
    r.cart.add_item("P1", 1, Some("M")).await.unwrap();
    let err = r.cart.add_item("P1", u32::MAX, Some("M")).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidInput { .. }));
    assert_eq!(r.cart.items()[0].quantity, 1);
    let doc = r.storage.load(CART_STORAGE_KEY).unwrap().unwrap();
    assert_eq!(doc["items"][0]["quantity"], json!(1));
}

#[tokio::test]
async fn string_prices_from_the_backend_are_accepted() {
    let r = rig(FakeBackend::new(|_, _| {
        ok(json!([{"id": "ci_1", "quantity": 2, "size": null, "product": {"id": "P1", "name": "P1", "price": "250.00", "primaryPhotoUrl": null}}]))
    }));
    login(&r.session);
    r.cart.fetch_cart().await.unwrap();
    let st = r.cart.snapshot();
    assert_eq!(st.items[0].product.price, 250.0);
    assert_eq!(st.total_price(), 500.0);
}

#[tokio::test]
async fn guest_add_with_failed_detail_fetch_leaves_cart_untouched() {
    let r = rig(FakeBackend::new(|_, _| Ok(ApiResponse::new(404, json!({"message": "Product not found"})))));
    let err = r.cart.add_item("P404", 1, None).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound { .. }));
    let st = r.cart.snapshot();
    assert!(st.items.is_empty());
    assert!(!st.is_loading);
    assert!(r.storage.load(CART_STORAGE_KEY).unwrap().is_none());
}

#[tokio::test]
async fn guest_remove_is_local_and_persisted() {
    let r = rig(catalog_backend());
    r.cart.add_item("P1", 1, None).await.unwrap();
    r.cart.add_item("P2", 1, None).await.unwrap();
    let calls = r.backend.seen().len();
    let gone = r.cart.items().into_iter().find(|i| i.product.id == "P1").unwrap().id;

    r.cart.remove_item(&gone).await.unwrap();
    let items = r.cart.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product.id, "P2");
    assert_eq!(r.backend.seen().len(), calls);
    let doc = r.storage.load(CART_STORAGE_KEY).unwrap().unwrap();
    assert_eq!(doc["items"].as_array().unwrap().len(), 1);
    assert_eq!(doc["items"][0]["product"]["id"], json!("P2"));
}

#[tokio::test]
async fn rejected_server_remove_keeps_the_line() {
    let r = rig(FakeBackend::new(|req, _| {
        if req.method == Method::DELETE {
            return Ok(ApiResponse::new(409, json!({"message": "Sepet kilitli"})));
        }
        ok(json!([line_json("ci_1", "P1", None, 1)]))
    }));
    login(&r.session);
    r.cart.fetch_cart().await.unwrap();

    let err = r.cart.remove_item("ci_1").await.unwrap_err();
    assert!(matches!(err, ClientError::Conflict { .. }));
    let st = r.cart.snapshot();
    assert_eq!(st.items.len(), 1);
    assert_eq!(st.error.as_deref(), Some("Sepet kilitli"));
    assert!(!st.is_loading);
}
