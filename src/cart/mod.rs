//!
//! velovis cart synchronizer
//! -------------------------
//! Holds the shopping cart for guests and for logged-in users.
//!
//! - Guest cart: local only, persisted under `cart-storage`, authoritative.
//! - Authenticated cart: mirrors `/cart-items`; the backend is the source of truth
//!   and nothing is persisted locally.
//!
//! Session transitions arrive as `SessionChanged` events (see `attach`). Login
//! replaces the cart with the server's (optionally migrating guest lines first);
//! logout empties it. Every transition bumps an epoch, and a server response
//! that was requested in an older epoch is dropped instead of applied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::catalog::Product;
use crate::config::GuestCartPolicy;
use crate::error::{ClientError, ClientResult};
use crate::gateway::{segment, ApiRequest, RequestGateway};
use crate::identity::{AuthState, SessionChanged, SessionManager};
use crate::storage::{load_typed, save_typed, SharedStorage, CART_STORAGE_KEY};

mod model;

pub use model::{CartItem, CartProduct, CartState, GUEST_ID_PREFIX};
use model::{dedupe_lines, guest_item_id, PersistedCart};

const CART_PATH: &str = "/cart-items";
const LOAD_FAILED: &str = "The cart could not be loaded.";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddCartItem<'a> {
    product_id: &'a str,
    quantity: u32,
    size: Option<&'a str>,
}

#[derive(Serialize)]
struct QuantityPatch {
    quantity: u32,
}

pub struct CartSynchronizer {
    gateway: Arc<RequestGateway>,
    storage: SharedStorage,
    policy: GuestCartPolicy,
    state: RwLock<CartState>,
    epoch: AtomicU64,
    /// Guest lines dropped by the last `Discard` login.
    discarded: RwLock<Vec<CartItem>>,
}

fn check_quantity(quantity: u32) -> ClientResult<()> {
    if quantity < 1 {
        return Err(ClientError::invalid("quantity must be at least 1"));
    }
    Ok(())
}

fn merged_quantity(current: u32, added: u32) -> ClientResult<u32> {
    current
        .checked_add(added)
        .ok_or_else(|| ClientError::invalid(format!("quantity overflow: {} + {}", current, added)))
}

fn check_stock(requested: u32, stock: Option<u32>) -> ClientResult<()> {
    match stock {
        Some(available) if requested > available => Err(ClientError::invalid(format!(
            "insufficient stock: requested {}, available {}",
            requested, available
        ))),
        _ => Ok(()),
    }
}

impl CartSynchronizer {
    /// Guest lines are restored from storage when the session is anonymous.
    pub fn new(gateway: Arc<RequestGateway>, storage: SharedStorage, policy: GuestCartPolicy) -> Self {
        let mut initial = CartState::default();
        if !gateway.session().is_authenticated() {
            match load_typed::<PersistedCart>(storage.as_ref(), CART_STORAGE_KEY) {
                Ok(Some(saved)) => initial.items = dedupe_lines(saved.items),
                Ok(None) => {}
                Err(e) => warn!(target: "velovis::cart", "cannot read guest cart: {}", e),
            }
        }
        Self { gateway, storage, policy, state: RwLock::new(initial), epoch: AtomicU64::new(0), discarded: RwLock::new(Vec::new()) }
    }

    pub fn snapshot(&self) -> CartState { self.state.read().clone() }
    pub fn items(&self) -> Vec<CartItem> { self.state.read().items.clone() }

    /// Guest lines the server cart replaced at the last login under `Discard`.
    /// Kept until the next such login so the host can offer to re-add them.
    pub fn discarded_guest_items(&self) -> Vec<CartItem> { self.discarded.read().clone() }

    fn session(&self) -> &Arc<SessionManager> { self.gateway.session() }
    fn current_epoch(&self) -> u64 { self.epoch.load(Ordering::SeqCst) }
    fn bump_epoch(&self) -> u64 { self.epoch.fetch_add(1, Ordering::SeqCst) + 1 }

    /// Replace the local list with the server cart. No-op for guests.
    pub async fn fetch_cart(&self) -> ClientResult<()> {
        if !self.session().is_authenticated() {
            return Ok(());
        }
        let epoch = self.current_epoch();
        self.begin_loading();
        let result = self.gateway.send_json::<Vec<CartItem>>(ApiRequest::get(CART_PATH)).await;
        let mut st = self.state.write();
        st.is_loading = false;
        let stale = self.current_epoch() != epoch;
        match result {
            Ok(items) => {
                if stale {
                    debug!(target: "velovis::cart", "discarding cart fetched before a session change");
                } else {
                    st.items = dedupe_lines(items);
                    debug!(target: "velovis::cart", "cart fetched lines={}", st.items.len());
                }
                Ok(())
            }
            Err(e) => {
                // auth failures belong to the gateway's refresh/logout path
                if !stale && !e.is_auth() {
                    st.error = Some(LOAD_FAILED.to_string());
                }
                Err(e)
            }
        }
    }

    /// Add `quantity` of a product in `size`, merging into an existing line.
    pub async fn add_item(&self, product_id: &str, quantity: u32, size: Option<&str>) -> ClientResult<CartItem> {
        check_quantity(quantity)?;
        if self.session().is_authenticated() {
            self.add_item_remote(product_id, quantity, size).await
        } else {
            self.add_item_guest(product_id, quantity, size).await
        }
    }

    async fn add_item_remote(&self, product_id: &str, quantity: u32, size: Option<&str>) -> ClientResult<CartItem> {
        let epoch = self.current_epoch();
        self.begin_loading();
        let req = ApiRequest::post(CART_PATH).json(&AddCartItem { product_id, quantity, size })?;
        let result = self.gateway.send_json::<CartItem>(req).await;
        let mut st = self.state.write();
        st.is_loading = false;
        match result {
            Ok(item) => {
                if self.current_epoch() == epoch {
                    st.upsert(item.clone());
                }
                Ok(item)
            }
            Err(e) => {
                st.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    async fn add_item_guest(&self, product_id: &str, quantity: u32, size: Option<&str>) -> ClientResult<CartItem> {
        {
            let mut st = self.state.write();
            if let Some(idx) = st.position_of_line(product_id, size) {
                let merged = merged_quantity(st.items[idx].quantity, quantity)?;
                check_stock(merged, st.items[idx].product.stock_quantity)?;
                st.items[idx].quantity = merged;
                let item = st.items[idx].clone();
                st.error = None;
                self.persist_guest(&st);
                return Ok(item);
            }
        }

        let epoch = self.current_epoch();
        self.begin_loading();
        let detail = self
            .gateway
            .send_json::<Product>(ApiRequest::get(format!("/products/{}", segment(product_id))))
            .await;
        let mut st = self.state.write();
        st.is_loading = false;
        let product = match detail {
            Ok(p) => p,
            Err(e) => {
                st.error = Some(e.user_message());
                return Err(e);
            }
        };
        if self.current_epoch() != epoch {
            return Err(ClientError::Cancelled);
        }

        // another add for the same line may have landed while the detail was loading
        if let Some(idx) = st.position_of_line(product_id, size) {
            let merged = merged_quantity(st.items[idx].quantity, quantity)?;
            check_stock(merged, product.stock_quantity)?;
            st.items[idx].quantity = merged;
            let item = st.items[idx].clone();
            self.persist_guest(&st);
            return Ok(item);
        }

        check_stock(quantity, product.stock_quantity)?;
        let item = CartItem {
            id: guest_item_id(),
            quantity,
            size: size.map(str::to_string),
            product: CartProduct {
                id: product.id,
                name: product.name,
                price: product.price,
                primary_photo_url: product.primary_photo_url,
                stock_quantity: product.stock_quantity,
            },
        };
        st.items.insert(0, item.clone());
        st.error = None;
        self.persist_guest(&st);
        Ok(item)
    }

    /// Authenticated: delete on the server first, then locally. Guest: local only.
    pub async fn remove_item(&self, cart_item_id: &str) -> ClientResult<()> {
        if self.session().is_authenticated() {
            self.begin_loading();
            let result = self
                .gateway
                .send(ApiRequest::delete(format!("{}/{}", CART_PATH, segment(cart_item_id))))
                .await;
            let mut st = self.state.write();
            st.is_loading = false;
            match result {
                Ok(_) => {
                    st.items.retain(|i| i.id != cart_item_id);
                    Ok(())
                }
                Err(e) => {
                    st.error = Some(e.user_message());
                    Err(e)
                }
            }
        } else {
            let mut st = self.state.write();
            st.items.retain(|i| i.id != cart_item_id);
            self.persist_guest(&st);
            Ok(())
        }
    }

    /// Optimistic: the new quantity shows immediately. For logged-in users a backend
    /// rejection restores the item as it was before this call and returns the error.
    pub async fn update_item_quantity(&self, cart_item_id: &str, new_quantity: u32) -> ClientResult<()> {
        check_quantity(new_quantity)?;
        let original = {
            let mut st = self.state.write();
            let Some(idx) = st.items.iter().position(|i| i.id == cart_item_id) else {
                debug!(target: "velovis::cart", "quantity update for unknown line id={}", cart_item_id);
                return Ok(());
            };
            let original = st.items[idx].clone();
            if !self.session().is_authenticated() {
                check_stock(new_quantity, original.product.stock_quantity)?;
            }
            st.items[idx].quantity = new_quantity;
            original
        };

        if !self.session().is_authenticated() {
            let st = self.state.read();
            self.persist_guest(&st);
            return Ok(());
        }

        let epoch = self.current_epoch();
        let req = ApiRequest::patch(format!("{}/{}", CART_PATH, segment(cart_item_id))).json(&QuantityPatch { quantity: new_quantity })?;
        let result = self.gateway.send_json::<CartItem>(req).await;
        let mut st = self.state.write();
        if self.current_epoch() != epoch {
            return result.map(|_| ());
        }
        match result {
            Ok(updated) => {
                if let Some(slot) = st.items.iter_mut().find(|i| i.id == cart_item_id) {
                    *slot = updated;
                }
                Ok(())
            }
            Err(e) => {
                if let Some(slot) = st.items.iter_mut().find(|i| i.id == cart_item_id) {
                    *slot = original;
                }
                st.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Empty the local list. Responses still in flight will not repopulate it.
    pub fn clear_client_cart(&self) {
        self.bump_epoch();
        let mut st = self.state.write();
        st.items.clear();
        st.error = None;
        st.is_loading = false;
        if !self.session().is_authenticated() {
            self.persist_guest(&st);
        }
    }

    /// React to a login or logout.
    pub async fn handle_session_change(&self, ev: SessionChanged) {
        match ev.to {
            AuthState::Authenticated => {
                self.bump_epoch();
                let guest_lines = {
                    let mut st = self.state.write();
                    st.error = None;
                    std::mem::take(&mut st.items)
                };
                if let Err(e) = self.storage.remove(CART_STORAGE_KEY) {
                    warn!(target: "velovis::cart", "cannot clear guest cart storage: {}", e);
                }
                let guest_lines: Vec<CartItem> = guest_lines.into_iter().filter(CartItem::is_guest).collect();
                if ev.from == AuthState::Anonymous && !guest_lines.is_empty() {
                    match self.policy {
                        GuestCartPolicy::Discard => {
                            info!(target: "velovis::cart", "login replaces guest cart; dropped lines={}", guest_lines.len());
                            *self.discarded.write() = guest_lines;
                        }
                        GuestCartPolicy::Migrate => self.migrate_guest_lines(&guest_lines).await,
                    }
                }
                if let Err(e) = self.fetch_cart().await {
                    warn!(target: "velovis::cart", "cart fetch after login failed: {}", e);
                }
            }
            AuthState::Anonymous => self.clear_client_cart(),
        }
    }

    /// Lines are posted concurrently; one rejected line does not stop the others.
    async fn migrate_guest_lines(&self, lines: &[CartItem]) {
        let posts = lines.iter().map(|line| async move {
            let body = AddCartItem { product_id: &line.product.id, quantity: line.quantity, size: line.size.as_deref() };
            let req = ApiRequest::post(CART_PATH).json(&body)?;
            self.gateway.send(req).await?;
            Ok::<(), ClientError>(())
        });
        let results = join_all(posts).await;
        let mut moved = 0usize;
        for (line, sent) in lines.iter().zip(results) {
            match sent {
                Ok(()) => moved += 1,
                Err(e) => warn!(target: "velovis::cart", "guest line product={} not migrated: {}", line.product.id, e),
            }
        }
        info!(target: "velovis::cart", "migrated guest lines={}/{}", moved, lines.len());
    }

    /// Bring local state in line with the session after missed events.
    pub async fn resync(&self) {
        if self.session().is_authenticated() {
            if let Err(e) = self.fetch_cart().await {
                warn!(target: "velovis::cart", "cart resync failed: {}", e);
            }
        } else {
            self.clear_client_cart();
        }
    }

    /// Subscribe to session transitions. The task ends when the session manager
    /// is dropped or this synchronizer is.
    pub fn attach(self: &Arc<Self>, mut events: broadcast::Receiver<SessionChanged>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let next = events.recv().await;
                let Some(this) = weak.upgrade() else { break; };
                match next {
                    Ok(ev) => this.handle_session_change(ev).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(target: "velovis::cart", "missed {} session events; resyncing", missed);
                        this.resync().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(target: "velovis::cart", "session listener stopped");
        })
    }

    fn begin_loading(&self) {
        let mut st = self.state.write();
        st.is_loading = true;
        st.error = None;
    }

    fn persist_guest(&self, st: &CartState) {
        let doc = PersistedCart { items: st.items.clone() };
        if let Err(e) = save_typed(self.storage.as_ref(), CART_STORAGE_KEY, &doc) {
            warn!(target: "velovis::cart", "cannot persist guest cart: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "cart_tests.rs"]
mod cart_tests;
