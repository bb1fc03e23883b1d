use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix that marks locally generated ids; server ids never carry it.
pub const GUEST_ID_PREFIX: &str = "guest-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartProduct {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "crate::api::money::number_or_string")]
    pub price: f64,
    #[serde(default)]
    pub primary_photo_url: Option<String>,
    /// Known only when the line was built from a product detail fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub quantity: u32,
    #[serde(default)]
    pub size: Option<String>,
    pub product: CartProduct,
}

impl CartItem {
    pub fn is_guest(&self) -> bool {
        self.id.starts_with(GUEST_ID_PREFIX)
    }

    /// Two items are the same cart line when product and size both match.
    pub fn same_line(&self, product_id: &str, size: Option<&str>) -> bool {
        self.product.id == product_id && self.size.as_deref() == size
    }

    pub fn line_total(&self) -> f64 {
        self.product.price * f64::from(self.quantity)
    }
}

pub(crate) fn guest_item_id() -> String {
    let rand = Uuid::new_v4().simple().to_string();
    format!("{}{}-{}", GUEST_ID_PREFIX, Utc::now().timestamp_millis(), &rand[..8])
}

/// Observable cart state. Hosts get clones; only the synchronizer mutates it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    /// Display order; new lines go first.
    pub items: Vec<CartItem>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl CartState {
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn total_price(&self) -> f64 {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn find(&self, id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub(crate) fn position_of_line(&self, product_id: &str, size: Option<&str>) -> Option<usize> {
        self.items.iter().position(|i| i.same_line(product_id, size))
    }

    /// Replace the matching line (by id or by product+size) or put the item first.
    pub(crate) fn upsert(&mut self, item: CartItem) {
        let pos = self
            .items
            .iter()
            .position(|i| i.id == item.id || i.same_line(&item.product.id, item.size.as_deref()));
        match pos {
            Some(idx) => self.items[idx] = item,
            None => self.items.insert(0, item),
        }
    }
}

/// Keep the first occurrence of each (product, size) line.
pub(crate) fn dedupe_lines(items: Vec<CartItem>) -> Vec<CartItem> {
    let mut out: Vec<CartItem> = Vec::with_capacity(items.len());
    for item in items {
        if out.iter().any(|o| o.same_line(&item.product.id, item.size.as_deref())) {
            tracing::warn!(target: "velovis::cart", "dropping duplicate cart line id={} product={}", item.id, item.product.id);
            continue;
        }
        out.push(item);
    }
    out
}

/// On-disk shape of `cart-storage`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct PersistedCart {
    #[serde(default)]
    pub items: Vec<CartItem>,
}
