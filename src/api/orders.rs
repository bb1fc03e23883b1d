use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::Gateway;
use crate::error::{ClientError, ClientResult};
use crate::gateway::{segment, ApiRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
            OrderStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Customers may cancel until the parcel leaves.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Paid)
    }

    /// The admin console offers a refund only for paid or cancelled orders.
    pub fn is_refundable(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    #[serde(default, deserialize_with = "super::money::opt_number_or_string")]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Items, shipping contact and anything else the backend returns.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GuestOrderRef<'a> {
    order_id: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct StatusPatch {
    status: OrderStatus,
}

pub struct OrdersApi {
    gateway: Gateway,
}

fn guest_ref<'a>(order_id: &'a str, email: &'a str) -> ClientResult<GuestOrderRef<'a>> {
    if order_id.trim().is_empty() || !email.contains('@') {
        return Err(ClientError::invalid("order id and a valid e-mail are required"));
    }
    Ok(GuestOrderRef { order_id: order_id.trim(), email: email.trim() })
}

impl OrdersApi {
    pub fn new(gateway: Gateway) -> Self { Self { gateway } }

    /// Orders of the logged-in user.
    pub async fn my_orders(&self) -> ClientResult<Vec<Order>> {
        self.gateway.send_json(ApiRequest::get("/orders")).await
    }

    pub async fn cancel(&self, order_id: &str) -> ClientResult<()> {
        self.gateway.send(ApiRequest::patch(format!("/orders/{}/cancel", segment(order_id)))).await?;
        info!(target: "velovis::api", "order cancelled id={}", order_id);
        Ok(())
    }

    pub async fn admin_list(&self) -> ClientResult<Vec<Order>> {
        self.gateway.send_json(ApiRequest::get("/orders/admin/all")).await
    }

    pub async fn admin_set_status(&self, order_id: &str, status: OrderStatus) -> ClientResult<()> {
        if status == OrderStatus::Unknown {
            return Err(ClientError::invalid("cannot set an unknown order status"));
        }
        let req = ApiRequest::patch(format!("/orders/{}", segment(order_id))).json(&StatusPatch { status })?;
        self.gateway.send(req).await?;
        Ok(())
    }

    pub async fn admin_refund(&self, order_id: &str) -> ClientResult<()> {
        self.gateway.send(ApiRequest::post(format!("/orders/{}/refund", segment(order_id)))).await?;
        info!(target: "velovis::api", "order refunded id={}", order_id);
        Ok(())
    }

    /// Guest lookup by order id and e-mail. Sent without credentials.
    pub async fn track(&self, order_id: &str, email: &str) -> ClientResult<Order> {
        let req = ApiRequest::post("/orders/track").anonymous().json(&guest_ref(order_id, email)?)?;
        self.gateway.send_json(req).await
    }

    pub async fn guest_cancel(&self, order_id: &str, email: &str) -> ClientResult<()> {
        let req = ApiRequest::post("/orders/guest-cancel").anonymous().json(&guest_ref(order_id, email)?)?;
        self.gateway.send(req).await?;
        Ok(())
    }
}
