use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::Gateway;
use crate::cart::CartItem;
use crate::error::{ClientError, ClientResult};
use crate::gateway::ApiRequest;

const MIN_PHONE_LEN: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub contact_name: String,
    pub city: String,
    pub district: String,
    pub phone: String,
    pub address: String,
}

impl ShippingAddress {
    pub fn validate(&self) -> ClientResult<()> {
        let required = [
            ("contact name", &self.contact_name),
            ("city", &self.city),
            ("district", &self.district),
            ("address", &self.address),
        ];
        for (label, value) in required {
            if value.trim().is_empty() {
                return Err(ClientError::invalid(format!("{} is required", label)));
            }
        }
        if self.phone.trim().chars().count() < MIN_PHONE_LEN {
            return Err(ClientError::invalid("phone number is too short"));
        }
        Ok(())
    }
}

/// Provider checkout session. `checkout_form_content` is the embeddable form markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    #[serde(default)]
    pub checkout_form_content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize)]
struct InitializeBody<'a> {
    items: &'a [CartItem],
    address: &'a ShippingAddress,
    price: f64,
}

pub struct PaymentApi {
    gateway: Gateway,
}

impl PaymentApi {
    pub fn new(gateway: Gateway) -> Self { Self { gateway } }

    /// Start checkout for `items`. The price sent is the cart total.
    pub async fn initialize(&self, items: &[CartItem], address: &ShippingAddress) -> ClientResult<PaymentSession> {
        if items.is_empty() {
            return Err(ClientError::invalid("cart is empty"));
        }
        address.validate()?;
        let price: f64 = items.iter().map(CartItem::line_total).sum();
        let req = ApiRequest::post("/payment/initialize").json(&InitializeBody { items, address, price })?;
        let session: PaymentSession = self.gateway.send_json(req).await?;
        info!(target: "velovis::api", "payment initialized lines={} form={}", items.len(), session.checkout_form_content.is_some());
        Ok(session)
    }

    pub async fn start(&self) -> ClientResult<PaymentSession> {
        self.gateway.send_json(ApiRequest::post("/payment/start")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            contact_name: "Ayse Yilmaz".into(),
            city: "Izmir".into(),
            district: "Karsiyaka".into(),
            phone: "05321234567".into(),
            address: "Cumhuriyet Cad. 12".into(),
        }
    }

    #[test]
    fn complete_address_validates() {
        assert!(address().validate().is_ok());
    }

    #[test]
    fn short_phone_and_blank_fields_fail() {
        let mut a = address();
        a.phone = "123456789".into();
        assert!(a.validate().is_err());
        let mut a = address();
        a.district = "   ".into();
        assert!(a.validate().is_err());
    }

    #[test]
    fn address_serializes_camel_case() {
        let v = serde_json::to_value(address()).unwrap();
        assert_eq!(v["contactName"], "Ayse Yilmaz");
    }
}
