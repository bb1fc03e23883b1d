//!
//! velovis api services
//! --------------------
//! Typed wrappers over the backend endpoints. Each service borrows the shared
//! `RequestGateway`, so every call gets bearer attachment and the refresh-once
//! protocol for free. Payload shapes follow the backend; fields the client does
//! not interpret are kept as raw JSON.

use std::sync::Arc;

use crate::gateway::RequestGateway;

pub mod admin;
pub mod auth;
pub mod catalog;
pub(crate) mod money;
pub mod orders;
pub mod payment;

pub use admin::{AdminApi, AdminUser, Role};
pub use auth::{AuthApi, Registration};
pub use catalog::{slugify, CatalogApi, Category, Comment, Product, ProductInput};
pub use orders::{Order, OrderStatus, OrdersApi};
pub use payment::{PaymentApi, PaymentSession, ShippingAddress};

pub(crate) type Gateway = Arc<RequestGateway>;
