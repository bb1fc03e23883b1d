pub mod api;
pub mod cart;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod storage;
pub mod telemetry;

pub use client::{StorefrontClient, StorefrontClientBuilder};
pub use error::{ClientError, ClientResult};
