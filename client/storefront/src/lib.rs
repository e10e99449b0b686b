//! Academic projects storefront client.
//!
//! Browses the remote project catalog and runs the checkout flow against
//! the storefront's PHP API. Free projects are registered (or downloaded
//! directly); paid projects go through order creation, a payment gateway,
//! and server-side verification of the gateway's signed result.
//!
//! The payment gateway is injected through [`gateway::PaymentGateway`], so
//! the checkout can run against any widget, or a fake one in tests.

pub mod api;
pub mod catalog;
pub mod config;
pub mod downloads;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod otp;
pub mod purchase;
pub mod router;

#[cfg(test)]
mod testing;

pub use api::{Backend, HttpBackend};
pub use catalog::{CatalogFilter, CatalogStore};
pub use config::Config;
pub use errors::{Result, StorefrontError};
pub use gateway::{LazyGateway, PaymentGateway};
pub use purchase::{PurchaseOptions, PurchaseOrchestrator};
pub use router::{Router, View};
