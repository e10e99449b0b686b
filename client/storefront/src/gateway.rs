//! Payment gateway seam.
//!
//! The checkout widget is a third-party component: the orchestrator only
//! hands it a [`GatewayOptions`] and waits for one [`GatewayOutcome`].
//! Implementations are injected, never looked up globally.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::errors::{Result, StorefrontError};
use crate::models::GatewayPayment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prefill {
    pub name: String,
    pub email: String,
    pub contact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub color: String,
}

/// Everything the widget needs to take one payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayOptions {
    /// Public key id issued by the backend for this order.
    pub key: String,
    /// Minor currency units.
    pub amount: u64,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub order_id: String,
    pub prefill: Prefill,
    pub theme: Theme,
}

/// How the customer left the widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// Payment captured; the signed fields still have to be verified.
    Completed(GatewayPayment),
    /// Closed without paying.
    Dismissed,
    /// The gateway reported a failed payment.
    Failed { description: Option<String> },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Show the widget and resolve once the customer pays, gives up, or fails.
    async fn open(&self, options: GatewayOptions) -> Result<GatewayOutcome>;
}

/// Produces the concrete gateway, e.g. after fetching its script.
#[async_trait]
pub trait GatewayLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn PaymentGateway>>;
}

/// Loads the real gateway on first use and reuses it afterwards.
/// A failed load is not cached, so the next purchase tries again.
pub struct LazyGateway {
    loader: Box<dyn GatewayLoader>,
    loaded: OnceCell<Arc<dyn PaymentGateway>>,
}

impl LazyGateway {
    pub fn new(loader: impl GatewayLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            loaded: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }
}

#[async_trait]
impl PaymentGateway for LazyGateway {
    async fn open(&self, options: GatewayOptions) -> Result<GatewayOutcome> {
        let gateway = self
            .loaded
            .get_or_try_init(|| async {
                info!("Loading payment gateway");
                self.loader.load().await
            })
            .await
            .map_err(|e| {
                warn!("Payment gateway failed to load: {e}");
                StorefrontError::Gateway("Payment SDK failed to load".to_string())
            })?;

        gateway.open(options).await
    }
}
