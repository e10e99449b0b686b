//! Terminal stand-in for the hosted checkout widget.
//!
//! The widget is loaded from the checkout script URL the same way a browser
//! would pull it in, then the customer completes payment on the hosted page
//! and pastes the returned payment id and signature back here.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use storefront::errors::Result;
use storefront::gateway::{GatewayLoader, GatewayOptions, GatewayOutcome, PaymentGateway};
use storefront::models::GatewayPayment;

/// Checks the checkout script is reachable before handing out the gateway.
pub struct ScriptLoader {
    pub client: Client,
    pub script_url: String,
}

#[async_trait]
impl GatewayLoader for ScriptLoader {
    async fn load(&self) -> Result<Arc<dyn PaymentGateway>> {
        debug!("Fetching checkout script from {}", self.script_url);
        self.client
            .get(&self.script_url)
            .send()
            .await?
            .error_for_status()?;
        Ok(Arc::new(TerminalGateway))
    }
}

pub struct TerminalGateway;

#[async_trait]
impl PaymentGateway for TerminalGateway {
    async fn open(&self, options: GatewayOptions) -> Result<GatewayOutcome> {
        println!();
        println!("── {} ──", options.name);
        println!("{}", options.description);
        println!(
            "Amount: {:.2} {}   Order: {}",
            options.amount as f64 / 100.0,
            options.currency,
            options.order_id
        );
        println!(
            "Key: {}   Paying as: {} <{}>",
            options.key, options.prefill.name, options.prefill.email
        );
        println!();

        let payment_id = prompt("Payment id (blank to cancel): ").await?;
        if payment_id.is_empty() {
            return Ok(GatewayOutcome::Dismissed);
        }
        if let Some(reason) = payment_id.strip_prefix("failed:") {
            return Ok(GatewayOutcome::Failed {
                description: Some(reason.trim().to_string()).filter(|r| !r.is_empty()),
            });
        }
        let signature = prompt("Signature: ").await?;

        Ok(GatewayOutcome::Completed(GatewayPayment {
            razorpay_order_id: options.order_id,
            razorpay_payment_id: payment_id,
            razorpay_signature: signature,
        }))
    }
}

/// Print `label` and read one trimmed line from stdin.
pub async fn prompt(label: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;

    // std's stdin is buffered process-wide, so consecutive prompts never
    // lose piped input.
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .map_err(|e| std::io::Error::other(e.to_string()))??;
    Ok(line.trim().to_string())
}
