//! Backend API client — the PHP endpoints the storefront talks to.
//!
//! Every call is a single round trip. Nothing here retries; the caller
//! decides whether to offer the customer a manual retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::{Result, StorefrontError};
use crate::models::{
    CatalogResponse, OrderRequest, OrderResponse, PageRequest, SendOtpRequest, SendOtpResponse,
    VerifyOtpRequest, VerifyOtpResponse, VerifyPaymentRequest, VerifyPaymentResponse,
};

/// The remote operations the catalog and the checkout depend on.
///
/// Response bodies are returned as-is; interpreting `success: false` or
/// `status: "error"` is left to the caller.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_projects(&self, page: Option<PageRequest>) -> Result<CatalogResponse>;

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderResponse>;

    async fn verify_payment(&self, request: &VerifyPaymentRequest)
        -> Result<VerifyPaymentResponse>;

    async fn send_otp(&self, email: &str) -> Result<SendOtpResponse>;

    async fn verify_otp(&self, email: &str, otp: &str) -> Result<VerifyOtpResponse>;
}

/// [`Backend`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build a client with the given request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::new(client, base_url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, script: &str) -> String {
        format!("{}/{script}", self.base_url)
    }

    async fn post_json<B, T>(&self, script: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(script);
        debug!("POST {url}");
        let resp = self.client.post(&url).json(body).send().await?;
        decode_body(resp).await
    }
}

/// The PHP scripts answer business failures with a JSON body and a 4xx/5xx
/// status, so the body is decoded whenever it parses. Only an unparseable
/// body on a non-success status is reported as a status error.
async fn decode_body<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let text = resp.text().await?;

    match serde_json::from_str::<T>(&text) {
        Ok(body) => Ok(body),
        Err(e) if status.is_success() => Err(StorefrontError::Json(e)),
        Err(_) => {
            warn!("Backend returned {status} with an unreadable body");
            Err(StorefrontError::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_projects(&self, page: Option<PageRequest>) -> Result<CatalogResponse> {
        let url = self.endpoint("projects.php");
        let mut request = self.client.get(&url);
        if let Some(p) = page {
            request = request.query(&[("page", p.page), ("limit", p.limit)]);
        }

        debug!("GET {url} (page={:?})", page);
        let resp = request.send().await?;
        decode_body(resp).await
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderResponse> {
        self.post_json("create-order.php", request).await
    }

    async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse> {
        self.post_json("verify-payment.php", request).await
    }

    async fn send_otp(&self, email: &str) -> Result<SendOtpResponse> {
        self.post_json("send-otp.php", &SendOtpRequest { email }).await
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> Result<VerifyOtpResponse> {
        self.post_json("verify-otp.php", &VerifyOtpRequest { email, otp }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let backend = HttpBackend::new(Client::new(), "https://example.org/api/");
        assert_eq!(backend.base_url(), "https://example.org/api");
        assert_eq!(
            backend.endpoint("create-order.php"),
            "https://example.org/api/create-order.php"
        );
    }
}
