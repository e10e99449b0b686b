//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::api::Backend;
use crate::errors::{Result, StorefrontError};
use crate::gateway::{GatewayOptions, GatewayOutcome, PaymentGateway};
use crate::models::{
    CatalogResponse, OrderRequest, OrderResponse, PageRequest, SendOtpResponse,
    VerifyOtpResponse, VerifyPaymentRequest, VerifyPaymentResponse,
};

fn next<T>(queue: &Mutex<VecDeque<Result<T>>>, endpoint: &str) -> Result<T> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| {
            Err(StorefrontError::Backend(format!(
                "no scripted {endpoint} response"
            )))
        })
}

/// Backend that replays queued responses and records every request.
#[derive(Default)]
pub struct FakeBackend {
    catalog: Mutex<VecDeque<Result<CatalogResponse>>>,
    orders: Mutex<VecDeque<Result<OrderResponse>>>,
    verifies: Mutex<VecDeque<Result<VerifyPaymentResponse>>>,
    send_otps: Mutex<VecDeque<Result<SendOtpResponse>>>,
    verify_otps: Mutex<VecDeque<Result<VerifyOtpResponse>>>,

    catalog_requests: Mutex<Vec<Option<PageRequest>>>,
    order_requests: Mutex<Vec<OrderRequest>>,
    verify_requests: Mutex<Vec<VerifyPaymentRequest>>,
    otp_requests: Mutex<Vec<String>>,
    otp_verify_requests: Mutex<Vec<(String, String)>>,
}

impl FakeBackend {
    pub fn push_catalog(&self, response: Result<CatalogResponse>) {
        self.catalog.lock().unwrap().push_back(response);
    }

    pub fn push_order(&self, response: Result<OrderResponse>) {
        self.orders.lock().unwrap().push_back(response);
    }

    pub fn push_verify(&self, response: Result<VerifyPaymentResponse>) {
        self.verifies.lock().unwrap().push_back(response);
    }

    pub fn push_send_otp(&self, response: Result<SendOtpResponse>) {
        self.send_otps.lock().unwrap().push_back(response);
    }

    pub fn push_verify_otp(&self, response: Result<VerifyOtpResponse>) {
        self.verify_otps.lock().unwrap().push_back(response);
    }

    pub fn catalog_requests(&self) -> Vec<Option<PageRequest>> {
        self.catalog_requests.lock().unwrap().clone()
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.order_requests.lock().unwrap().clone()
    }

    pub fn verifications(&self) -> Vec<VerifyPaymentRequest> {
        self.verify_requests.lock().unwrap().clone()
    }

    pub fn otp_verifications(&self) -> Vec<(String, String)> {
        self.otp_verify_requests.lock().unwrap().clone()
    }

    /// Total number of requests issued, across all endpoints.
    pub fn calls(&self) -> usize {
        self.catalog_requests.lock().unwrap().len()
            + self.order_requests.lock().unwrap().len()
            + self.verify_requests.lock().unwrap().len()
            + self.otp_requests.lock().unwrap().len()
            + self.otp_verify_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_projects(&self, page: Option<PageRequest>) -> Result<CatalogResponse> {
        self.catalog_requests.lock().unwrap().push(page);
        next(&self.catalog, "catalog")
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderResponse> {
        self.order_requests.lock().unwrap().push(request.clone());
        next(&self.orders, "create-order")
    }

    async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse> {
        self.verify_requests.lock().unwrap().push(request.clone());
        next(&self.verifies, "verify-payment")
    }

    async fn send_otp(&self, email: &str) -> Result<SendOtpResponse> {
        self.otp_requests.lock().unwrap().push(email.to_string());
        next(&self.send_otps, "send-otp")
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> Result<VerifyOtpResponse> {
        self.otp_verify_requests
            .lock()
            .unwrap()
            .push((email.to_string(), otp.to_string()));
        next(&self.verify_otps, "verify-otp")
    }
}

/// Gateway that returns queued outcomes, optionally parking inside `open`
/// until released.
pub struct ScriptedGateway {
    outcomes: Mutex<VecDeque<Result<GatewayOutcome>>>,
    opened: Mutex<Vec<GatewayOptions>>,
    opened_signal: Notify,
    hold: Option<Arc<Notify>>,
}

impl ScriptedGateway {
    pub fn new(outcomes: Vec<Result<GatewayOutcome>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            opened: Mutex::new(Vec::new()),
            opened_signal: Notify::new(),
            hold: None,
        }
    }

    pub fn holding(mut self, release: Arc<Notify>) -> Self {
        self.hold = Some(release);
        self
    }

    pub fn opened(&self) -> Vec<GatewayOptions> {
        self.opened.lock().unwrap().clone()
    }

    pub async fn wait_opened(&self) {
        self.opened_signal.notified().await;
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn open(&self, options: GatewayOptions) -> Result<GatewayOutcome> {
        self.opened.lock().unwrap().push(options);
        self.opened_signal.notify_one();
        if let Some(release) = &self.hold {
            release.notified().await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(GatewayOutcome::Dismissed))
    }
}
