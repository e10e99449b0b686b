//! Purchase orchestrator — drives one checkout at a time:
//! contact details → (optional) email OTP → order creation → payment widget
//! → payment verification.
//!
//! ## Attempts
//!
//! Every network round trip and the widget callback complete at an
//! arbitrary later time. Opening or closing a project and starting a new
//! purchase each bump an attempt id; a result is applied only while its
//! attempt is still the current one, otherwise it is logged and dropped.
//!
//! The orchestrator is cheap to clone; clones share the same session, so a
//! UI can close the detail view while a purchase is still awaiting.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::Backend;
use crate::config::{Config, FreeDelivery};
use crate::downloads::{self, DownloadLink};
use crate::errors::{StorefrontError, ValidationError};
use crate::gateway::{GatewayOptions, GatewayOutcome, PaymentGateway, Prefill, Theme};
use crate::models::{
    parse_timestamp, CustomerInfo, OrderRequest, OrderResponse, Project, PurchaseStatus,
    VerifyPaymentRequest,
};
use crate::otp::{self, OtpState};

const DEFAULT_CURRENCY: &str = "INR";

/// Per-deployment knobs the orchestrator needs.
#[derive(Debug, Clone)]
pub struct PurchaseOptions {
    pub otp_required: bool,
    pub free_delivery: FreeDelivery,
    pub uploads_base_url: String,
    pub merchant_name: String,
    pub theme_color: String,
    pub currency_symbol: String,
}

impl Default for PurchaseOptions {
    fn default() -> Self {
        Self {
            otp_required: false,
            free_delivery: FreeDelivery::Email,
            uploads_base_url: "https://academicprojects.org/api/uploads".to_string(),
            merchant_name: "Academic Projects".to_string(),
            theme_color: "#667eea".to_string(),
            currency_symbol: "₹".to_string(),
        }
    }
}

impl From<&Config> for PurchaseOptions {
    fn from(config: &Config) -> Self {
        Self {
            otp_required: config.otp_required,
            free_delivery: config.free_delivery,
            uploads_base_url: config.uploads_base_url.clone(),
            merchant_name: config.merchant_name.clone(),
            theme_color: config.theme_color.clone(),
            currency_symbol: config.currency_symbol.clone(),
        }
    }
}

/// Where the customer gets their files after a successful purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DownloadRef {
    /// A download page or link handed out by the backend.
    Link(String),
    /// Files the client fetches itself.
    Files(Vec<DownloadLink>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseState {
    pub status: PurchaseStatus,
    pub message: String,
    pub download: Option<DownloadRef>,
}

impl Default for PurchaseState {
    fn default() -> Self {
        Self {
            status: PurchaseStatus::Pending,
            message: String::new(),
            download: None,
        }
    }
}

/// Read-only snapshot for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseView {
    pub project: Option<Project>,
    pub state: PurchaseState,
    pub customer: CustomerInfo,
    pub show_customer_form: bool,
    pub otp: OtpState,
    pub sending_otp: bool,
    pub verifying_otp: bool,
    pub in_flight: bool,
    pub can_proceed: bool,
}

#[derive(Default)]
struct Session {
    project: Option<Project>,
    customer: CustomerInfo,
    show_customer_form: bool,
    state: PurchaseState,
    otp: OtpState,
    sending_otp: bool,
    verifying_otp: bool,
    in_flight: bool,
    /// Bumped on open/close; guards OTP round trips.
    epoch: u64,
    /// Bumped on open/close and on every purchase start.
    attempt: u64,
    countdown: Option<CancellationToken>,
}

impl Session {
    fn restart(&mut self, project: Option<Project>) {
        self.stop_countdown();
        *self = Session {
            project,
            epoch: self.epoch + 1,
            attempt: self.attempt + 1,
            ..Session::default()
        };
    }

    fn stop_countdown(&mut self) {
        if let Some(token) = self.countdown.take() {
            token.cancel();
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.state.status = PurchaseStatus::Failed;
        self.state.message = message.into();
    }

    fn succeed(&mut self, message: impl Into<String>, download: Option<DownloadRef>) {
        self.state.status = PurchaseStatus::Success;
        self.state.message = message.into();
        self.state.download = download;
    }

    fn reject(&mut self, error: ValidationError) {
        debug!("Rejected client-side: {error}");
        self.state.message = error.to_string();
    }

    fn can_proceed(&self, otp_required: bool) -> bool {
        self.customer.is_complete() && (self.otp.verified || !otp_required)
    }

    fn view(&self, otp_required: bool) -> PurchaseView {
        PurchaseView {
            project: self.project.clone(),
            state: self.state.clone(),
            customer: self.customer.clone(),
            show_customer_form: self.show_customer_form,
            otp: self.otp.clone(),
            sending_otp: self.sending_otp,
            verifying_otp: self.verifying_otp,
            in_flight: self.in_flight,
            can_proceed: self.can_proceed(otp_required),
        }
    }
}

/// Clears a busy flag when the owning future completes or is dropped, so
/// an abandoned call never leaves the session locked.
struct BusyGuard<'a> {
    session: &'a Mutex<Session>,
    id: u64,
    release: fn(&mut Session, u64),
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        (self.release)(&mut session, self.id);
    }
}

#[derive(Clone)]
pub struct PurchaseOrchestrator {
    backend: Arc<dyn Backend>,
    gateway: Arc<dyn PaymentGateway>,
    options: Arc<PurchaseOptions>,
    session: Arc<Mutex<Session>>,
}

impl PurchaseOrchestrator {
    pub fn new(
        backend: Arc<dyn Backend>,
        gateway: Arc<dyn PaymentGateway>,
        options: PurchaseOptions,
    ) -> Self {
        Self {
            backend,
            gateway,
            options: Arc::new(options),
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `apply` only if `attempt` is still current.
    fn apply_if_current(&self, attempt: u64, apply: impl FnOnce(&mut Session)) -> bool {
        let mut session = self.session();
        if session.attempt != attempt {
            debug!(
                "Discarding result of stale attempt {attempt} (current {})",
                session.attempt
            );
            return false;
        }
        apply(&mut session);
        true
    }

    fn busy(&self, id: u64, release: fn(&mut Session, u64)) -> BusyGuard<'_> {
        BusyGuard {
            session: &self.session,
            id,
            release,
        }
    }

    pub fn snapshot(&self) -> PurchaseView {
        self.session().view(self.options.otp_required)
    }

    pub fn options(&self) -> &PurchaseOptions {
        &self.options
    }

    // ─────────────────────────────────────────────────────
    // Detail view lifecycle
    // ─────────────────────────────────────────────────────

    /// Show `project`; any earlier flow is abandoned.
    pub fn open(&self, project: Project) -> PurchaseView {
        info!("Opening project {} ({})", project.id, project.title);
        let mut session = self.session();
        session.restart(Some(project));
        session.view(self.options.otp_required)
    }

    /// Dismiss the detail view, discarding contact details and OTP state.
    pub fn close(&self) -> PurchaseView {
        let mut session = self.session();
        if let Some(project) = &session.project {
            info!("Closing project {}", project.id);
        }
        session.restart(None);
        session.view(self.options.otp_required)
    }

    /// Replace the contact details. Changing the email invalidates any OTP
    /// issued for the previous one.
    pub fn set_customer_info(&self, info: CustomerInfo) -> PurchaseView {
        let mut session = self.session();
        if session.customer.email.trim() != info.email.trim() && session.otp.sent {
            debug!("Email changed; discarding OTP state");
            session.stop_countdown();
            session.otp.reset();
        }
        session.customer = info;
        session.view(self.options.otp_required)
    }

    pub fn set_otp_code(&self, code: impl Into<String>) -> PurchaseView {
        let mut session = self.session();
        session.otp.code = code.into();
        session.view(self.options.otp_required)
    }

    // ─────────────────────────────────────────────────────
    // Purchase
    // ─────────────────────────────────────────────────────

    /// The "purchase" action. For a paid project the first call only
    /// reveals the contact form; the next call starts the checkout.
    pub async fn purchase(&self) -> PurchaseView {
        let (attempt, project, customer) = {
            let mut session = self.session();
            let otp_required = self.options.otp_required;

            let Some(project) = session.project.clone() else {
                warn!("Purchase requested with no project selected");
                return session.view(otp_required);
            };
            if session.in_flight {
                debug!("Purchase already in flight for attempt {}", session.attempt);
                return session.view(otp_required);
            }

            session.state.message.clear();

            if !project.is_free() && !session.show_customer_form {
                session.show_customer_form = true;
                return session.view(otp_required);
            }
            if let Err(e) = session.customer.validate() {
                session.reject(e);
                return session.view(otp_required);
            }
            if !project.is_free() && otp_required && !session.otp.verified {
                session.reject(ValidationError::EmailNotVerified);
                return session.view(otp_required);
            }

            session.attempt += 1;
            session.in_flight = true;
            session.state = PurchaseState::default();
            (session.attempt, project, session.customer.clone())
        };

        let in_flight = self.busy(attempt, |s, attempt| {
            if s.attempt == attempt {
                s.in_flight = false;
            }
        });

        info!(
            "Purchase attempt {attempt} for project {} (amount {})",
            project.id,
            project.effective_price()
        );

        if project.is_free() {
            self.run_free(attempt, &project, &customer).await;
        } else {
            self.run_paid(attempt, &project, &customer).await;
        }

        drop(in_flight);
        self.snapshot()
    }

    /// "Try Again" after a terminal result: restart from order creation.
    pub async fn try_again(&self) -> PurchaseView {
        {
            let mut session = self.session();
            if session.in_flight {
                return session.view(self.options.otp_required);
            }
            session.state = PurchaseState::default();
        }
        self.purchase().await
    }

    async fn run_free(&self, attempt: u64, project: &Project, customer: &CustomerInfo) {
        if self.options.free_delivery == FreeDelivery::Direct {
            let links = downloads::links_for(project, &self.options.uploads_base_url);
            self.apply_if_current(attempt, |s| {
                if links.is_empty() {
                    s.fail("No downloadable files are attached to this project");
                } else {
                    s.succeed(
                        format!("Your download of {} is ready.", project.title),
                        Some(DownloadRef::Files(links)),
                    );
                }
            });
            return;
        }

        self.apply_if_current(attempt, |s| {
            s.state.message = "Processing your free project...".to_string();
        });

        let request = order_request(project, customer);
        match self.backend.create_order(&request).await {
            Ok(order) if order.success => {
                let message = if order.download_page.is_some() {
                    "Free project registered successfully! Check your email for download link."
                } else if order.email_sent == Some(true) {
                    "Free project registered successfully! Check your email for download instructions."
                } else {
                    "Free project registered successfully! Please check your email."
                };
                let download = order.download_page.map(DownloadRef::Link);
                self.apply_if_current(attempt, |s| s.succeed(message, download));
            }
            Ok(order) => {
                let message = order
                    .error
                    .unwrap_or_else(|| "Failed to process free project".to_string());
                warn!("Free order rejected: {message}");
                self.apply_if_current(attempt, |s| s.fail(message));
            }
            Err(e) => {
                error!("Free order request failed: {e}");
                self.apply_if_current(attempt, |s| {
                    s.fail("Failed to download project. Please contact support.")
                });
            }
        }
    }

    async fn run_paid(&self, attempt: u64, project: &Project, customer: &CustomerInfo) {
        if !self.apply_if_current(attempt, |s| {
            s.state.message = "Creating payment order...".to_string();
        }) {
            return;
        }

        let request = order_request(project, customer);
        let order = match self.backend.create_order(&request).await {
            Ok(order) if order.success => order,
            Ok(order) => {
                let reason = order
                    .error
                    .unwrap_or_else(|| "Failed to create order".to_string());
                warn!("Order creation rejected: {reason}");
                self.apply_if_current(attempt, |s| s.fail(format!("Payment failed: {reason}")));
                return;
            }
            Err(e) => {
                error!("Order creation request failed: {e}");
                self.apply_if_current(attempt, |s| {
                    s.fail("Payment failed: Could not reach the server. Please try again.")
                });
                return;
            }
        };

        let options = match self.gateway_options(&order, project, customer) {
            Some(options) => options,
            None => {
                error!("Order response is missing order_id or key_id");
                self.apply_if_current(attempt, |s| {
                    s.fail("Payment failed: Invalid order response from server")
                });
                return;
            }
        };

        if !self.apply_if_current(attempt, |s| {
            s.state.message = "Opening payment gateway...".to_string();
        }) {
            return;
        }

        info!("Opening gateway for order {}", options.order_id);
        let outcome = self.gateway.open(options).await;

        let payment = match outcome {
            Ok(GatewayOutcome::Completed(payment)) => payment,
            Ok(GatewayOutcome::Dismissed) => {
                info!("Gateway dismissed for attempt {attempt}");
                self.apply_if_current(attempt, |s| {
                    s.state.status = PurchaseStatus::Pending;
                    s.state.message.clear();
                });
                return;
            }
            Ok(GatewayOutcome::Failed { description }) => {
                let description = description.unwrap_or_else(|| "Please try again".to_string());
                warn!("Gateway reported payment failure: {description}");
                self.apply_if_current(attempt, |s| {
                    s.fail(format!("Payment failed: {description}"))
                });
                return;
            }
            Err(e) => {
                let reason = match e {
                    StorefrontError::Gateway(reason) => reason,
                    other => other.to_string(),
                };
                error!("Gateway error: {reason}");
                self.apply_if_current(attempt, |s| s.fail(format!("Payment failed: {reason}")));
                return;
            }
        };

        if !self.apply_if_current(attempt, |s| {
            s.state.message = "Verifying payment...".to_string();
        }) {
            return;
        }

        let request = VerifyPaymentRequest {
            payment,
            customer: customer.clone(),
            project_id: project.id,
        };
        match self.backend.verify_payment(&request).await {
            Ok(verdict) if verdict.success => {
                let message = if verdict.email_sent == Some(true) {
                    "Payment successful! Project files have been sent to your email."
                } else {
                    "Payment successful! You will receive an email with download link shortly."
                };
                let download = verdict
                    .download_link
                    .or(verdict.download_page)
                    .map(DownloadRef::Link);
                info!("Payment verified for attempt {attempt}");
                self.apply_if_current(attempt, |s| s.succeed(message, download));
            }
            Ok(verdict) => {
                let reason = verdict
                    .error
                    .unwrap_or_else(|| "Please contact support".to_string());
                warn!("Payment verification rejected: {reason}");
                self.apply_if_current(attempt, |s| {
                    s.fail(format!("Payment verification failed: {reason}"))
                });
            }
            Err(e) => {
                error!("Payment verification request failed: {e}");
                self.apply_if_current(attempt, |s| {
                    s.fail("Payment verification failed. Please contact support.")
                });
            }
        }
    }

    fn gateway_options(
        &self,
        order: &OrderResponse,
        project: &Project,
        customer: &CustomerInfo,
    ) -> Option<GatewayOptions> {
        let amount = order
            .amount
            .unwrap_or_else(|| project.effective_price() * 100.0)
            .round() as u64;

        Some(GatewayOptions {
            key: order.key_id.clone()?,
            amount,
            currency: order
                .currency
                .clone()
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            name: self.options.merchant_name.clone(),
            description: project.title.clone(),
            order_id: order.order_id.clone()?,
            prefill: Prefill {
                name: customer.name.clone(),
                email: customer.email.clone(),
                contact: customer.phone.clone(),
            },
            theme: Theme {
                color: self.options.theme_color.clone(),
            },
        })
    }

    // ─────────────────────────────────────────────────────
    // OTP
    // ─────────────────────────────────────────────────────

    /// Request a code for the current email. Any earlier code, verification
    /// and countdown are discarded first.
    pub async fn send_otp(&self) -> PurchaseView {
        let (epoch, email) = {
            let mut session = self.session();
            let email = session.customer.email.trim().to_string();
            if email.is_empty() || !email.contains('@') {
                session.reject(ValidationError::InvalidEmail);
                return session.view(self.options.otp_required);
            }
            if session.sending_otp {
                return session.view(self.options.otp_required);
            }
            session.stop_countdown();
            session.otp.reset();
            session.sending_otp = true;
            (session.epoch, email)
        };

        let sending = self.busy(epoch, |s, epoch| {
            if s.epoch == epoch {
                s.sending_otp = false;
            }
        });
        info!("Sending OTP to {email}");
        let result = self.backend.send_otp(&email).await;
        drop(sending);

        let mut session = self.session();
        if session.epoch != epoch {
            debug!("Discarding OTP send result for a closed session");
            return session.view(self.options.otp_required);
        }

        match result {
            Ok(body) if body.status == "success" => {
                let expires_at = body.expires_at.as_deref().map(parse_timestamp);
                let server_time = body
                    .server_time
                    .as_deref()
                    .map(parse_timestamp)
                    .unwrap_or_else(|| Ok(Utc::now()));
                match (expires_at, server_time) {
                    (Some(Ok(expires_at)), Ok(server_time)) => {
                        session.otp.arm(expires_at, server_time);
                        session.state.message = "OTP sent to your email".to_string();
                        debug!("OTP valid for {}s", session.otp.remaining_secs);
                        self.start_countdown(&mut session);
                    }
                    _ => {
                        warn!("send-otp response carried no usable expiry");
                        session.state.message = "Server error while sending OTP".to_string();
                    }
                }
            }
            Ok(body) => {
                session.state.message = body
                    .message
                    .unwrap_or_else(|| "Failed to send OTP".to_string());
            }
            Err(e) => {
                warn!("send-otp request failed: {e}");
                session.state.message = "Failed to send OTP".to_string();
            }
        }
        session.view(self.options.otp_required)
    }

    /// Check the entered code with the backend.
    pub async fn verify_otp(&self) -> PurchaseView {
        let (epoch, email, code) = {
            let mut session = self.session();
            if let Err(e) = session.otp.check_verifiable() {
                session.reject(e);
                return session.view(self.options.otp_required);
            }
            if session.verifying_otp {
                return session.view(self.options.otp_required);
            }
            session.verifying_otp = true;
            (
                session.epoch,
                session.customer.email.trim().to_string(),
                session.otp.code.trim().to_string(),
            )
        };

        let verifying = self.busy(epoch, |s, epoch| {
            if s.epoch == epoch {
                s.verifying_otp = false;
            }
        });
        let result = self.backend.verify_otp(&email, &code).await;
        drop(verifying);

        let mut session = self.session();
        if session.epoch != epoch {
            debug!("Discarding OTP verify result for a closed session");
            return session.view(self.options.otp_required);
        }

        match result {
            Ok(body) if body.status == "success" => {
                if session.otp.expired {
                    session.reject(ValidationError::OtpExpired);
                } else {
                    info!("OTP verified for {email}");
                    session.otp.verified = true;
                    session.stop_countdown();
                    session.state.message = "OTP verified successfully".to_string();
                }
            }
            Ok(body) => {
                session.state.message = body
                    .message
                    .unwrap_or_else(|| "Failed to verify OTP. Please try again.".to_string());
            }
            Err(e) => {
                warn!("verify-otp request failed: {e}");
                session.state.message = "Failed to verify OTP. Please try again.".to_string();
            }
        }
        session.view(self.options.otp_required)
    }

    pub fn reset_otp(&self) -> PurchaseView {
        let mut session = self.session();
        session.stop_countdown();
        session.otp.reset();
        session.view(self.options.otp_required)
    }

    /// Advance the OTP countdown by one second.
    pub fn tick_otp(&self) -> PurchaseView {
        let mut session = self.session();
        session.otp.tick();
        session.view(self.options.otp_required)
    }

    /// Restart the OTP countdown on a background task. [`send_otp`] already
    /// starts one when a code is issued; this returns `None` when there is
    /// nothing left to count. Must be called from within a tokio runtime.
    ///
    /// [`send_otp`]: Self::send_otp
    pub fn spawn_otp_countdown(&self) -> Option<JoinHandle<()>> {
        let mut session = self.session();
        if !session.otp.is_counting() {
            return None;
        }
        Some(self.start_countdown(&mut session))
    }

    /// Tick the countdown once per second until it expires, the code is
    /// verified, or the session moves on.
    fn start_countdown(&self, session: &mut Session) -> JoinHandle<()> {
        session.stop_countdown();
        let token = CancellationToken::new();
        session.countdown = Some(token.clone());
        let epoch = session.epoch;

        let shared = self.session.clone();
        tokio::spawn(otp::run_countdown(
            move || {
                let mut session = shared.lock().unwrap_or_else(PoisonError::into_inner);
                session.epoch == epoch && session.otp.tick()
            },
            token,
        ))
    }

    pub fn can_proceed(&self) -> bool {
        self.session().can_proceed(self.options.otp_required)
    }
}

fn order_request(project: &Project, customer: &CustomerInfo) -> OrderRequest {
    OrderRequest {
        project_id: project.id,
        project_title: project.title.clone(),
        amount: project.effective_price(),
        customer: customer.clone(),
    }
}
