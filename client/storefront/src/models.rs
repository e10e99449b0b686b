//! Domain records and the wire shapes of every backend endpoint.
//!
//! The PHP backend is loose about types (prices arrive as `"499.00"` or
//! `499`, ids sometimes as strings), so catalog rows are first read into
//! [`RawProject`] and normalised into [`Project`].

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::{StorefrontError, ValidationError};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid email pattern")
});

// ─────────────────────────────────────────────────────────
// Project
// ─────────────────────────────────────────────────────────

/// A purchasable academic project as held by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Non-negative; `0.0` means free.
    pub price: f64,
    pub discounted_price: Option<f64>,
    /// Comma-separated category names, exactly as the backend stores them.
    pub category: String,
    pub created_at: Option<String>,
    /// Opaque file reference under the uploads directory.
    pub documentation: Option<String>,
    /// Opaque file reference under the uploads directory.
    pub code_files: Option<String>,
}

impl Project {
    /// Split the category field into trimmed, non-empty names.
    pub fn categories(&self) -> Vec<&str> {
        self.category
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    }

    pub fn has_category(&self, name: &str) -> bool {
        self.categories().iter().any(|c| *c == name)
    }

    /// The amount actually charged: the discounted price when one is set.
    pub fn effective_price(&self) -> f64 {
        self.discounted_price.unwrap_or(self.price)
    }

    pub fn is_free(&self) -> bool {
        self.effective_price() <= 0.0
    }

    pub fn difficulty(&self) -> Difficulty {
        Difficulty::from_price(self.price)
    }
}

/// A catalog row as returned by `projects.php`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProject {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub discounted_price: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub code_files: Option<String>,
}

impl From<RawProject> for Project {
    fn from(raw: RawProject) -> Self {
        Project {
            id: number_from_value(&raw.id).map(|n| n as i64).unwrap_or(0),
            title: non_blank(raw.title).unwrap_or_else(|| "Untitled Project".to_string()),
            description: non_blank(raw.description)
                .unwrap_or_else(|| "No description available".to_string()),
            price: raw.price.unwrap_or(0.0).max(0.0),
            discounted_price: raw.discounted_price.filter(|p| *p > 0.0),
            category: non_blank(raw.category).unwrap_or_else(|| "Uncategorized".to_string()),
            created_at: non_blank(raw.created_at),
            documentation: non_blank(raw.documentation),
            code_files: non_blank(raw.code_files),
        }
    }
}

/// Coarse difficulty bucket, derived from the list price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn from_price(price: f64) -> Self {
        if price < 1000.0 {
            Self::Beginner
        } else if price < 3000.0 {
            Self::Intermediate
        } else {
            Self::Advanced
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

// ─────────────────────────────────────────────────────────
// Customer / purchase state
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl CustomerInfo {
    /// Check the contact details in the order the checkout form reports them.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::MissingEmail);
        }
        if self.phone.trim().is_empty() {
            return Err(ValidationError::MissingPhone);
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::InvalidEmail);
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.email.trim().is_empty()
            && !self.phone.trim().is_empty()
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Success,
    Failed,
}

impl PurchaseStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

// ─────────────────────────────────────────────────────────
// Endpoint shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CatalogResponse {
    pub status: String,
    #[serde(default)]
    pub data: Vec<RawProject>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    pub pages: u32,
}

/// `page`/`limit` query parameters for `projects.php`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub project_id: i64,
    pub project_title: String,
    pub amount: f64,
    #[serde(flatten)]
    pub customer: CustomerInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub order_id: Option<String>,
    /// Minor currency units, as the gateway expects them.
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub key_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub download_page: Option<String>,
    #[serde(default)]
    pub email_sent: Option<bool>,
}

/// Fields handed back by the payment widget once the customer pays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyPaymentRequest {
    #[serde(flatten)]
    pub payment: GatewayPayment,
    #[serde(flatten)]
    pub customer: CustomerInfo,
    pub project_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyPaymentResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub email_sent: Option<bool>,
    #[serde(default)]
    pub download_link: Option<String>,
    #[serde(default)]
    pub download_page: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendOtpRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendOtpResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub server_time: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpRequest<'a> {
    pub email: &'a str,
    pub otp: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyOtpResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

// ─────────────────────────────────────────────────────────
// Timestamps
// ─────────────────────────────────────────────────────────

/// Parse a backend timestamp. Accepts RFC 3339 as well as the MySQL
/// `YYYY-MM-DD HH:MM:SS` and bare `YYYY-MM-DD` forms (read as UTC).
pub fn parse_timestamp(raw: &str) -> crate::errors::Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| StorefrontError::Timestamp(raw.to_string()))
}

// ─────────────────────────────────────────────────────────
// Lenient decoding helpers
// ─────────────────────────────────────────────────────────

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
