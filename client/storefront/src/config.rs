//! Application configuration loaded from environment variables.

use std::str::FromStr;

use crate::errors::{Result, StorefrontError};

const DEFAULT_API_BASE_URL: &str = "https://academicprojects.org/api";
const DEFAULT_CHECKOUT_SCRIPT_URL: &str = "https://checkout.razorpay.com/v1/checkout.js";

/// How a free project reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeDelivery {
    /// The backend registers the order and emails the files.
    Email,
    /// The client downloads the files itself; no order is created.
    Direct,
}

impl FromStr for FreeDelivery {
    type Err = StorefrontError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "direct" => Ok(Self::Direct),
            other => Err(StorefrontError::Config(format!(
                "Invalid FREE_DELIVERY: {other} (expected `email` or `direct`)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the PHP API (e.g. https://academicprojects.org/api)
    pub api_base_url: String,
    /// Where documentation and source bundles are served from
    pub uploads_base_url: String,
    /// Prefix used when rendering non-free prices
    pub currency_symbol: String,
    /// Require an OTP-verified email before paid purchases
    pub otp_required: bool,
    pub free_delivery: FreeDelivery,
    /// Projects per catalog page
    pub page_size: u32,
    /// Timeout applied to every outbound HTTP request
    pub request_timeout_secs: u64,
    /// Merchant name shown inside the payment widget
    pub merchant_name: String,
    pub theme_color: String,
    /// Script the payment widget is loaded from
    pub checkout_script_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_base_url = env_var("API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Config {
            uploads_base_url: env_var("UPLOADS_BASE_URL")
                .unwrap_or_else(|_| format!("{api_base_url}/uploads"))
                .trim_end_matches('/')
                .to_string(),
            api_base_url,
            currency_symbol: env_var("CURRENCY_SYMBOL").unwrap_or_else(|_| "₹".to_string()),
            otp_required: parse_bool(
                "OTP_REQUIRED",
                &env_var("OTP_REQUIRED").unwrap_or_else(|_| "false".to_string()),
            )?,
            free_delivery: env_var("FREE_DELIVERY")
                .unwrap_or_else(|_| "email".to_string())
                .parse()?,
            page_size: env_var("PAGE_SIZE")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .map_err(|_| StorefrontError::Config("Invalid PAGE_SIZE".to_string()))?,
            request_timeout_secs: env_var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| StorefrontError::Config("Invalid REQUEST_TIMEOUT_SECS".to_string()))?,
            merchant_name: env_var("MERCHANT_NAME")
                .unwrap_or_else(|_| "Academic Projects".to_string()),
            theme_color: env_var("THEME_COLOR").unwrap_or_else(|_| "#667eea".to_string()),
            checkout_script_url: env_var("CHECKOUT_SCRIPT_URL")
                .unwrap_or_else(|_| DEFAULT_CHECKOUT_SCRIPT_URL.to_string()),
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| StorefrontError::Config(format!("Missing env var: {key}")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(StorefrontError::Config(format!("Invalid {key}"))),
    }
}
