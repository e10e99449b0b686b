//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    /// The backend answered, but reported a business failure.
    #[error("{0}")]
    Backend(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Timestamp parse error: {0}")]
    Timestamp(String),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Client-side validation failures. The `Display` text is shown to the
/// customer as-is, so no network call is ever made when one of these occurs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter your name")]
    MissingName,

    #[error("Please enter your email")]
    MissingEmail,

    #[error("Please enter your phone number")]
    MissingPhone,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Please verify your email with the OTP before purchasing")]
    EmailNotVerified,

    #[error("OTP is required for verification")]
    MissingOtp,

    #[error("Please request an OTP first")]
    OtpNotSent,

    #[error("OTP has expired. Please request a new code.")]
    OtpExpired,
}
