//! One-time-passcode state for email verification.
//!
//! The countdown is computed from the server's own `expires_at` and
//! `server_time`, so a skewed local clock does not shorten or stretch it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::ValidationError;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OtpState {
    pub sent: bool,
    pub verified: bool,
    /// Code as typed by the customer.
    pub code: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining_secs: u64,
    pub expired: bool,
}

impl OtpState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Start a fresh countdown for a code the server just issued.
    pub fn arm(&mut self, expires_at: DateTime<Utc>, server_time: DateTime<Utc>) {
        let remaining = (expires_at - server_time).num_seconds().max(0) as u64;
        self.sent = true;
        self.verified = false;
        self.code.clear();
        self.expires_at = Some(expires_at);
        self.remaining_secs = remaining;
        self.expired = remaining == 0;
    }

    /// Advance the countdown by one second. Returns `false` once there is
    /// nothing left to count.
    pub fn tick(&mut self) -> bool {
        if !self.is_counting() {
            return false;
        }
        self.remaining_secs -= 1;
        if self.remaining_secs == 0 {
            self.expired = true;
        }
        self.is_counting()
    }

    pub fn is_counting(&self) -> bool {
        self.sent && !self.verified && !self.expired && self.remaining_secs > 0
    }

    /// Whether a verification request may be issued right now.
    pub fn check_verifiable(&self) -> Result<(), ValidationError> {
        if !self.sent {
            return Err(ValidationError::OtpNotSent);
        }
        if self.expired {
            return Err(ValidationError::OtpExpired);
        }
        if self.code.trim().is_empty() {
            return Err(ValidationError::MissingOtp);
        }
        Ok(())
    }
}

/// Call `tick` once per second until it returns `false` or `cancel` fires.
pub async fn run_countdown<F>(mut tick: F, cancel: CancellationToken)
where
    F: FnMut() -> bool,
{
    let mut interval = interval_at(Instant::now() + TICK, TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("OTP countdown cancelled");
                break;
            }
            _ = interval.tick() => {
                if !tick() {
                    debug!("OTP countdown finished");
                    break;
                }
            }
        }
    }
}
