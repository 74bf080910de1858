//! The outbound e-mail capability.
//!
//! Transports are injected at the composition root. A real transport owns
//! one refreshable OAuth credential; implementations must serialize its
//! refresh (single-flight) across concurrent sends and persist the
//! refreshed credential. The in-repo transports carry no credential.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};

use shiftledger_core::error::ShiftledgerError;

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// OTP body carries the 6-digit code and its 15-minute expiry.
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), ShiftledgerError>;

    async fn send_password_reset_code(&self, to: &str, code: &str)
        -> Result<(), ShiftledgerError>;

    /// Invitation mail; the signed `password_setup` token is appended to
    /// the client's set-password URL.
    async fn send_password_setup(&self, to: &str, token: &str) -> Result<(), ShiftledgerError>;

    async fn send_leave_update(
        &self,
        to: &str,
        approved: bool,
        comment: Option<&str>,
    ) -> Result<(), ShiftledgerError>;
}

/// Development transport: logs instead of sending.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), ShiftledgerError> {
        info!(to, "verification code issued");
        debug!(to, code, "verification code");
        Ok(())
    }

    async fn send_password_reset_code(
        &self,
        to: &str,
        code: &str,
    ) -> Result<(), ShiftledgerError> {
        info!(to, "password reset code issued");
        debug!(to, code, "password reset code");
        Ok(())
    }

    async fn send_password_setup(&self, to: &str, token: &str) -> Result<(), ShiftledgerError> {
        info!(to, "password setup invitation issued");
        debug!(to, token, "password setup token");
        Ok(())
    }

    async fn send_leave_update(
        &self,
        to: &str,
        approved: bool,
        _comment: Option<&str>,
    ) -> Result<(), ShiftledgerError> {
        info!(to, approved, "leave decision notification");
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CapturedEmail {
    Verification { to: String, code: String },
    PasswordReset { to: String, code: String },
    PasswordSetup { to: String, token: String },
    LeaveUpdate { to: String, approved: bool },
}

/// Test transport that records every message.
#[derive(Default)]
pub struct CapturingEmailSender {
    pub sent: Mutex<Vec<CapturedEmail>>,
    /// When set, every send fails (for clear-on-failure tests).
    pub fail: Mutex<bool>,
}

impl CapturingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<CapturedEmail> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    fn record(&self, email: CapturedEmail) -> Result<(), ShiftledgerError> {
        if *self.fail.lock().unwrap() {
            return Err(ShiftledgerError::EmailSendFailed("transport down".to_string()));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

#[async_trait]
impl EmailSender for CapturingEmailSender {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), ShiftledgerError> {
        self.record(CapturedEmail::Verification {
            to: to.to_string(),
            code: code.to_string(),
        })
    }

    async fn send_password_reset_code(
        &self,
        to: &str,
        code: &str,
    ) -> Result<(), ShiftledgerError> {
        self.record(CapturedEmail::PasswordReset {
            to: to.to_string(),
            code: code.to_string(),
        })
    }

    async fn send_password_setup(&self, to: &str, token: &str) -> Result<(), ShiftledgerError> {
        self.record(CapturedEmail::PasswordSetup {
            to: to.to_string(),
            token: token.to_string(),
        })
    }

    async fn send_leave_update(
        &self,
        to: &str,
        approved: bool,
        _comment: Option<&str>,
    ) -> Result<(), ShiftledgerError> {
        self.record(CapturedEmail::LeaveUpdate {
            to: to.to_string(),
            approved,
        })
    }
}
