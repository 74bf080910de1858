//! Forgot-password OTP flow.
//!
//! Runs on an unauthenticated surface, so every outcome that could reveal
//! whether an account exists collapses to generic success, and the
//! user-not-found path burns a fixed delay to blunt timing probes.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tracing::{info, warn};

use shiftledger_core::clock::Clock;
use shiftledger_core::constants::{
    ENUMERATION_GUARD_DELAY_MS, OTP_MAX_ATTEMPTS, OTP_RESEND_COOLDOWN_SECONDS, OTP_TTL_MINUTES,
};
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::user::normalize_email;
use shiftledger_crypto::{
    generate_otp, hash_password, hash_pin, validate_password_strength, verify_pin,
};
use shiftledger_store::Store;

use crate::email::EmailSender;

pub struct PasswordResetService {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    email: Arc<dyn EmailSender>,
}

impl PasswordResetService {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>, email: Arc<dyn EmailSender>) -> Self {
        Self { store, clock, email }
    }

    /// Issue a reset code. Always reports success to the caller.
    pub async fn request_reset(&self, email: &str) -> Result<(), ShiftledgerError> {
        let normalized = normalize_email(email);
        let Some(user) = self.store.find_user_by_email_global(&normalized)? else {
            tokio::time::sleep(StdDuration::from_millis(ENUMERATION_GUARD_DELAY_MS)).await;
            return Ok(());
        };

        let _guard = self.store.locks.user_lock(&user.id).await;
        let now = self.clock.now();
        let mut user = self.store.require_user(&user.id)?;

        if let Some(last_sent) = user.last_password_reset_sent_at {
            if (now - last_sent).num_seconds() < OTP_RESEND_COOLDOWN_SECONDS {
                return Ok(());
            }
        }

        if user.password_reset_attempts >= OTP_MAX_ATTEMPTS {
            user.clear_reset_otp();
            self.store.put_user(&user)?;
            return Ok(());
        }

        let code = generate_otp();
        user.password_reset_otp_hash = Some(hash_pin(&code)?);
        user.password_reset_otp_expires_at = Some(now + Duration::minutes(OTP_TTL_MINUTES));
        user.password_reset_attempts = 0;
        user.last_password_reset_sent_at = Some(now);
        user.updated_at = now;
        self.store.put_user(&user)?;

        if let Err(send_err) = self.email.send_password_reset_code(&user.email, &code).await {
            user.clear_reset_otp();
            self.store.put_user(&user)?;
            warn!(user = %user.id, error = %send_err, "password reset send failed; OTP state cleared");
            // Still generic success: a transport error must not leak
            // account existence.
            return Ok(());
        }

        info!(user = %user.id, "password reset code sent");
        Ok(())
    }

    /// Verify the code and overwrite the password.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), ShiftledgerError> {
        let normalized = normalize_email(email);
        let Some(user) = self.store.find_user_by_email_global(&normalized)? else {
            return Err(ShiftledgerError::Validation(
                "invalid email or verification code".to_string(),
            ));
        };

        let _guard = self.store.locks.user_lock(&user.id).await;
        let now = self.clock.now();
        let mut user = self.store.require_user(&user.id)?;

        let Some(hash) = user.password_reset_otp_hash.clone() else {
            return Err(ShiftledgerError::Validation(
                "invalid email or verification code".to_string(),
            ));
        };

        let expired = match user.password_reset_otp_expires_at {
            Some(expires_at) => expires_at < now,
            None => true,
        };
        if expired {
            user.clear_reset_otp();
            self.store.put_user(&user)?;
            return Err(ShiftledgerError::OtpExpired);
        }

        if user.password_reset_attempts >= OTP_MAX_ATTEMPTS {
            user.clear_reset_otp();
            self.store.put_user(&user)?;
            return Err(ShiftledgerError::OtpMaxAttempts);
        }

        if !verify_pin(code, &hash) {
            user.password_reset_attempts += 1;
            let exhausted = user.password_reset_attempts >= OTP_MAX_ATTEMPTS;
            if exhausted {
                user.clear_reset_otp();
            }
            self.store.put_user(&user)?;
            return if exhausted {
                Err(ShiftledgerError::OtpMaxAttempts)
            } else {
                Err(ShiftledgerError::OtpInvalid {
                    remaining: OTP_MAX_ATTEMPTS - user.password_reset_attempts,
                })
            };
        }

        validate_password_strength(new_password)?;

        user.password_hash = hash_password(new_password)?;
        user.clear_reset_otp();
        user.updated_at = now;
        self.store.put_user(&user)?;
        info!(user = %user.id, "password reset completed");
        Ok(())
    }
}
