//! E-mail verification OTP flow.
//!
//! OTP state lives on the user row and is only mutated under the per-user
//! lock, the single-process analog of `SELECT … FOR UPDATE`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use shiftledger_core::clock::Clock;
use shiftledger_core::constants::{
    OTP_MAX_ATTEMPTS, OTP_RESEND_COOLDOWN_SECONDS, OTP_TTL_MINUTES,
    VERIFICATION_CLEANUP_AGE_HOURS,
};
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::types::UserId;
use shiftledger_core::user::User;
use shiftledger_crypto::{generate_otp, hash_pin, verify_pin};
use shiftledger_store::Store;

use crate::email::EmailSender;

pub struct VerificationService {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    email: Arc<dyn EmailSender>,
}

impl VerificationService {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>, email: Arc<dyn EmailSender>) -> Self {
        Self { store, clock, email }
    }

    /// Reject with `VerificationRequired` when the user's 30-day window has
    /// lapsed (or never opened). Used as the gate on protected actions.
    pub fn ensure_verified(&self, user: &User) -> Result<(), ShiftledgerError> {
        if user.needs_verification(self.clock.now()) {
            return Err(ShiftledgerError::VerificationRequired {
                email: user.email.clone(),
            });
        }
        Ok(())
    }

    /// Generate and send a fresh verification code.
    pub async fn send_code(&self, user_id: UserId) -> Result<(), ShiftledgerError> {
        let _guard = self.store.locks.user_lock(&user_id).await;
        let now = self.clock.now();
        let mut user = self.store.require_user(&user_id)?;

        if !user.needs_verification(now) {
            return Err(ShiftledgerError::Validation(
                "email is already verified".to_string(),
            ));
        }

        if let Some(last_sent) = user.last_verification_sent_at {
            let elapsed = (now - last_sent).num_seconds();
            if elapsed < OTP_RESEND_COOLDOWN_SECONDS {
                return Err(ShiftledgerError::OtpCooldown {
                    remaining_secs: OTP_RESEND_COOLDOWN_SECONDS - elapsed,
                });
            }
        }

        if user.verification_attempts >= OTP_MAX_ATTEMPTS {
            user.clear_verification_otp();
            self.store.put_user(&user)?;
            warn!(user = %user.id, "verification send blocked at attempt cap");
            return Err(ShiftledgerError::OtpMaxAttempts);
        }

        let code = generate_otp();
        user.verification_pin_hash = Some(hash_pin(&code)?);
        user.verification_expires_at = Some(now + Duration::minutes(OTP_TTL_MINUTES));
        user.verification_attempts = 0;
        user.last_verification_sent_at = Some(now);
        user.updated_at = now;
        self.store.put_user(&user)?;

        if let Err(send_err) = self.email.send_verification_code(&user.email, &code).await {
            // Clear so the user can immediately request another code.
            user.clear_verification_otp();
            self.store.put_user(&user)?;
            warn!(user = %user.id, error = %send_err, "verification send failed; OTP state cleared");
            return Err(ShiftledgerError::EmailSendFailed(send_err.to_string()));
        }

        info!(user = %user.id, "verification code sent");
        Ok(())
    }

    /// Check a submitted code; marks the user verified on success.
    pub async fn verify_code(&self, user_id: UserId, code: &str) -> Result<(), ShiftledgerError> {
        let _guard = self.store.locks.user_lock(&user_id).await;
        let now = self.clock.now();
        let mut user = self.store.require_user(&user_id)?;

        let Some(hash) = user.verification_pin_hash.clone() else {
            return Err(ShiftledgerError::OtpMissing);
        };

        let expired = match user.verification_expires_at {
            Some(expires_at) => expires_at < now,
            None => true,
        };
        if expired {
            user.clear_verification_otp();
            self.store.put_user(&user)?;
            return Err(ShiftledgerError::OtpExpired);
        }

        if user.verification_attempts >= OTP_MAX_ATTEMPTS {
            user.clear_verification_otp();
            self.store.put_user(&user)?;
            return Err(ShiftledgerError::OtpMaxAttempts);
        }

        if !verify_pin(code, &hash) {
            user.verification_attempts += 1;
            let exhausted = user.verification_attempts >= OTP_MAX_ATTEMPTS;
            if exhausted {
                user.clear_verification_otp();
            }
            self.store.put_user(&user)?;
            return if exhausted {
                Err(ShiftledgerError::OtpMaxAttempts)
            } else {
                Err(ShiftledgerError::OtpInvalid {
                    remaining: OTP_MAX_ATTEMPTS - user.verification_attempts,
                })
            };
        }

        user.email_verified = true;
        user.verification_required = false;
        user.last_verified_at = Some(now);
        user.clear_verification_otp();
        user.updated_at = now;
        self.store.put_user(&user)?;
        info!(user = %user.id, "email verified");
        Ok(())
    }

    /// Sweep OTP state that expired more than a day ago. Invoked by an
    /// external scheduler.
    pub fn cleanup_expired(&self) -> Result<usize, ShiftledgerError> {
        let cutoff: DateTime<Utc> =
            self.clock.now() - Duration::hours(VERIFICATION_CLEANUP_AGE_HOURS);
        let mut cleaned = 0;
        for company in self.all_company_ids()? {
            for mut user in self.store.iter_company_users(&company)? {
                let stale_verification = user.verification_pin_hash.is_some()
                    && user.verification_expires_at.map_or(true, |e| e < cutoff);
                let stale_reset = user.password_reset_otp_hash.is_some()
                    && user
                        .password_reset_otp_expires_at
                        .map_or(true, |e| e < cutoff);
                if stale_verification || stale_reset {
                    if stale_verification {
                        user.clear_verification_otp();
                    }
                    if stale_reset {
                        user.clear_reset_otp();
                    }
                    self.store.put_user(&user)?;
                    cleaned += 1;
                }
            }
        }
        if cleaned > 0 {
            info!(cleaned, "expired OTP state swept");
        }
        Ok(cleaned)
    }

    fn all_company_ids(&self) -> Result<Vec<shiftledger_core::types::CompanyId>, ShiftledgerError> {
        // Users are keyed by id; companies are few. Walking companies keeps
        // the sweep tenant-ordered.
        Ok(self
            .store
            .iter_companies()?
            .into_iter()
            .map(|c| c.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shiftledger_core::clock::FixedClock;
    use shiftledger_core::company::{Company, CompanySettings};
    use shiftledger_core::types::CompanyId;
    use shiftledger_core::user::{PayRateType, Role, UserStatus};

    use crate::email::{CapturedEmail, CapturingEmailSender};

    struct Ctx {
        store: Arc<Store>,
        clock: Arc<FixedClock>,
        email: Arc<CapturingEmailSender>,
        service: VerificationService,
        user_id: UserId,
    }

    fn setup(name: &str) -> Ctx {
        let dir = std::env::temp_dir().join(format!("shiftledger_verify_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let store = Arc::new(Store::open(&dir).unwrap());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        ));
        let email = Arc::new(CapturingEmailSender::new());

        let company = Company {
            id: CompanyId::generate(),
            name: "Demo".to_string(),
            slug: "demo".to_string(),
            kiosk_enabled: true,
            settings: CompanySettings::default(),
            created_at: clock.now(),
        };
        store.insert_company(&company).unwrap();

        let now = clock.now();
        let user = User {
            id: UserId::generate(),
            company_id: company.id,
            name: "Pat".to_string(),
            email: "pat@example.com".to_string(),
            password_hash: String::new(),
            pin_hash: None,
            role: Role::Frontdesk,
            status: UserStatus::Active,
            job_role: None,
            pay_rate_cents: 0,
            pay_rate_type: PayRateType::Hourly,
            overtime_multiplier: None,
            email_verified: false,
            verification_required: true,
            last_verified_at: None,
            verification_pin_hash: None,
            verification_expires_at: None,
            verification_attempts: 0,
            last_verification_sent_at: None,
            password_reset_otp_hash: None,
            password_reset_otp_expires_at: None,
            password_reset_attempts: 0,
            last_password_reset_sent_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        store.insert_user(&user).unwrap();

        let service = VerificationService::new(store.clone(), clock.clone(), email.clone());
        Ctx { store, clock, email, service, user_id: user.id }
    }

    fn sent_code(email: &CapturingEmailSender) -> String {
        match email.last().unwrap() {
            CapturedEmail::Verification { code, .. } => code,
            other => panic!("expected verification mail, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_then_verify() {
        let ctx = setup("send_verify");
        ctx.service.send_code(ctx.user_id).await.unwrap();
        let code = sent_code(&ctx.email);

        ctx.service.verify_code(ctx.user_id, &code).await.unwrap();

        let user = ctx.store.require_user(&ctx.user_id).unwrap();
        assert!(user.email_verified);
        assert!(user.verification_pin_hash.is_none());
        assert!(ctx.service.ensure_verified(&user).is_ok());
    }

    #[tokio::test]
    async fn resend_cooldown_blocks_second_email() {
        let ctx = setup("cooldown");
        ctx.service.send_code(ctx.user_id).await.unwrap();
        assert_eq!(ctx.email.sent_count(), 1);

        let err = ctx.service.send_code(ctx.user_id).await.unwrap_err();
        assert!(matches!(err, ShiftledgerError::OtpCooldown { .. }));
        assert_eq!(ctx.email.sent_count(), 1);

        // Past the cooldown a new code goes out.
        ctx.clock.advance(Duration::seconds(61));
        ctx.service.send_code(ctx.user_id).await.unwrap();
        assert_eq!(ctx.email.sent_count(), 2);
    }

    #[tokio::test]
    async fn five_wrong_codes_lock_out_and_clear() {
        let ctx = setup("lockout");
        ctx.service.send_code(ctx.user_id).await.unwrap();

        for attempt in 1..=4u32 {
            let err = ctx.service.verify_code(ctx.user_id, "000001").await.unwrap_err();
            match err {
                ShiftledgerError::OtpInvalid { remaining } => {
                    assert_eq!(remaining, OTP_MAX_ATTEMPTS - attempt);
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
        // Fifth failure clears the code.
        let err = ctx.service.verify_code(ctx.user_id, "000001").await.unwrap_err();
        assert!(matches!(err, ShiftledgerError::OtpMaxAttempts));
        let user = ctx.store.require_user(&ctx.user_id).unwrap();
        assert!(user.verification_pin_hash.is_none());

        // A later attempt reports no code on file.
        let err = ctx.service.verify_code(ctx.user_id, "000001").await.unwrap_err();
        assert!(matches!(err, ShiftledgerError::OtpMissing));

        // A fresh send after the cooldown resets the flow.
        ctx.clock.advance(Duration::seconds(61));
        ctx.service.send_code(ctx.user_id).await.unwrap();
        let code = sent_code(&ctx.email);
        ctx.service.verify_code(ctx.user_id, &code).await.unwrap();
    }

    #[tokio::test]
    async fn expired_code_is_cleared() {
        let ctx = setup("expired");
        ctx.service.send_code(ctx.user_id).await.unwrap();
        let code = sent_code(&ctx.email);

        ctx.clock.advance(Duration::minutes(OTP_TTL_MINUTES + 1));
        let err = ctx.service.verify_code(ctx.user_id, &code).await.unwrap_err();
        assert!(matches!(err, ShiftledgerError::OtpExpired));
        let user = ctx.store.require_user(&ctx.user_id).unwrap();
        assert!(user.verification_pin_hash.is_none());
    }

    #[tokio::test]
    async fn failed_send_clears_state_for_retry() {
        let ctx = setup("send_failure");
        ctx.email.set_fail(true);
        let err = ctx.service.send_code(ctx.user_id).await.unwrap_err();
        assert!(matches!(err, ShiftledgerError::EmailSendFailed(_)));

        let user = ctx.store.require_user(&ctx.user_id).unwrap();
        assert!(user.verification_pin_hash.is_none());

        // The retry works once the transport recovers and cooldown passes.
        ctx.email.set_fail(false);
        ctx.clock.advance(Duration::seconds(61));
        ctx.service.send_code(ctx.user_id).await.unwrap();
    }

    #[tokio::test]
    async fn verified_gate_reopens_after_window() {
        let ctx = setup("window");
        ctx.service.send_code(ctx.user_id).await.unwrap();
        let code = sent_code(&ctx.email);
        ctx.service.verify_code(ctx.user_id, &code).await.unwrap();

        ctx.clock.advance(Duration::days(31));
        let user = ctx.store.require_user(&ctx.user_id).unwrap();
        assert!(matches!(
            ctx.service.ensure_verified(&user),
            Err(ShiftledgerError::VerificationRequired { .. })
        ));
    }

    #[tokio::test]
    async fn cleanup_sweeps_stale_otp_state() {
        let ctx = setup("cleanup");
        ctx.service.send_code(ctx.user_id).await.unwrap();
        ctx.clock.advance(Duration::hours(VERIFICATION_CLEANUP_AGE_HOURS + 1));

        let cleaned = ctx.service.cleanup_expired().unwrap();
        assert_eq!(cleaned, 1);
        let user = ctx.store.require_user(&ctx.user_id).unwrap();
        assert!(user.verification_pin_hash.is_none());
    }
}
