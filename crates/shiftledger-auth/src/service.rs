//! Registration, login, refresh rotation with reuse detection, logout, and
//! invitation-token redemption.

use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use tracing::{info, warn};

use shiftledger_core::audit::AuditLog;
use shiftledger_core::clock::Clock;
use shiftledger_core::company::{Company, CompanySettings};
use shiftledger_core::constants::REFRESH_TOKEN_TTL_DAYS;
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::session::Session;
use shiftledger_core::types::{CompanyId, SessionId, UserId};
use shiftledger_core::user::{normalize_email, PayRateType, Role, User, UserStatus};
use shiftledger_crypto::{
    hash_password, validate_password_strength, verify_password, TokenCodec, TokenKind,
};
use shiftledger_store::Store;

use crate::slug::generate_unique_slug;

#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthService {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    codec: Arc<TokenCodec>,
}

impl AuthService {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>, codec: Arc<TokenCodec>) -> Self {
        Self { store, clock, codec }
    }

    /// Mint an access+refresh pair and persist the session row holding the
    /// argon2 hash of the refresh token.
    fn issue_pair(
        &self,
        user: &User,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<TokenPair, ShiftledgerError> {
        let now = self.clock.now();
        let refresh_token = self.codec.mint_refresh(user.id, user.company_id, now)?;
        let session = Session {
            id: SessionId::generate(),
            user_id: user.id,
            company_id: user.company_id,
            refresh_token_hash: hash_password(&refresh_token)?,
            created_at: now,
            expires_at: now + Duration::days(REFRESH_TOKEN_TTL_DAYS),
            revoked_at: None,
            ip,
            user_agent,
        };
        self.store.put_session(&session)?;

        let access_token = self
            .codec
            .mint_access(user.id, user.company_id, user.role, now)?;
        Ok(TokenPair { access_token, refresh_token })
    }

    /// Create a company with its first ADMIN account and log them in.
    pub fn register_company(
        &self,
        company_name: &str,
        admin_name: &str,
        admin_email: &str,
        admin_password: &str,
    ) -> Result<(Company, User, TokenPair), ShiftledgerError> {
        validate_password_strength(admin_password)?;
        let email = normalize_email(admin_email);
        if email.is_empty() || !email.contains('@') {
            return Err(ShiftledgerError::Validation("invalid email address".to_string()));
        }
        if company_name.trim().is_empty() {
            return Err(ShiftledgerError::Validation("company name is required".to_string()));
        }

        let now = self.clock.now();
        let company = Company {
            id: CompanyId::generate(),
            name: company_name.trim().to_string(),
            slug: generate_unique_slug(&self.store, company_name)?,
            kiosk_enabled: true,
            settings: CompanySettings::default(),
            created_at: now,
        };
        self.store.insert_company(&company)?;

        let admin = User {
            id: UserId::generate(),
            company_id: company.id,
            name: admin_name.trim().to_string(),
            email,
            password_hash: hash_password(admin_password)?,
            pin_hash: None,
            role: Role::Admin,
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
            last_login_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_user(&admin)?;

        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(admin.id),
            "COMPANY_REGISTER",
            "company",
            company.id,
            json!({ "slug": company.slug }),
            now,
        ))?;

        let pair = self.issue_pair(&admin, None, None)?;
        info!(company = %company.id, slug = %company.slug, "company registered");
        Ok((company, admin, pair))
    }

    pub fn login(
        &self,
        email: &str,
        password: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(User, TokenPair), ShiftledgerError> {
        let user = self.store.find_user_by_email_global(email)?;
        let Some(mut user) = user else {
            return Err(ShiftledgerError::AuthFailed);
        };
        if !verify_password(password, &user.password_hash) {
            return Err(ShiftledgerError::AuthFailed);
        }
        if !user.is_active() {
            return Err(ShiftledgerError::AccountInactive);
        }

        let now = self.clock.now();
        user.last_login_at = Some(now);
        user.updated_at = now;
        self.store.put_user(&user)?;

        let pair = self.issue_pair(&user, ip, user_agent)?;
        Ok((user, pair))
    }

    /// Rotate a refresh token.
    ///
    /// The presented token is compared against the argon2 hashes of every
    /// live session for the user. A match revokes that session and mints a
    /// new pair. No match while live sessions exist is treated as token
    /// theft: every live session is revoked and the call fails.
    pub fn refresh(
        &self,
        refresh_token: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<TokenPair, ShiftledgerError> {
        let now = self.clock.now();
        let claims = self.codec.verify(refresh_token, TokenKind::Refresh, now)?;
        let user_id = claims.sub;

        let sessions = self.store.iter_user_sessions(&user_id)?;
        let live: Vec<_> = sessions.into_iter().filter(|s| s.is_live(now)).collect();

        let matched = live
            .iter()
            .find(|s| verify_password(refresh_token, &s.refresh_token_hash))
            .cloned();

        let Some(mut matched) = matched else {
            if !live.is_empty() {
                warn!(user = %user_id, sessions = live.len(), "refresh token reuse detected; revoking all sessions");
                for mut session in live {
                    session.revoked_at = Some(now);
                    self.store.put_session(&session)?;
                }
                return Err(ShiftledgerError::RefreshReuse);
            }
            return Err(ShiftledgerError::InvalidToken);
        };

        matched.revoked_at = Some(now);
        self.store.put_session(&matched)?;

        let user = self.store.require_user(&user_id)?;
        if !user.is_active() {
            return Err(ShiftledgerError::AccountInactive);
        }
        self.issue_pair(&user, ip, user_agent)
    }

    /// Revoke the session matching the presented refresh token. Silent on
    /// unknown tokens.
    pub fn logout(&self, refresh_token: &str) -> Result<(), ShiftledgerError> {
        let now = self.clock.now();
        let Ok(claims) = self.codec.verify(refresh_token, TokenKind::Refresh, now) else {
            return Ok(());
        };
        for mut session in self.store.iter_user_sessions(&claims.sub)? {
            if session.is_live(now) && verify_password(refresh_token, &session.refresh_token_hash)
            {
                session.revoked_at = Some(now);
                self.store.put_session(&session)?;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Resolve a `password_setup` token to the invited account.
    pub fn password_setup_info(&self, token: &str) -> Result<User, ShiftledgerError> {
        let claims = self
            .codec
            .verify(token, TokenKind::PasswordSetup, self.clock.now())?;
        let user = self.store.require_user(&claims.sub)?;
        if claims.email.as_deref() != Some(user.email.as_str()) {
            return Err(ShiftledgerError::InvalidToken);
        }
        Ok(user)
    }

    /// Redeem an invitation: set the password and mark the mailbox proven.
    pub fn set_password(&self, token: &str, new_password: &str) -> Result<User, ShiftledgerError> {
        validate_password_strength(new_password)?;
        let mut user = self.password_setup_info(token)?;

        let now = self.clock.now();
        user.password_hash = hash_password(new_password)?;
        // Following the emailed link proves mailbox ownership.
        user.email_verified = true;
        user.verification_required = false;
        user.last_verified_at = Some(now);
        user.updated_at = now;
        self.store.put_user(&user)?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shiftledger_core::clock::FixedClock;

    fn setup(name: &str) -> (Arc<Store>, Arc<FixedClock>, AuthService) {
        let dir = std::env::temp_dir().join(format!("shiftledger_auth_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let store = Arc::new(Store::open(&dir).unwrap());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        ));
        let codec = Arc::new(TokenCodec::new(b"auth-service-test-secret"));
        let service = AuthService::new(store.clone(), clock.clone(), codec);
        (store, clock, service)
    }

    #[test]
    fn register_and_login() {
        let (_, _, service) = setup("register_login");
        let (company, admin, _) = service
            .register_company("Demo Hotel", "Ana Admin", "ana@example.com", "Passw0rd!")
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(company.slug, "demo-hotel");

        let (user, pair) = service
            .login("Ana@Example.com", "Passw0rd!", None, None)
            .unwrap();
        assert_eq!(user.id, admin.id);
        assert!(!pair.access_token.is_empty());

        assert!(matches!(
            service.login("ana@example.com", "WrongPass1", None, None),
            Err(ShiftledgerError::AuthFailed)
        ));
    }

    #[test]
    fn weak_registration_password_rejected() {
        let (_, _, service) = setup("weak_password");
        assert!(matches!(
            service.register_company("Demo", "Ana", "ana@example.com", "short"),
            Err(ShiftledgerError::WeakPassword(_))
        ));
    }

    #[test]
    fn refresh_rotates_and_detects_reuse() {
        let (store, _, service) = setup("reuse");
        let (_, admin, pair) = service
            .register_company("Demo", "Ana", "ana@example.com", "Passw0rd!")
            .unwrap();

        // R1 → R2: fine.
        let pair2 = service.refresh(&pair.refresh_token, None, None).unwrap();
        assert_ne!(pair2.refresh_token, pair.refresh_token);

        // Reusing R1 revokes everything, including R2.
        let err = service.refresh(&pair.refresh_token, None, None).unwrap_err();
        assert!(matches!(err, ShiftledgerError::RefreshReuse));

        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let live = store
            .iter_user_sessions(&admin.id)
            .unwrap()
            .into_iter()
            .filter(|s| s.is_live(now))
            .count();
        assert_eq!(live, 0);

        // R2 is dead too.
        assert!(service.refresh(&pair2.refresh_token, None, None).is_err());
    }

    #[test]
    fn logout_revokes_single_session() {
        let (store, _, service) = setup("logout");
        let (_, admin, pair_a) = service
            .register_company("Demo", "Ana", "ana@example.com", "Passw0rd!")
            .unwrap();
        let (_, pair_b) = service.login("ana@example.com", "Passw0rd!", None, None).unwrap();

        service.logout(&pair_a.refresh_token).unwrap();

        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let live = store
            .iter_user_sessions(&admin.id)
            .unwrap()
            .into_iter()
            .filter(|s| s.is_live(now))
            .count();
        assert_eq!(live, 1);

        // Unknown tokens are a silent no-op.
        service.logout("garbage").unwrap();
        // The other session still refreshes.
        assert!(service.refresh(&pair_b.refresh_token, None, None).is_ok());
    }

    #[test]
    fn expired_session_is_not_reuse() {
        let (_, clock, service) = setup("expired_session");
        let (_, _, pair) = service
            .register_company("Demo", "Ana", "ana@example.com", "Passw0rd!")
            .unwrap();

        // Past session expiry the presented token is merely invalid; no
        // theft response because nothing live remains.
        clock.advance(Duration::days(REFRESH_TOKEN_TTL_DAYS + 1));
        assert!(matches!(
            service.refresh(&pair.refresh_token, None, None),
            Err(ShiftledgerError::InvalidToken)
        ));
    }

    #[test]
    fn invitation_redemption_sets_password_and_verifies() {
        let (store, clock, service) = setup("invitation");
        let (_, admin, _) = service
            .register_company("Demo", "Ana", "ana@example.com", "Passw0rd!")
            .unwrap();

        let codec = TokenCodec::new(b"auth-service-test-secret");
        let token = codec
            .mint_password_setup(admin.id, &admin.email, clock.now())
            .unwrap();

        let info = service.password_setup_info(&token).unwrap();
        assert_eq!(info.id, admin.id);

        service.set_password(&token, "N3wPassword").unwrap();
        let user = store.require_user(&admin.id).unwrap();
        assert!(user.email_verified);
        assert!(service.login("ana@example.com", "N3wPassword", None, None).is_ok());
    }
}
