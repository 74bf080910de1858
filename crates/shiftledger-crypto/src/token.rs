//! Signed-token codec.
//!
//! Three token kinds share one HS256 signing secret:
//! - `access` — short-lived, carries `sub`, `company_id`, `role`
//! - `refresh` — long-lived, carries `sub`, `company_id`; the session store
//!   holds an argon2 hash of the full token string
//! - `password_setup` — invitation redemption, carries `sub` and `email`
//!
//! Expiry is checked against the caller-supplied instant rather than the
//! process clock so engines stay deterministic under an injected clock.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use shiftledger_core::constants::{
    ACCESS_TOKEN_TTL_MINUTES, PASSWORD_SETUP_TTL_DAYS, REFRESH_TOKEN_TTL_DAYS,
};
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::types::{CompanyId, UserId};
use shiftledger_core::user::Role;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    PasswordSetup,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<CompanyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub exp: i64,
}

pub struct TokenCodec {
    secret: Zeroizing<Vec<u8>>,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: Zeroizing::new(secret.to_vec()),
        }
    }

    pub fn mint_access(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, ShiftledgerError> {
        self.sign(Claims {
            sub: user_id,
            company_id: Some(company_id),
            role: Some(role),
            email: None,
            kind: TokenKind::Access,
            exp: (now + Duration::minutes(ACCESS_TOKEN_TTL_MINUTES)).timestamp(),
        })
    }

    pub fn mint_refresh(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        now: DateTime<Utc>,
    ) -> Result<String, ShiftledgerError> {
        self.sign(Claims {
            sub: user_id,
            company_id: Some(company_id),
            role: None,
            email: None,
            kind: TokenKind::Refresh,
            exp: (now + Duration::days(REFRESH_TOKEN_TTL_DAYS)).timestamp(),
        })
    }

    pub fn mint_password_setup(
        &self,
        user_id: UserId,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ShiftledgerError> {
        self.sign(Claims {
            sub: user_id,
            company_id: None,
            role: None,
            email: Some(email.to_string()),
            kind: TokenKind::PasswordSetup,
            exp: (now + Duration::days(PASSWORD_SETUP_TTL_DAYS)).timestamp(),
        })
    }

    /// Verify signature, kind, and expiry; returns the claims on success.
    pub fn verify(
        &self,
        token: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Claims, ShiftledgerError> {
        if token.trim().is_empty() {
            return Err(ShiftledgerError::InvalidToken);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock below.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .map_err(|_| ShiftledgerError::InvalidToken)?;

        let claims = data.claims;
        if claims.kind != expected {
            return Err(ShiftledgerError::InvalidToken);
        }
        if claims.exp <= now.timestamp() {
            return Err(ShiftledgerError::InvalidToken);
        }
        Ok(claims)
    }

    fn sign(&self, claims: Claims) -> Result<String, ShiftledgerError> {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| ShiftledgerError::Internal(format!("jwt encode: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"test-secret-test-secret-test-secret")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn access_round_trip() {
        let user = UserId::generate();
        let company = CompanyId::generate();
        let token = codec()
            .mint_access(user, company, Role::Admin, t0())
            .unwrap();

        let claims = codec().verify(&token, TokenKind::Access, t0()).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.company_id, Some(company));
        assert_eq!(claims.role, Some(Role::Admin));
    }

    #[test]
    fn kind_mismatch_rejected() {
        let token = codec()
            .mint_refresh(UserId::generate(), CompanyId::generate(), t0())
            .unwrap();
        assert!(codec().verify(&token, TokenKind::Access, t0()).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let token = codec()
            .mint_access(UserId::generate(), CompanyId::generate(), Role::Admin, t0())
            .unwrap();
        let later = t0() + Duration::minutes(ACCESS_TOKEN_TTL_MINUTES + 1);
        assert!(codec().verify(&token, TokenKind::Access, later).is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = codec()
            .mint_access(UserId::generate(), CompanyId::generate(), Role::Admin, t0())
            .unwrap();
        let other = TokenCodec::new(b"another-secret-another-secret");
        assert!(other.verify(&token, TokenKind::Access, t0()).is_err());
    }

    #[test]
    fn password_setup_carries_email() {
        let token = codec()
            .mint_password_setup(UserId::generate(), "new.hire@example.com", t0())
            .unwrap();
        let claims = codec()
            .verify(&token, TokenKind::PasswordSetup, t0())
            .unwrap();
        assert_eq!(claims.email.as_deref(), Some("new.hire@example.com"));
        assert_eq!(claims.company_id, None);
    }
}
