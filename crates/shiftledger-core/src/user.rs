use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::VERIFICATION_WINDOW_DAYS;
use crate::error::ShiftledgerError;
use crate::types::{CompanyId, UserId};

// ── Role ─────────────────────────────────────────────────────────────────────

/// Account role. ADMIN bypasses permission lookup entirely; DEVELOPER is a
/// support role; the remaining three are punch-eligible staff roles.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Developer,
    Maintenance,
    Frontdesk,
    Housekeeping,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Developer => "DEVELOPER",
            Role::Maintenance => "MAINTENANCE",
            Role::Frontdesk => "FRONTDESK",
            Role::Housekeeping => "HOUSEKEEPING",
        }
    }

    /// Staff roles that may punch the clock and appear on payroll.
    pub fn is_punch_eligible(&self) -> bool {
        matches!(self, Role::Maintenance | Role::Frontdesk | Role::Housekeeping)
    }

    /// Parse a role for writes: the retired EMPLOYEE alias is rejected.
    pub fn parse_strict(s: &str) -> Result<Self, ShiftledgerError> {
        if s.eq_ignore_ascii_case("EMPLOYEE") {
            return Err(ShiftledgerError::Validation(
                "role EMPLOYEE is retired; use FRONTDESK".to_string(),
            ));
        }
        s.parse()
    }
}

impl FromStr for Role {
    type Err = ShiftledgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "DEVELOPER" => Ok(Role::Developer),
            "MAINTENANCE" => Ok(Role::Maintenance),
            // Records written before the hotel-role split carry EMPLOYEE.
            "FRONTDESK" | "EMPLOYEE" => Ok(Role::Frontdesk),
            "HOUSEKEEPING" => Ok(Role::Housekeeping),
            other => Err(ShiftledgerError::Validation(format!("unknown role: {other}"))),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Status & pay ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PayRateType {
    Hourly,
}

// ── User ─────────────────────────────────────────────────────────────────────

/// An account within exactly one company.
///
/// Email is stored normalized (lowercase, trimmed) and is unique per
/// company. OTP state for e-mail verification and password reset lives on
/// the row itself and is always mutated under a per-user lock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub company_id: CompanyId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub pin_hash: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub job_role: Option<String>,
    pub pay_rate_cents: i64,
    pub pay_rate_type: PayRateType,
    /// Per-employee override of the company overtime multiplier.
    pub overtime_multiplier: Option<Decimal>,

    // Verification state
    pub email_verified: bool,
    pub verification_required: bool,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub verification_pin_hash: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub verification_attempts: u32,
    pub last_verification_sent_at: Option<DateTime<Utc>>,

    // Password-reset state
    pub password_reset_otp_hash: Option<String>,
    pub password_reset_otp_expires_at: Option<DateTime<Utc>>,
    pub password_reset_attempts: u32,
    pub last_password_reset_sent_at: Option<DateTime<Utc>>,

    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Whether the 30-day verification window has lapsed (or never opened).
    ///
    /// Pure check; callers flip `verification_required` and persist.
    pub fn needs_verification(&self, now: DateTime<Utc>) -> bool {
        if !self.email_verified {
            return true;
        }
        match self.last_verified_at {
            None => true,
            Some(at) => at + Duration::days(VERIFICATION_WINDOW_DAYS) < now,
        }
    }

    /// Clear all e-mail-verification OTP state.
    pub fn clear_verification_otp(&mut self) {
        self.verification_pin_hash = None;
        self.verification_expires_at = None;
        self.verification_attempts = 0;
    }

    /// Clear all password-reset OTP state.
    pub fn clear_reset_otp(&mut self) {
        self.password_reset_otp_hash = None;
        self.password_reset_otp_expires_at = None;
        self.password_reset_attempts = 0;
    }
}

/// Lowercase and trim an e-mail address for storage and comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
