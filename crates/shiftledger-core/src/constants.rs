//! Protocol constants shared across the workspace.

// ── Tokens ───────────────────────────────────────────────────────────────────

/// Access-token lifetime (minutes).
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;

/// Refresh-token and session lifetime (days).
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Password-setup (invitation) token lifetime (days).
pub const PASSWORD_SETUP_TTL_DAYS: i64 = 7;

// ── One-time codes ───────────────────────────────────────────────────────────

/// OTP codes are six decimal digits.
pub const OTP_DIGITS: usize = 6;

/// An OTP is valid for this many minutes after it is issued.
pub const OTP_TTL_MINUTES: i64 = 15;

/// Failed verifies allowed before the OTP is cleared.
pub const OTP_MAX_ATTEMPTS: u32 = 5;

/// Minimum seconds between two OTP sends for the same user.
pub const OTP_RESEND_COOLDOWN_SECONDS: i64 = 60;

/// Fixed delay on account-enumeration surfaces when no user matches.
pub const ENUMERATION_GUARD_DELAY_MS: u64 = 300;

// ── Verification ─────────────────────────────────────────────────────────────

/// A verified e-mail stays valid for this many days before re-verification.
pub const VERIFICATION_WINDOW_DAYS: i64 = 30;

/// Expired OTP state older than this is swept by periodic cleanup (hours).
pub const VERIFICATION_CLEANUP_AGE_HOURS: i64 = 24;

// ── Kiosk ────────────────────────────────────────────────────────────────────

/// Kiosk PINs are exactly four ASCII digits.
pub const KIOSK_PIN_LENGTH: usize = 4;

// ── Company defaults ─────────────────────────────────────────────────────────

/// Timezone applied when a company has not configured one.
pub const DEFAULT_TIMEZONE: &str = "America/Chicago";

/// Weekly overtime threshold default (hours per week).
pub const DEFAULT_OVERTIME_THRESHOLD_HOURS: u32 = 40;

// ── Limits ───────────────────────────────────────────────────────────────────

/// Hard cap on rows returned by any export entry point.
pub const EXPORT_ROW_CAP: usize = 10_000;

/// Default page size for list queries.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Company slugs are truncated to this many characters.
pub const SLUG_MAX_LENGTH: usize = 40;
