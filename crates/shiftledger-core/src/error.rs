use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShiftledgerError {
    // ── Validation ───────────────────────────────────────────────────────────
    #[error("{0}")]
    Validation(String),

    #[error("unknown or invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("{0}")]
    WeakPassword(String),

    #[error("PIN must be exactly 4 digits")]
    InvalidPinFormat,

    #[error("starting cash count is required to clock in")]
    MissingCashStart,

    #[error("ending cash count is required to clock out")]
    MissingCashEnd,

    // ── Authentication ───────────────────────────────────────────────────────
    #[error("invalid email or password")]
    AuthFailed,

    #[error("the PIN you entered is incorrect")]
    PinMismatch,

    #[error("PIN is not configured for employee {0}")]
    PinNotConfigured(String),

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("invalid or reused refresh token; all sessions revoked")]
    RefreshReuse,

    #[error("user account is inactive")]
    AccountInactive,

    // ── Authorization ────────────────────────────────────────────────────────
    #[error("{0}")]
    Forbidden(String),

    #[error("email verification required")]
    VerificationRequired { email: String },

    // ── Policy ───────────────────────────────────────────────────────────────
    #[error("payroll run has already been finalized and cannot be modified")]
    RunAlreadyFinalized,

    #[error("payroll run has been voided")]
    RunVoided,

    #[error("only DRAFT payroll runs can be deleted")]
    RunNotDraft,

    #[error("cash drawer editing is not allowed for this company")]
    CashEditDisabled,

    #[error("cannot close cash drawer session with status {0}")]
    CashSessionNotOpen(String),

    #[error("cash drawer session already exists for this time entry")]
    CashSessionExists,

    // ── Conflict ─────────────────────────────────────────────────────────────
    #[error("{0} scheduling conflict(s) detected")]
    ScheduleConflicts(usize),

    #[error("payroll run already exists for period {start} to {end}")]
    DuplicatePayrollPeriod { start: NaiveDate, end: NaiveDate },

    #[error("PIN already in use")]
    DuplicatePin,

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("an open shift already exists for this employee")]
    ShiftAlreadyOpen,

    // ── Not found (always company-scoped) ────────────────────────────────────
    #[error("company not found: {0}")]
    CompanyNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("employee not found or not eligible: {0}")]
    EmployeeNotFound(String),

    #[error("time entry not found: {0}")]
    EntryNotFound(String),

    #[error("cash drawer session not found: {0}")]
    CashSessionNotFound(String),

    #[error("shift not found: {0}")]
    ShiftNotFound(String),

    #[error("shift template not found or inactive: {0}")]
    TemplateNotFound(String),

    #[error("payroll run not found: {0}")]
    RunNotFound(String),

    #[error("leave request not found: {0}")]
    LeaveRequestNotFound(String),

    // ── One-time codes ───────────────────────────────────────────────────────
    #[error("please wait {remaining_secs} seconds before requesting a new code")]
    OtpCooldown { remaining_secs: i64 },

    #[error("too many failed attempts; please request a new code")]
    OtpMaxAttempts,

    #[error("verification code has expired; please request a new code")]
    OtpExpired,

    #[error("invalid verification code; {remaining} attempt(s) remaining")]
    OtpInvalid { remaining: u32 },

    #[error("no verification code found; please request a new code")]
    OtpMissing,

    // ── Downstream ───────────────────────────────────────────────────────────
    #[error("verification code could not be sent; please try again")]
    EmailSendFailed(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ShiftledgerError {
    /// The HTTP-ish status the API adapter reports for this error.
    pub fn status(&self) -> u16 {
        use ShiftledgerError::*;
        match self {
            Validation(_) | InvalidTimezone(_) | WeakPassword(_) | InvalidPinFormat
            | MissingCashStart | MissingCashEnd | PinNotConfigured(_) => 400,

            AuthFailed | PinMismatch | InvalidToken | RefreshReuse => 401,

            AccountInactive | Forbidden(_) | VerificationRequired { .. } | CashEditDisabled => 403,

            CompanyNotFound(_) | UserNotFound(_) | EmployeeNotFound(_) | EntryNotFound(_)
            | CashSessionNotFound(_) | ShiftNotFound(_) | TemplateNotFound(_)
            | RunNotFound(_) | LeaveRequestNotFound(_) => 404,

            ScheduleConflicts(_) | DuplicatePayrollPeriod { .. } | DuplicatePin
            | DuplicateEmail(_) | ShiftAlreadyOpen | CashSessionExists => 409,

            RunAlreadyFinalized | RunVoided | RunNotDraft | CashSessionNotOpen(_) => 422,

            OtpCooldown { .. } | OtpMaxAttempts | OtpExpired | OtpInvalid { .. }
            | OtpMissing => 429,

            EmailSendFailed(_) | Serialization(_) | Storage(_) | Internal(_) => 500,
        }
    }
}
