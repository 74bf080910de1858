use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CashSessionId, CompanyId, EntryId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashStatus {
    Open,
    Closed,
    /// Interim state while the end count disagrees with the start count;
    /// admin review always lands on `Closed`.
    ReviewNeeded,
}

impl CashStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashStatus::Open => "OPEN",
            CashStatus::Closed => "CLOSED",
            CashStatus::ReviewNeeded => "REVIEW_NEEDED",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CountSource {
    Kiosk,
    Web,
}

/// Cash-drawer session attached one-to-one to a time entry.
///
/// Created at clock-in iff the company policy required a drawer for the
/// employee; closed together with the entry. `delta_cents` is
/// `end − start`; any nonzero delta flags the session for review.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CashDrawerSession {
    pub id: CashSessionId,
    pub company_id: CompanyId,
    pub time_entry_id: EntryId,
    pub employee_id: UserId,

    pub start_cash_cents: i64,
    pub start_counted_at: DateTime<Utc>,
    pub start_count_source: CountSource,

    pub end_cash_cents: Option<i64>,
    pub end_counted_at: Option<DateTime<Utc>>,
    pub end_count_source: Option<CountSource>,

    pub collected_cash_cents: Option<i64>,
    pub drop_amount_cents: Option<i64>,
    pub beverages_cash_cents: Option<i64>,

    pub delta_cents: Option<i64>,
    pub status: CashStatus,

    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashAuditAction {
    CreateStart,
    SetEnd,
    EditStart,
    EditEnd,
    Review,
    Void,
}

impl CashAuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashAuditAction::CreateStart => "CREATE_START",
            CashAuditAction::SetEnd => "SET_END",
            CashAuditAction::EditStart => "EDIT_START",
            CashAuditAction::EditEnd => "EDIT_END",
            CashAuditAction::Review => "REVIEW",
            CashAuditAction::Void => "VOID",
        }
    }
}

/// Append-only log row scoped to one cash-drawer session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CashDrawerAudit {
    pub company_id: CompanyId,
    pub session_id: CashSessionId,
    pub actor_user_id: UserId,
    pub action: CashAuditAction,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}
