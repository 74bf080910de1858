use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CompanyId, EntryId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySource {
    Kiosk,
    Web,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Open,
    Closed,
    Edited,
    Approved,
}

/// Request metadata captured at punch time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PunchMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// One worked shift: a clock-in and, once closed, a clock-out.
///
/// At most one entry per `(company, employee)` may have `clock_out_at =
/// None` at any instant. Immutable except through the close transition or
/// an explicit admin edit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: EntryId,
    pub company_id: CompanyId,
    pub employee_id: UserId,
    pub clock_in_at: DateTime<Utc>,
    pub clock_out_at: Option<DateTime<Utc>>,
    pub break_minutes: i64,
    pub source: EntrySource,
    pub status: EntryStatus,
    pub note: Option<String>,
    pub edited_by: Option<UserId>,
    pub edit_reason: Option<String>,
    pub clock_in_meta: PunchMeta,
    pub clock_out_meta: PunchMeta,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    pub fn is_open(&self) -> bool {
        self.clock_out_at.is_none()
    }
}
