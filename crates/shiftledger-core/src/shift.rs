use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CompanyId, SeriesId, ShiftId, TemplateId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShiftStatus {
    Draft,
    Published,
    Approved,
    Cancelled,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Draft => "DRAFT",
            ShiftStatus::Published => "PUBLISHED",
            ShiftStatus::Approved => "APPROVED",
            ShiftStatus::Cancelled => "CANCELLED",
        }
    }
}

/// A scheduled (planned) shift; distinct from a worked [`crate::time_entry::TimeEntry`].
///
/// Times are local to the company timezone. `end_time <= start_time`
/// denotes an overnight shift ending the next day.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub company_id: CompanyId,
    pub employee_id: UserId,
    pub shift_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_minutes: i64,
    pub status: ShiftStatus,
    pub notes: Option<String>,
    pub job_role: Option<String>,
    pub template_id: Option<TemplateId>,
    /// Groups shifts created by one bulk-week call.
    pub series_id: Option<SeriesId>,
    pub requires_approval: bool,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shift {
    pub fn is_overnight(&self) -> bool {
        self.end_time <= self.start_time
    }
}

// ── Templates ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TemplateType {
    None,
    Weekly,
    Biweekly,
    Monthly,
}

/// Recurrence descriptor expanded into PUBLISHED shifts over a date window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShiftTemplate {
    pub id: TemplateId,
    pub company_id: CompanyId,
    pub name: String,
    pub description: Option<String>,
    /// Default target when a generate call names no employees.
    pub employee_id: Option<UserId>,
    pub department: Option<String>,
    pub job_role: Option<String>,
    pub template_type: TemplateType,
    /// 0 = Monday. Required for WEEKLY and BIWEEKLY.
    pub day_of_week: Option<u8>,
    /// Required for MONTHLY.
    pub day_of_month: Option<u8>,
    pub week_of_month: Option<u8>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_minutes: i64,
    pub requires_approval: bool,
    pub is_active: bool,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}
