use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{CompanyId, EntryId, LineItemId, RunId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PayrollType {
    Weekly,
    Biweekly,
}

impl PayrollType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayrollType::Weekly => "WEEKLY",
            PayrollType::Biweekly => "BIWEEKLY",
        }
    }

    /// Period length in days.
    pub fn days(&self) -> i64 {
        match self {
            PayrollType::Weekly => 7,
            PayrollType::Biweekly => 14,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Draft,
    Finalized,
    Void,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Draft => "DRAFT",
            RunStatus::Finalized => "FINALIZED",
            RunStatus::Void => "VOID",
        }
    }
}

/// An immutable pay run over one period.
///
/// Unique per `(company, payroll_type, period_start, period_end)` among
/// non-VOID runs. FINALIZED and VOID runs reject every edit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayrollRun {
    pub id: RunId,
    pub company_id: CompanyId,
    pub payroll_type: PayrollType,
    pub period_start_date: NaiveDate,
    pub period_end_date: NaiveDate,
    /// Company timezone snapshot taken at generation time.
    pub timezone: String,
    pub status: RunStatus,
    pub generated_by: UserId,
    pub generated_at: DateTime<Utc>,
    pub total_regular_hours: Decimal,
    pub total_overtime_hours: Decimal,
    pub total_gross_pay_cents: i64,
    pub warning: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// One week inside a line item's breakdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeekBlock {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub regular_minutes: i64,
    pub overtime_minutes: i64,
    pub total_minutes: i64,
    pub entry_ids: Vec<EntryId>,
}

/// Structured breakdown persisted on each line item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItemDetails {
    /// Local date → paid minutes worked that day.
    pub days: BTreeMap<NaiveDate, i64>,
    pub week_blocks: Vec<WeekBlock>,
    pub time_entry_ids: Vec<EntryId>,
}

/// Per-employee result of one payroll run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayrollLineItem {
    pub id: LineItemId,
    pub payroll_run_id: RunId,
    pub company_id: CompanyId,
    pub employee_id: UserId,
    pub regular_minutes: i64,
    pub overtime_minutes: i64,
    pub total_minutes: i64,
    /// Snapshot of the employee's rate at generation time.
    pub pay_rate_cents: i64,
    pub overtime_multiplier: Decimal,
    pub regular_pay_cents: i64,
    pub overtime_pay_cents: i64,
    pub total_pay_cents: i64,
    /// Open or edited entries encountered while computing minutes.
    pub exceptions_count: u32,
    pub details: LineItemDetails,
}
