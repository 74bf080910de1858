//! Wire DTOs. Entities never cross the API boundary directly: views strip
//! credential material and requests carry only what the engines need.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shiftledger_core::cash::{CashStatus, CountSource};
use shiftledger_core::company::Company;
use shiftledger_core::leave::{LeaveRequest, LeaveStatus, LeaveType};
use shiftledger_core::payroll::{
    LineItemDetails, PayrollLineItem, PayrollRun, PayrollType, RunStatus,
};
use shiftledger_core::shift::{Shift, ShiftStatus, ShiftTemplate, TemplateType};
use shiftledger_core::time_entry::{EntrySource, EntryStatus, TimeEntry};
use shiftledger_core::types::{
    CashSessionId, CompanyId, EntryId, LeaveRequestId, RunId, SeriesId, ShiftId, TemplateId,
    UserId,
};
use shiftledger_core::user::{Role, User, UserStatus};
use shiftledger_schedule::{BulkWeekResult, PreviewShift, ShiftConflict};
use shiftledger_time::cash::{CashExportRow, CashSummary};

// ── Auth ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcRegisterCompany {
    pub company_name: String,
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcLogin {
    pub email: String,
    pub password: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcTokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcAuthResponse {
    pub user: RpcUser,
    pub company: RpcCompany,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcSetupInfo {
    pub email: String,
    pub name: String,
}

// ── Users ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcUser {
    pub id: UserId,
    pub company_id: CompanyId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub job_role: Option<String>,
    pub pay_rate_cents: i64,
    pub overtime_multiplier: Option<Decimal>,
    pub has_pin: bool,
    pub email_verified: bool,
    pub verification_required: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for RpcUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            company_id: user.company_id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            status: user.status,
            job_role: user.job_role.clone(),
            pay_rate_cents: user.pay_rate_cents,
            overtime_multiplier: user.overtime_multiplier,
            has_pin: user.pin_hash.is_some(),
            email_verified: user.email_verified,
            verification_required: user.verification_required,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcEmployeeCreate {
    pub name: String,
    pub email: String,
    /// Strict role name; the retired EMPLOYEE alias is rejected.
    pub role: String,
    pub job_role: Option<String>,
    #[serde(default)]
    pub pay_rate_cents: i64,
    pub overtime_multiplier: Option<Decimal>,
    pub pin: Option<String>,
    #[serde(default = "default_true")]
    pub send_invite: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RpcEmployeeUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<UserStatus>,
    pub job_role: Option<String>,
    pub pay_rate_cents: Option<i64>,
    pub overtime_multiplier: Option<Decimal>,
    pub pin: Option<String>,
}

// ── Company ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcCompany {
    pub id: CompanyId,
    pub name: String,
    pub slug: String,
    pub kiosk_enabled: bool,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<&Company> for RpcCompany {
    fn from(company: &Company) -> Self {
        Self {
            id: company.id,
            name: company.name.clone(),
            slug: company.slug.clone(),
            kiosk_enabled: company.kiosk_enabled,
            settings: serde_json::to_value(&company.settings).unwrap_or_default(),
            created_at: company.created_at,
        }
    }
}

// ── Kiosk ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcKioskInfo {
    pub company_name: String,
    pub slug: String,
    pub kiosk_enabled: bool,
    pub cash_drawer_enabled: bool,
    pub cash_drawer_starting_amount_cents: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcPinCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clocked_in: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RpcCashAmounts {
    pub cash_start_cents: Option<i64>,
    pub cash_end_cents: Option<i64>,
    pub collected_cash_cents: Option<i64>,
    pub drop_amount_cents: Option<i64>,
    pub beverages_cash_cents: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcKioskClock {
    pub company_slug: String,
    pub pin: String,
    #[serde(default)]
    pub cash: RpcCashAmounts,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

// ── Time entries ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcPunch {
    pub employee_id: Option<UserId>,
    pub employee_email: Option<String>,
    pub pin: Option<String>,
    #[serde(default)]
    pub cash: RpcCashAmounts,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcTimeEntry {
    pub id: EntryId,
    pub employee_id: UserId,
    pub clock_in_at: DateTime<Utc>,
    pub clock_out_at: Option<DateTime<Utc>>,
    pub break_minutes: i64,
    pub source: EntrySource,
    pub status: EntryStatus,
    pub note: Option<String>,
    /// Paid minutes under the company's current rounding policy.
    pub rounded_minutes: Option<i64>,
}

impl RpcTimeEntry {
    pub fn from_entry(entry: &TimeEntry, rounded_minutes: Option<i64>) -> Self {
        Self {
            id: entry.id,
            employee_id: entry.employee_id,
            clock_in_at: entry.clock_in_at,
            clock_out_at: entry.clock_out_at,
            break_minutes: entry.break_minutes,
            source: entry.source,
            status: entry.status,
            note: entry.note.clone(),
            rounded_minutes,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcPunchResult {
    pub direction: String,
    pub entry: RpcTimeEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_session: Option<RpcCashSession>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcEntryPage {
    pub items: Vec<RpcTimeEntry>,
    pub total: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RpcEntryFilter {
    pub employee_id: Option<UserId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<EntryStatus>,
    #[serde(default)]
    pub skip: usize,
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RpcEntryEdit {
    pub clock_in_at: Option<DateTime<Utc>>,
    pub clock_out_at: Option<DateTime<Utc>>,
    pub break_minutes: Option<i64>,
    pub note: Option<String>,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcManualEntry {
    pub employee_id: UserId,
    pub clock_in_at: DateTime<Utc>,
    pub clock_out_at: DateTime<Utc>,
    #[serde(default)]
    pub break_minutes: i64,
    pub note: Option<String>,
}

// ── Cash drawer ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcCashSession {
    pub id: CashSessionId,
    pub time_entry_id: EntryId,
    pub employee_id: UserId,
    pub start_cash_cents: i64,
    pub start_counted_at: DateTime<Utc>,
    pub start_count_source: CountSource,
    pub end_cash_cents: Option<i64>,
    pub end_counted_at: Option<DateTime<Utc>>,
    pub collected_cash_cents: Option<i64>,
    pub drop_amount_cents: Option<i64>,
    pub beverages_cash_cents: Option<i64>,
    pub delta_cents: Option<i64>,
    pub status: CashStatus,
    pub reviewed_by: Option<UserId>,
    pub review_note: Option<String>,
}

impl From<&shiftledger_core::cash::CashDrawerSession> for RpcCashSession {
    fn from(session: &shiftledger_core::cash::CashDrawerSession) -> Self {
        Self {
            id: session.id,
            time_entry_id: session.time_entry_id,
            employee_id: session.employee_id,
            start_cash_cents: session.start_cash_cents,
            start_counted_at: session.start_counted_at,
            start_count_source: session.start_count_source,
            end_cash_cents: session.end_cash_cents,
            end_counted_at: session.end_counted_at,
            collected_cash_cents: session.collected_cash_cents,
            drop_amount_cents: session.drop_amount_cents,
            beverages_cash_cents: session.beverages_cash_cents,
            delta_cents: session.delta_cents,
            status: session.status,
            reviewed_by: session.reviewed_by,
            review_note: session.review_note.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RpcCashFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub employee_id: Option<UserId>,
    pub status: Option<CashStatus>,
    #[serde(default)]
    pub skip: usize,
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcCashPage {
    pub items: Vec<RpcCashSession>,
    pub total: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcCashEdit {
    pub start_cash_cents: Option<i64>,
    pub end_cash_cents: Option<i64>,
    pub reason: String,
}

pub type RpcCashSummary = CashSummary;
pub type RpcCashExportRow = CashExportRow;

// ── Shifts ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcShift {
    pub id: ShiftId,
    pub employee_id: UserId,
    pub shift_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_minutes: i64,
    pub status: ShiftStatus,
    pub notes: Option<String>,
    pub job_role: Option<String>,
    pub template_id: Option<TemplateId>,
    pub series_id: Option<SeriesId>,
    pub requires_approval: bool,
    pub approved_by: Option<UserId>,
}

impl From<&Shift> for RpcShift {
    fn from(shift: &Shift) -> Self {
        Self {
            id: shift.id,
            employee_id: shift.employee_id,
            shift_date: shift.shift_date,
            start_time: shift.start_time,
            end_time: shift.end_time,
            break_minutes: shift.break_minutes,
            status: shift.status,
            notes: shift.notes.clone(),
            job_role: shift.job_role.clone(),
            template_id: shift.template_id,
            series_id: shift.series_id,
            requires_approval: shift.requires_approval,
            approved_by: shift.approved_by,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcShiftCreate {
    pub employee_id: UserId,
    pub shift_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub break_minutes: i64,
    pub notes: Option<String>,
    pub job_role: Option<String>,
    #[serde(default)]
    pub requires_approval: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RpcShiftUpdate {
    pub shift_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub break_minutes: Option<i64>,
    pub notes: Option<String>,
    pub job_role: Option<String>,
    pub status: Option<ShiftStatus>,
    pub requires_approval: Option<bool>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RpcShiftFilter {
    pub employee_id: Option<UserId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<ShiftStatus>,
    #[serde(default)]
    pub skip: usize,
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcShiftPage {
    pub items: Vec<RpcShift>,
    pub total: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcShiftWithConflicts {
    pub shift: RpcShift,
    pub conflicts: Vec<ShiftConflict>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcTemplate {
    pub id: TemplateId,
    pub name: String,
    pub template_type: TemplateType,
    pub day_of_week: Option<u8>,
    pub day_of_month: Option<u8>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_minutes: i64,
    pub is_active: bool,
}

impl From<&ShiftTemplate> for RpcTemplate {
    fn from(template: &ShiftTemplate) -> Self {
        Self {
            id: template.id,
            name: template.name.clone(),
            template_type: template.template_type,
            day_of_week: template.day_of_week,
            day_of_month: template.day_of_month,
            start_date: template.start_date,
            end_date: template.end_date,
            start_time: template.start_time,
            end_time: template.end_time,
            break_minutes: template.break_minutes,
            is_active: template.is_active,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcTemplateCreate {
    pub name: String,
    pub description: Option<String>,
    pub employee_id: Option<UserId>,
    pub department: Option<String>,
    pub job_role: Option<String>,
    pub template_type: TemplateType,
    pub day_of_week: Option<u8>,
    pub day_of_month: Option<u8>,
    pub week_of_month: Option<u8>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub break_minutes: i64,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcGenerateFromTemplate {
    pub template_id: TemplateId,
    #[serde(default)]
    pub employee_ids: Vec<UserId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcGeneratedShifts {
    pub shifts: Vec<RpcShift>,
    pub conflicts: Vec<ShiftConflict>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcBulkWeek {
    pub employee_id: UserId,
    pub week_start_date: NaiveDate,
    pub mode: shiftledger_schedule::BulkMode,
    pub template: shiftledger_schedule::WeekTemplate,
    pub days: std::collections::BTreeMap<String, shiftledger_schedule::DayPlan>,
    pub conflict_policy: shiftledger_schedule::ConflictPolicy,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcBulkPreview {
    pub shifts: Vec<PreviewShift>,
    pub conflicts: Vec<ShiftConflict>,
}

pub type RpcBulkResult = BulkWeekResult;

// ── Payroll ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcGeneratePayroll {
    pub payroll_type: PayrollType,
    pub start_date: NaiveDate,
    pub employee_ids: Option<Vec<UserId>>,
    #[serde(default)]
    pub include_inactive: bool,
    #[serde(default)]
    pub allow_duplicate: bool,
    #[serde(default)]
    pub strict: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcRun {
    pub id: RunId,
    pub payroll_type: PayrollType,
    pub period_start_date: NaiveDate,
    pub period_end_date: NaiveDate,
    pub timezone: String,
    pub status: RunStatus,
    pub generated_at: DateTime<Utc>,
    pub total_regular_hours: Decimal,
    pub total_overtime_hours: Decimal,
    pub total_gross_pay_cents: i64,
    pub warning: Option<String>,
}

impl From<&PayrollRun> for RpcRun {
    fn from(run: &PayrollRun) -> Self {
        Self {
            id: run.id,
            payroll_type: run.payroll_type,
            period_start_date: run.period_start_date,
            period_end_date: run.period_end_date,
            timezone: run.timezone.clone(),
            status: run.status,
            generated_at: run.generated_at,
            total_regular_hours: run.total_regular_hours,
            total_overtime_hours: run.total_overtime_hours,
            total_gross_pay_cents: run.total_gross_pay_cents,
            warning: run.warning.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcLineItem {
    pub employee_id: UserId,
    pub regular_minutes: i64,
    pub overtime_minutes: i64,
    pub total_minutes: i64,
    pub pay_rate_cents: i64,
    pub overtime_multiplier: Decimal,
    pub regular_pay_cents: i64,
    pub overtime_pay_cents: i64,
    pub total_pay_cents: i64,
    pub exceptions_count: u32,
    pub details: LineItemDetails,
}

impl From<&PayrollLineItem> for RpcLineItem {
    fn from(item: &PayrollLineItem) -> Self {
        Self {
            employee_id: item.employee_id,
            regular_minutes: item.regular_minutes,
            overtime_minutes: item.overtime_minutes,
            total_minutes: item.total_minutes,
            pay_rate_cents: item.pay_rate_cents,
            overtime_multiplier: item.overtime_multiplier,
            regular_pay_cents: item.regular_pay_cents,
            overtime_pay_cents: item.overtime_pay_cents,
            total_pay_cents: item.total_pay_cents,
            exceptions_count: item.exceptions_count,
            details: item.details.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcRunDetail {
    pub run: RpcRun,
    pub line_items: Vec<RpcLineItem>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RpcRunFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<RunStatus>,
    pub payroll_type: Option<PayrollType>,
    #[serde(default)]
    pub skip: usize,
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcRunPage {
    pub items: Vec<RpcRun>,
    pub total: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcMyPayrollItem {
    pub run: RpcRun,
    pub line_item: RpcLineItem,
}

pub type RpcPayrollExportRow = shiftledger_payroll::PayrollExportRow;

// ── Leave ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcLeave {
    pub id: LeaveRequestId,
    pub employee_id: UserId,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub partial_day_hours: Option<Decimal>,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub review_comment: Option<String>,
}

impl From<&LeaveRequest> for RpcLeave {
    fn from(request: &LeaveRequest) -> Self {
        Self {
            id: request.id,
            employee_id: request.employee_id,
            leave_type: request.leave_type,
            start_date: request.start_date,
            end_date: request.end_date,
            partial_day_hours: request.partial_day_hours,
            reason: request.reason.clone(),
            status: request.status,
            review_comment: request.review_comment.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcLeaveCreate {
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub partial_day_hours: Option<Decimal>,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcLeavePage {
    pub items: Vec<RpcLeave>,
    pub total: usize,
}

// ── Health ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcHealth {
    pub status: String,
    pub version: String,
}
