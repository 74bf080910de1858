//! Payroll run generation and lifecycle.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use shiftledger_core::audit::AuditLog;
use shiftledger_core::clock::Clock;
use shiftledger_core::company::Company;
use shiftledger_core::constants::EXPORT_ROW_CAP;
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::payroll::{
    PayrollLineItem, PayrollRun, PayrollType, RunStatus,
};
use shiftledger_core::time_entry::TimeEntry;
use shiftledger_core::types::{LineItemId, RunId, UserId};
use shiftledger_core::tz;
use shiftledger_core::user::User;
use shiftledger_store::Store;

use crate::math::compute_pay_cents;
use crate::period::resolve_period;
use crate::weeks::compute_weekly_blocks;

#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub payroll_type: PayrollType,
    pub start_date: NaiveDate,
    /// Restrict to these employees; `None` means everyone eligible.
    pub employee_ids: Option<Vec<UserId>>,
    pub include_inactive: bool,
    pub allow_duplicate: bool,
    pub strict: bool,
}

#[derive(Clone, Debug, Default)]
pub struct RunFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<RunStatus>,
    pub payroll_type: Option<PayrollType>,
}

/// One flat export row per line item.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayrollExportRow {
    pub employee_id: UserId,
    pub employee_name: String,
    pub regular_minutes: i64,
    pub overtime_minutes: i64,
    pub total_minutes: i64,
    pub pay_rate_cents: i64,
    pub regular_pay_cents: i64,
    pub overtime_pay_cents: i64,
    pub total_pay_cents: i64,
    pub exceptions_count: u32,
}

pub struct PayrollEngine {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
}

impl PayrollEngine {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Entries potentially overlapping the period, in company-local terms:
    /// `clock_in ≤ period_end_utc` and (`open` or `clock_out ≥ period_start_utc`).
    fn fetch_entries(
        &self,
        company: &Company,
        employee_id: &UserId,
        period_start: NaiveDate,
        period_end: NaiveDate,
        zone: chrono_tz::Tz,
    ) -> Result<Vec<TimeEntry>, ShiftledgerError> {
        let (start_utc, end_utc) = tz::utc_range_for_local_dates(zone, period_start, period_end);
        let mut entries: Vec<_> = self
            .store
            .iter_employee_entries(&company.id, employee_id)?
            .into_iter()
            .filter(|e| {
                e.clock_in_at <= end_utc
                    && e.clock_out_at.map_or(true, |out| out >= start_utc)
            })
            .collect();
        entries.sort_by_key(|e| e.clock_in_at);
        Ok(entries)
    }

    fn eligible_employees(
        &self,
        company: &Company,
        request: &GenerateRequest,
    ) -> Result<Vec<User>, ShiftledgerError> {
        let mut employees: Vec<_> = self
            .store
            .iter_company_users(&company.id)?
            .into_iter()
            .filter(|u| u.role.is_punch_eligible())
            .filter(|u| request.include_inactive || u.is_active())
            .filter(|u| match &request.employee_ids {
                Some(ids) => ids.contains(&u.id),
                None => true,
            })
            .collect();
        employees.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(employees)
    }

    /// Generate a DRAFT run with one line item per eligible employee.
    pub fn generate(
        &self,
        company: &Company,
        request: &GenerateRequest,
        actor: UserId,
    ) -> Result<(PayrollRun, Vec<PayrollLineItem>), ShiftledgerError> {
        let settings = &company.settings;
        let zone = tz::parse_timezone(&settings.timezone)?;
        let period =
            resolve_period(request.payroll_type, request.start_date, settings, request.strict)?;

        // A non-VOID run for the same period blocks regeneration.
        if !request.allow_duplicate {
            let duplicate = self.store.iter_company_runs(&company.id)?.into_iter().any(|r| {
                r.payroll_type == request.payroll_type
                    && r.period_start_date == period.start
                    && r.period_end_date == period.end
                    && r.status != RunStatus::Void
            });
            if duplicate {
                return Err(ShiftledgerError::DuplicatePayrollPeriod {
                    start: period.start,
                    end: period.end,
                });
            }
        }

        let employees = self.eligible_employees(company, request)?;
        if employees.is_empty() {
            return Err(ShiftledgerError::Validation(
                "no employees found for payroll generation".to_string(),
            ));
        }

        let now = self.clock.now();
        let run_id = RunId::generate();

        let mut items = Vec::new();
        let mut total_regular_hours = Decimal::ZERO;
        let mut total_overtime_hours = Decimal::ZERO;
        let mut total_gross_pay_cents = 0i64;
        let sixty = Decimal::from(60);

        for employee in &employees {
            // No rate, no line item.
            if employee.pay_rate_cents <= 0 {
                continue;
            }
            let multiplier = employee
                .overtime_multiplier
                .unwrap_or(settings.overtime_multiplier_default);

            let entries =
                self.fetch_entries(company, &employee.id, period.start, period.end, zone)?;
            let split =
                compute_weekly_blocks(&entries, period.start, period.end, settings, zone);

            let total_minutes = split.regular_minutes + split.overtime_minutes;
            let (regular_pay_cents, overtime_pay_cents, total_pay_cents) = compute_pay_cents(
                split.regular_minutes,
                split.overtime_minutes,
                employee.pay_rate_cents,
                multiplier,
            );

            total_regular_hours += Decimal::from(split.regular_minutes) / sixty;
            total_overtime_hours += Decimal::from(split.overtime_minutes) / sixty;
            total_gross_pay_cents += total_pay_cents;

            items.push(PayrollLineItem {
                id: LineItemId::generate(),
                payroll_run_id: run_id,
                company_id: company.id,
                employee_id: employee.id,
                regular_minutes: split.regular_minutes,
                overtime_minutes: split.overtime_minutes,
                total_minutes,
                pay_rate_cents: employee.pay_rate_cents,
                overtime_multiplier: multiplier,
                regular_pay_cents,
                overtime_pay_cents,
                total_pay_cents,
                exceptions_count: split.exceptions_count,
                details: split.details,
            });
        }

        let run = PayrollRun {
            id: run_id,
            company_id: company.id,
            payroll_type: request.payroll_type,
            period_start_date: period.start,
            period_end_date: period.end,
            timezone: settings.timezone.clone(),
            status: RunStatus::Draft,
            generated_by: actor,
            generated_at: now,
            total_regular_hours: total_regular_hours.round_dp(2),
            total_overtime_hours: total_overtime_hours.round_dp(2),
            total_gross_pay_cents,
            warning: period.warning,
            updated_at: now,
        };

        self.store.put_run(&run)?;
        for item in &items {
            self.store.put_line_item(item)?;
        }
        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(actor),
            "PAYROLL_GENERATE",
            "payroll_run",
            run.id,
            json!({
                "payroll_type": request.payroll_type.as_str(),
                "period_start": period.start,
                "period_end": period.end,
                "employee_count": employees.len(),
            }),
            now,
        ))?;

        info!(
            company = %company.id,
            run = %run.id,
            items = items.len(),
            gross_cents = total_gross_pay_cents,
            "payroll generated"
        );
        Ok((run, items))
    }

    pub fn get(
        &self,
        company: &Company,
        run_id: RunId,
    ) -> Result<(PayrollRun, Vec<PayrollLineItem>), ShiftledgerError> {
        let run = self.require_run(company, run_id)?;
        let items = self.store.iter_run_items(&run_id)?;
        Ok((run, items))
    }

    fn require_run(&self, company: &Company, run_id: RunId) -> Result<PayrollRun, ShiftledgerError> {
        self.store
            .get_run(&run_id)?
            .filter(|r| r.company_id == company.id)
            .ok_or_else(|| ShiftledgerError::RunNotFound(run_id.to_string()))
    }

    /// Newest period first.
    pub fn list(
        &self,
        company: &Company,
        filter: &RunFilter,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<PayrollRun>, usize), ShiftledgerError> {
        let mut runs: Vec<_> = self
            .store
            .iter_company_runs(&company.id)?
            .into_iter()
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .filter(|r| filter.payroll_type.map_or(true, |t| r.payroll_type == t))
            .filter(|r| filter.from.map_or(true, |d| r.period_start_date >= d))
            .filter(|r| filter.to.map_or(true, |d| r.period_end_date <= d))
            .collect();
        runs.sort_by(|a, b| b.period_start_date.cmp(&a.period_start_date));
        let total = runs.len();
        Ok((runs.into_iter().skip(skip).take(limit).collect(), total))
    }

    /// DRAFT → FINALIZED. Terminal for editing.
    pub fn finalize(
        &self,
        company: &Company,
        run_id: RunId,
        actor: UserId,
        note: Option<String>,
    ) -> Result<PayrollRun, ShiftledgerError> {
        let mut run = self.require_run(company, run_id)?;
        match run.status {
            RunStatus::Finalized => return Err(ShiftledgerError::RunAlreadyFinalized),
            RunStatus::Void => return Err(ShiftledgerError::RunVoided),
            RunStatus::Draft => {}
        }
        let now = self.clock.now();
        run.status = RunStatus::Finalized;
        run.updated_at = now;
        self.store.put_run(&run)?;
        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(actor),
            "PAYROLL_FINALIZE",
            "payroll_run",
            run.id,
            match note {
                Some(note) => json!({ "note": note }),
                None => json!({}),
            },
            now,
        ))?;
        Ok(run)
    }

    /// DRAFT | FINALIZED → VOID. VOID never transitions back.
    pub fn void(
        &self,
        company: &Company,
        run_id: RunId,
        actor: UserId,
        reason: String,
    ) -> Result<PayrollRun, ShiftledgerError> {
        let mut run = self.require_run(company, run_id)?;
        if run.status == RunStatus::Void {
            return Err(ShiftledgerError::RunVoided);
        }
        let now = self.clock.now();
        run.status = RunStatus::Void;
        run.updated_at = now;
        self.store.put_run(&run)?;
        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(actor),
            "PAYROLL_VOID",
            "payroll_run",
            run.id,
            json!({ "reason": reason }),
            now,
        ))?;
        Ok(run)
    }

    /// Only DRAFT runs can be deleted; line items cascade.
    pub fn delete(
        &self,
        company: &Company,
        run_id: RunId,
        actor: UserId,
    ) -> Result<(), ShiftledgerError> {
        let run = self.require_run(company, run_id)?;
        if run.status != RunStatus::Draft {
            return Err(ShiftledgerError::RunNotDraft);
        }
        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(actor),
            "PAYROLL_DELETE",
            "payroll_run",
            run.id,
            json!({
                "payroll_type": run.payroll_type.as_str(),
                "period_start": run.period_start_date,
                "period_end": run.period_end_date,
            }),
            self.clock.now(),
        ))?;
        self.store.delete_run(&run_id)
    }

    /// An employee's own line items across finalized and draft runs.
    pub fn items_for_employee(
        &self,
        company: &Company,
        employee_id: UserId,
    ) -> Result<Vec<(PayrollRun, PayrollLineItem)>, ShiftledgerError> {
        let mut result = Vec::new();
        for item in self.store.iter_employee_items(&company.id, &employee_id)? {
            if let Some(run) = self.store.get_run(&item.payroll_run_id)? {
                if run.status != RunStatus::Void {
                    result.push((run, item));
                }
            }
        }
        result.sort_by(|a, b| b.0.period_start_date.cmp(&a.0.period_start_date));
        Ok(result)
    }

    /// Flat per-employee rows for export rendering, capped.
    pub fn export_rows(
        &self,
        company: &Company,
        run_id: RunId,
    ) -> Result<Vec<PayrollExportRow>, ShiftledgerError> {
        let (_, items) = self.get(company, run_id)?;
        let mut rows = Vec::with_capacity(items.len().min(EXPORT_ROW_CAP));
        for item in items.into_iter().take(EXPORT_ROW_CAP) {
            let employee_name = self
                .store
                .get_user(&item.employee_id)?
                .map(|u| u.name)
                .unwrap_or_default();
            rows.push(PayrollExportRow {
                employee_id: item.employee_id,
                employee_name,
                regular_minutes: item.regular_minutes,
                overtime_minutes: item.overtime_minutes,
                total_minutes: item.total_minutes,
                pay_rate_cents: item.pay_rate_cents,
                regular_pay_cents: item.regular_pay_cents,
                overtime_pay_cents: item.overtime_pay_cents,
                total_pay_cents: item.total_pay_cents,
                exceptions_count: item.exceptions_count,
            });
        }
        Ok(rows)
    }
}
