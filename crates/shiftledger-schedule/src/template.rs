//! Recurring-template management and expansion into PUBLISHED shifts.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use tracing::info;

use shiftledger_core::clock::Clock;
use shiftledger_core::company::Company;
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::shift::{Shift, ShiftStatus, ShiftTemplate, TemplateType};
use shiftledger_core::types::{ShiftId, TemplateId, UserId};
use shiftledger_store::Store;

use crate::engine::ScheduleService;
use crate::overlap::ShiftConflict;

#[derive(Clone, Debug)]
pub struct TemplateCreate {
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
    pub break_minutes: i64,
    pub requires_approval: bool,
    pub is_active: bool,
}

pub struct TemplateService {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    schedule: ScheduleService,
}

/// Dates in `[from, to]` on which a template fires.
fn expansion_dates(template: &ShiftTemplate, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let start = from.max(template.start_date);
    let end = match template.end_date {
        Some(template_end) => to.min(template_end),
        None => to,
    };

    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        let fires = match template.template_type {
            TemplateType::None => current == template.start_date,
            TemplateType::Weekly => template
                .day_of_week
                .is_some_and(|dow| current.weekday().num_days_from_monday() == u32::from(dow)),
            TemplateType::Biweekly => {
                template.day_of_week.is_some_and(|dow| {
                    current.weekday().num_days_from_monday() == u32::from(dow)
                        && (current - template.start_date).num_days().rem_euclid(14) < 7
                })
            }
            TemplateType::Monthly => template
                .day_of_month
                .is_some_and(|dom| current.day() == u32::from(dom)),
        };
        if fires {
            dates.push(current);
        }
        current += Duration::days(1);
    }
    dates
}

impl TemplateService {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        let schedule = ScheduleService::new(store.clone(), clock.clone());
        Self { store, clock, schedule }
    }

    pub fn create(
        &self,
        company: &Company,
        data: TemplateCreate,
        created_by: Option<UserId>,
    ) -> Result<ShiftTemplate, ShiftledgerError> {
        if let Some(employee_id) = data.employee_id {
            self.store
                .get_user(&employee_id)?
                .filter(|u| u.company_id == company.id)
                .ok_or_else(|| ShiftledgerError::EmployeeNotFound(employee_id.to_string()))?;
        }
        match data.template_type {
            TemplateType::Weekly | TemplateType::Biweekly if data.day_of_week.is_none() => {
                return Err(ShiftledgerError::Validation(
                    "day_of_week is required for weekly templates".to_string(),
                ));
            }
            TemplateType::Monthly if data.day_of_month.is_none() => {
                return Err(ShiftledgerError::Validation(
                    "day_of_month is required for monthly templates".to_string(),
                ));
            }
            _ => {}
        }
        if let Some(dow) = data.day_of_week {
            if dow > 6 {
                return Err(ShiftledgerError::Validation(
                    "day_of_week must be 0-6 (0 = Monday)".to_string(),
                ));
            }
        }

        let template = ShiftTemplate {
            id: TemplateId::generate(),
            company_id: company.id,
            name: data.name,
            description: data.description,
            employee_id: data.employee_id,
            department: data.department,
            job_role: data.job_role,
            template_type: data.template_type,
            day_of_week: data.day_of_week,
            day_of_month: data.day_of_month,
            week_of_month: data.week_of_month,
            start_date: data.start_date,
            end_date: data.end_date,
            start_time: data.start_time,
            end_time: data.end_time,
            break_minutes: data.break_minutes,
            requires_approval: data.requires_approval,
            is_active: data.is_active,
            created_by,
            created_at: self.clock.now(),
        };
        self.store.put_template(&template)?;
        Ok(template)
    }

    /// Expand a template over `[start_date, end_date]` for the given
    /// employees (or the template's own target).
    ///
    /// Shifts are created PUBLISHED and stamped with the template id;
    /// conflicts are reported alongside, not blocking.
    pub fn generate(
        &self,
        company: &Company,
        template_id: TemplateId,
        employee_ids: Vec<UserId>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<(Vec<Shift>, Vec<ShiftConflict>), ShiftledgerError> {
        let template = self
            .store
            .get_template(&template_id)?
            .filter(|t| t.company_id == company.id && t.is_active)
            .ok_or_else(|| ShiftledgerError::TemplateNotFound(template_id.to_string()))?;

        let mut targets = employee_ids;
        if targets.is_empty() {
            if let Some(employee_id) = template.employee_id {
                targets.push(employee_id);
            }
        }
        if targets.is_empty() {
            return Err(ShiftledgerError::Validation(
                "no employees specified for shift generation".to_string(),
            ));
        }

        let dates = expansion_dates(&template, start_date, end_date);
        let now = self.clock.now();
        let mut created = Vec::new();
        let mut all_conflicts = Vec::new();

        for date in &dates {
            for employee_id in &targets {
                let conflicts = self.schedule.detect_conflicts(
                    company,
                    *employee_id,
                    *date,
                    template.start_time,
                    template.end_time,
                    None,
                )?;
                all_conflicts.extend(conflicts);

                let shift = Shift {
                    id: ShiftId::generate(),
                    company_id: company.id,
                    employee_id: *employee_id,
                    shift_date: *date,
                    start_time: template.start_time,
                    end_time: template.end_time,
                    break_minutes: template.break_minutes,
                    status: ShiftStatus::Published,
                    notes: None,
                    job_role: template.job_role.clone(),
                    template_id: Some(template.id),
                    series_id: None,
                    requires_approval: template.requires_approval,
                    approved_by: None,
                    approved_at: None,
                    created_by: template.created_by,
                    created_at: now,
                    updated_at: now,
                };
                self.store.put_shift(&shift)?;
                created.push(shift);
            }
        }

        info!(
            company = %company.id,
            template = %template.id,
            shifts = created.len(),
            conflicts = all_conflicts.len(),
            "template expanded"
        );
        Ok((created, all_conflicts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn template(
        template_type: TemplateType,
        start: NaiveDate,
        end: Option<NaiveDate>,
        day_of_week: Option<u8>,
        day_of_month: Option<u8>,
    ) -> ShiftTemplate {
        ShiftTemplate {
            id: TemplateId::generate(),
            company_id: shiftledger_core::types::CompanyId::generate(),
            name: "Night audit".to_string(),
            description: None,
            employee_id: None,
            department: None,
            job_role: None,
            template_type,
            day_of_week,
            day_of_month,
            week_of_month: None,
            start_date: start,
            end_date: end,
            start_time: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            break_minutes: 0,
            requires_approval: false,
            is_active: true,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    #[test]
    fn one_shot_fires_only_on_its_start_date() {
        let t = template(TemplateType::None, d(6, 18), None, None, None);
        assert_eq!(expansion_dates(&t, d(6, 1), d(6, 30)), vec![d(6, 18)]);
        assert!(expansion_dates(&t, d(7, 1), d(7, 31)).is_empty());
    }

    #[test]
    fn weekly_fires_on_the_configured_weekday() {
        // 2 = Wednesday (0 = Monday).
        let t = template(TemplateType::Weekly, d(6, 1), None, Some(2), None);
        assert_eq!(
            expansion_dates(&t, d(6, 1), d(6, 30)),
            vec![d(6, 4), d(6, 11), d(6, 18), d(6, 25)]
        );
    }

    #[test]
    fn biweekly_skips_alternate_weeks() {
        // Template anchored on Monday 2025-06-02, firing Mondays.
        let t = template(TemplateType::Biweekly, d(6, 2), None, Some(0), None);
        assert_eq!(
            expansion_dates(&t, d(6, 1), d(6, 30)),
            vec![d(6, 2), d(6, 16), d(6, 30)]
        );
    }

    #[test]
    fn monthly_fires_on_day_of_month() {
        let t = template(TemplateType::Monthly, d(1, 1), None, None, Some(15));
        assert_eq!(
            expansion_dates(&t, d(1, 1), d(3, 31)),
            vec![d(1, 15), d(2, 15), d(3, 15)]
        );
    }

    #[test]
    fn window_clamps_to_template_range() {
        let t = template(TemplateType::Weekly, d(6, 10), Some(d(6, 20)), Some(2), None);
        // Request window is wider; only Wednesdays within [10th, 20th] fire.
        assert_eq!(expansion_dates(&t, d(6, 1), d(6, 30)), vec![d(6, 11), d(6, 18)]);
    }
}
