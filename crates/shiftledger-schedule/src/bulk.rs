//! Bulk week creation for one employee: preview, then commit under a
//! selectable conflict policy. Every shift created by a single call is
//! stamped with a fresh series id.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::info;

use shiftledger_core::clock::Clock;
use shiftledger_core::company::Company;
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::shift::{Shift, ShiftStatus};
use shiftledger_core::types::{SeriesId, ShiftId, UserId};
use shiftledger_store::Store;

use crate::engine::ScheduleService;
use crate::overlap::ShiftConflict;

pub const DAY_KEYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkMode {
    SameEachDay,
    PerDay,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    Skip,
    Overwrite,
    Draft,
    Error,
}

/// Per-day switch, with time overrides used in `per_day` mode.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DayPlan {
    pub enabled: bool,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub break_minutes: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeekTemplate {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_minutes: i64,
    pub status: ShiftStatus,
    pub notes: Option<String>,
    pub job_role: Option<String>,
}

#[derive(Clone, Debug)]
pub struct BulkWeekRequest {
    pub employee_id: UserId,
    /// Normalized to the Monday of its week.
    pub week_start_date: NaiveDate,
    pub mode: BulkMode,
    pub template: WeekTemplate,
    /// Keyed mon..sun.
    pub days: BTreeMap<String, DayPlan>,
    pub conflict_policy: ConflictPolicy,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreviewShift {
    pub employee_id: UserId,
    pub employee_name: String,
    pub shift_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_minutes: i64,
    pub status: ShiftStatus,
    pub notes: Option<String>,
    pub job_role: Option<String>,
    pub has_conflict: bool,
    pub conflict: Option<ShiftConflict>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BulkWeekResult {
    pub created_count: usize,
    pub skipped_count: usize,
    pub overwritten_count: usize,
    pub created_shift_ids: Vec<ShiftId>,
    pub series_id: SeriesId,
    pub conflicts: Vec<ShiftConflict>,
}

/// Monday of the week containing `date`.
fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

impl ScheduleService {
    fn preview_candidates(
        &self,
        company: &Company,
        request: &BulkWeekRequest,
    ) -> Result<(Vec<PreviewShift>, Vec<ShiftConflict>), ShiftledgerError> {
        let employee = self.bulk_employee(company, request.employee_id)?;
        let week_start = monday_of(request.week_start_date);

        let mut previews = Vec::new();
        let mut conflicts = Vec::new();

        for (offset, key) in DAY_KEYS.iter().enumerate() {
            let Some(plan) = request.days.get(*key) else { continue };
            if !plan.enabled {
                continue;
            }
            let shift_date = week_start + Duration::days(offset as i64);

            let (start_time, end_time, break_minutes) = match request.mode {
                BulkMode::SameEachDay => (
                    request.template.start_time,
                    request.template.end_time,
                    request.template.break_minutes,
                ),
                BulkMode::PerDay => {
                    let (Some(start), Some(end)) = (plan.start_time, plan.end_time) else {
                        continue;
                    };
                    (
                        start,
                        end,
                        plan.break_minutes.unwrap_or(request.template.break_minutes),
                    )
                }
            };

            let found = self.detect_conflicts(
                company,
                employee.id,
                shift_date,
                start_time,
                end_time,
                None,
            )?;
            let conflict = found.into_iter().next();
            if let Some(c) = &conflict {
                conflicts.push(c.clone());
            }

            previews.push(PreviewShift {
                employee_id: employee.id,
                employee_name: employee.name.clone(),
                shift_date,
                start_time,
                end_time,
                break_minutes,
                status: request.template.status,
                notes: request.template.notes.clone(),
                job_role: request.template.job_role.clone(),
                has_conflict: conflict.is_some(),
                conflict,
            });
        }

        Ok((previews, conflicts))
    }

    fn bulk_employee(
        &self,
        company: &Company,
        employee_id: UserId,
    ) -> Result<shiftledger_core::user::User, ShiftledgerError> {
        self.store
            .get_user(&employee_id)?
            .filter(|u| u.company_id == company.id && u.role.is_punch_eligible())
            .ok_or_else(|| ShiftledgerError::EmployeeNotFound(employee_id.to_string()))
    }

    /// Identical to the create path, but persists nothing.
    pub fn preview_bulk_week(
        &self,
        company: &Company,
        request: &BulkWeekRequest,
    ) -> Result<(Vec<PreviewShift>, Vec<ShiftConflict>), ShiftledgerError> {
        self.preview_candidates(company, request)
    }

    pub fn create_bulk_week(
        &self,
        company: &Company,
        request: &BulkWeekRequest,
        created_by: UserId,
    ) -> Result<BulkWeekResult, ShiftledgerError> {
        let (previews, conflicts) = self.preview_candidates(company, request)?;

        if request.conflict_policy == ConflictPolicy::Error && !conflicts.is_empty() {
            return Err(ShiftledgerError::ScheduleConflicts(conflicts.len()));
        }

        let series_id = SeriesId::generate();
        let now = self.clock.now();
        let mut created_count = 0;
        let mut skipped_count = 0;
        let mut overwritten_count = 0;
        let mut created_shift_ids = Vec::new();

        for preview in previews {
            let mut status = preview.status;
            let mut notes = preview.notes.clone();

            if preview.has_conflict {
                match request.conflict_policy {
                    ConflictPolicy::Skip => {
                        skipped_count += 1;
                        continue;
                    }
                    ConflictPolicy::Overwrite => {
                        let doomed = self.detect_conflicts(
                            company,
                            preview.employee_id,
                            preview.shift_date,
                            preview.start_time,
                            preview.end_time,
                            None,
                        )?;
                        for conflict in doomed {
                            self.store.delete_shift(&conflict.conflicting_shift_id)?;
                            overwritten_count += 1;
                        }
                    }
                    ConflictPolicy::Draft => {
                        status = ShiftStatus::Draft;
                        let marker = "[Conflict detected on creation]";
                        notes = Some(match notes {
                            Some(existing) if !existing.is_empty() => {
                                format!("{existing}\n{marker}")
                            }
                            _ => marker.to_string(),
                        });
                    }
                    ConflictPolicy::Error => unreachable!("handled above"),
                }
            }

            let shift = Shift {
                id: ShiftId::generate(),
                company_id: company.id,
                employee_id: preview.employee_id,
                shift_date: preview.shift_date,
                start_time: preview.start_time,
                end_time: preview.end_time,
                break_minutes: preview.break_minutes,
                status,
                notes,
                job_role: preview.job_role.clone(),
                template_id: None,
                series_id: Some(series_id),
                requires_approval: false,
                approved_by: None,
                approved_at: None,
                created_by: Some(created_by),
                created_at: now,
                updated_at: now,
            };
            self.store.put_shift(&shift)?;
            created_shift_ids.push(shift.id);
            created_count += 1;
        }

        info!(
            company = %company.id,
            employee = %request.employee_id,
            series = %series_id,
            created = created_count,
            skipped = skipped_count,
            overwritten = overwritten_count,
            "bulk week created"
        );

        Ok(BulkWeekResult {
            created_count,
            skipped_count,
            overwritten_count,
            created_shift_ids,
            series_id,
            conflicts,
        })
    }
}
