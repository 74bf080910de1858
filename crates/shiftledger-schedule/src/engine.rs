//! Single-shift CRUD with conflict detection.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};

use shiftledger_core::clock::Clock;
use shiftledger_core::company::Company;
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::shift::{Shift, ShiftStatus};
use shiftledger_core::types::{ShiftId, UserId};
use shiftledger_core::user::User;
use shiftledger_store::Store;

use crate::overlap::{shift_in_window, shifts_overlap, ShiftConflict};

#[derive(Clone, Debug)]
pub struct ShiftCreate {
    pub employee_id: UserId,
    pub shift_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_minutes: i64,
    pub notes: Option<String>,
    pub job_role: Option<String>,
    pub requires_approval: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ShiftUpdate {
    pub shift_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub break_minutes: Option<i64>,
    pub notes: Option<String>,
    pub job_role: Option<String>,
    pub status: Option<ShiftStatus>,
    pub requires_approval: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct ShiftFilter {
    pub employee_id: Option<UserId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<ShiftStatus>,
}

pub struct ScheduleService {
    pub(crate) store: Arc<Store>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl ScheduleService {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn require_schedulable_employee(
        &self,
        company: &Company,
        employee_id: UserId,
    ) -> Result<User, ShiftledgerError> {
        self.store
            .get_user(&employee_id)?
            .filter(|u| u.company_id == company.id && u.role.is_punch_eligible())
            .ok_or_else(|| ShiftledgerError::EmployeeNotFound(employee_id.to_string()))
    }

    /// Conflicts between a candidate shift and the employee's existing
    /// non-cancelled shifts.
    ///
    /// Fetches the adjacent days as well so overnight shifts on either side
    /// of the candidate date are tested.
    pub fn detect_conflicts(
        &self,
        company: &Company,
        employee_id: UserId,
        shift_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        exclude: Option<ShiftId>,
    ) -> Result<Vec<ShiftConflict>, ShiftledgerError> {
        let nearby = [
            shift_date - Duration::days(1),
            shift_date,
            shift_date + Duration::days(1),
        ];
        let employee_name = self
            .store
            .get_user(&employee_id)?
            .map(|u| u.name)
            .unwrap_or_default();

        let mut conflicts = Vec::new();
        for existing in self.store.iter_employee_shifts(&company.id, &employee_id)? {
            if existing.status == ShiftStatus::Cancelled {
                continue;
            }
            if Some(existing.id) == exclude {
                continue;
            }
            if !nearby.contains(&existing.shift_date) {
                continue;
            }
            if shifts_overlap(
                shift_date,
                start_time,
                end_time,
                existing.shift_date,
                existing.start_time,
                existing.end_time,
            ) {
                conflicts.push(ShiftConflict {
                    conflicting_shift_id: existing.id,
                    conflicting_shift_date: existing.shift_date,
                    conflicting_start_time: existing.start_time,
                    conflicting_end_time: existing.end_time,
                    employee_id,
                    employee_name: employee_name.clone(),
                    message: format!(
                        "overlaps existing shift on {} ({} - {})",
                        existing.shift_date, existing.start_time, existing.end_time
                    ),
                });
            }
        }
        Ok(conflicts)
    }

    /// Create a shift. Conflicts are reported but do not block the save —
    /// the admin may override; the response carries them for the UI.
    pub fn create(
        &self,
        company: &Company,
        data: ShiftCreate,
        created_by: Option<UserId>,
    ) -> Result<(Shift, Vec<ShiftConflict>), ShiftledgerError> {
        let employee = self.require_schedulable_employee(company, data.employee_id)?;
        if data.break_minutes < 0 {
            return Err(ShiftledgerError::Validation(
                "break minutes cannot be negative".to_string(),
            ));
        }

        let conflicts = self.detect_conflicts(
            company,
            employee.id,
            data.shift_date,
            data.start_time,
            data.end_time,
            None,
        )?;

        let now = self.clock.now();
        let shift = Shift {
            id: ShiftId::generate(),
            company_id: company.id,
            employee_id: employee.id,
            shift_date: data.shift_date,
            start_time: data.start_time,
            end_time: data.end_time,
            break_minutes: data.break_minutes,
            status: ShiftStatus::Draft,
            notes: data.notes,
            job_role: data.job_role,
            template_id: None,
            series_id: None,
            requires_approval: data.requires_approval,
            approved_by: None,
            approved_at: None,
            created_by,
            created_at: now,
            updated_at: now,
        };
        self.store.put_shift(&shift)?;
        Ok((shift, conflicts))
    }

    pub fn update(
        &self,
        company: &Company,
        shift_id: ShiftId,
        data: ShiftUpdate,
    ) -> Result<(Shift, Vec<ShiftConflict>), ShiftledgerError> {
        let mut shift = self.require_shift(company, shift_id)?;

        let new_date = data.shift_date.unwrap_or(shift.shift_date);
        let new_start = data.start_time.unwrap_or(shift.start_time);
        let new_end = data.end_time.unwrap_or(shift.end_time);

        let conflicts = self.detect_conflicts(
            company,
            shift.employee_id,
            new_date,
            new_start,
            new_end,
            Some(shift_id),
        )?;

        shift.shift_date = new_date;
        shift.start_time = new_start;
        shift.end_time = new_end;
        if let Some(break_minutes) = data.break_minutes {
            if break_minutes < 0 {
                return Err(ShiftledgerError::Validation(
                    "break minutes cannot be negative".to_string(),
                ));
            }
            shift.break_minutes = break_minutes;
        }
        if let Some(notes) = data.notes {
            shift.notes = Some(notes);
        }
        if let Some(job_role) = data.job_role {
            shift.job_role = Some(job_role);
        }
        if let Some(status) = data.status {
            shift.status = status;
        }
        if let Some(requires_approval) = data.requires_approval {
            shift.requires_approval = requires_approval;
        }
        shift.updated_at = self.clock.now();

        self.store.put_shift(&shift)?;
        Ok((shift, conflicts))
    }

    pub fn get(&self, company: &Company, shift_id: ShiftId) -> Result<Shift, ShiftledgerError> {
        self.require_shift(company, shift_id)
    }

    fn require_shift(
        &self,
        company: &Company,
        shift_id: ShiftId,
    ) -> Result<Shift, ShiftledgerError> {
        self.store
            .get_shift(&shift_id)?
            .filter(|s| s.company_id == company.id)
            .ok_or_else(|| ShiftledgerError::ShiftNotFound(shift_id.to_string()))
    }

    /// List shifts; newest date first, then by start time.
    ///
    /// A date filter widens the fetch by one day on each side to catch
    /// overnight spills, then re-applies the window predicate so only
    /// genuinely intersecting shifts are returned.
    pub fn list(
        &self,
        company: &Company,
        filter: &ShiftFilter,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<Shift>, usize), ShiftledgerError> {
        let mut shifts = Vec::new();
        for shift in self.store.iter_company_shifts(&company.id)? {
            match filter.status {
                Some(status) => {
                    if shift.status != status {
                        continue;
                    }
                }
                None => {
                    if shift.status == ShiftStatus::Cancelled {
                        continue;
                    }
                }
            }
            if let Some(employee_id) = filter.employee_id {
                if shift.employee_id != employee_id {
                    continue;
                }
            }
            if filter.start_date.is_some() || filter.end_date.is_some() {
                let widened_start = filter
                    .start_date
                    .map(|d| d - Duration::days(1))
                    .unwrap_or(NaiveDate::MIN);
                let widened_end = filter
                    .end_date
                    .map(|d| d + Duration::days(1))
                    .unwrap_or(NaiveDate::MAX);
                if shift.shift_date < widened_start || shift.shift_date > widened_end {
                    continue;
                }
                // Strict re-filter after the widened fetch.
                let window_start = filter.start_date.unwrap_or(NaiveDate::MIN);
                let window_end = filter.end_date.unwrap_or(NaiveDate::MAX);
                if !shift_in_window(
                    shift.shift_date,
                    shift.start_time,
                    shift.end_time,
                    window_start,
                    window_end,
                ) {
                    continue;
                }
            }
            shifts.push(shift);
        }
        shifts.sort_by(|a, b| {
            b.shift_date
                .cmp(&a.shift_date)
                .then(a.start_time.cmp(&b.start_time))
        });
        let total = shifts.len();
        Ok((shifts.into_iter().skip(skip).take(limit).collect(), total))
    }

    pub fn approve(
        &self,
        company: &Company,
        shift_id: ShiftId,
        approved_by: UserId,
    ) -> Result<Shift, ShiftledgerError> {
        let mut shift = self.require_shift(company, shift_id)?;
        shift.status = ShiftStatus::Approved;
        shift.approved_by = Some(approved_by);
        shift.approved_at = Some(self.clock.now());
        shift.updated_at = self.clock.now();
        self.store.put_shift(&shift)?;
        Ok(shift)
    }

    pub fn delete(&self, company: &Company, shift_id: ShiftId) -> Result<(), ShiftledgerError> {
        let shift = self.require_shift(company, shift_id)?;
        self.store.delete_shift(&shift.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shiftledger_core::clock::FixedClock;
    use shiftledger_core::company::CompanySettings;
    use shiftledger_core::types::CompanyId;
    use shiftledger_core::user::{PayRateType, Role, UserStatus};

    fn temp_store(name: &str) -> Arc<Store> {
        let dir = std::env::temp_dir().join(format!("shiftledger_schedule_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        Arc::new(Store::open(&dir).expect("open temp store"))
    }

    fn company() -> Company {
        Company {
            id: CompanyId::generate(),
            name: "Demo".to_string(),
            slug: "demo".to_string(),
            kiosk_enabled: true,
            settings: CompanySettings::default(),
            created_at: Utc::now(),
        }
    }

    fn employee(company: &Company) -> User {
        let now = Utc::now();
        User {
            id: UserId::generate(),
            company_id: company.id,
            name: "Night Owl".to_string(),
            email: "owl@example.com".to_string(),
            password_hash: String::new(),
            pin_hash: None,
            role: Role::Frontdesk,
            status: UserStatus::Active,
            job_role: None,
            pay_rate_cents: 2_000,
            pay_rate_type: PayRateType::Hourly,
            overtime_multiplier: None,
            email_verified: true,
            verification_required: false,
            last_verified_at: Some(now),
            verification_pin_hash: None,
            verification_expires_at: None,
            verification_attempts: 0,
            last_verification_sent_at: None,
            password_reset_otp_hash: None,
            password_reset_otp_expires_at: None,
            password_reset_attempts: 0,
            last_password_reset_sent_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn svc(store: Arc<Store>) -> ScheduleService {
        ScheduleService::new(store, Arc::new(FixedClock::new(Utc::now())))
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn create(day: u32, start: NaiveTime, end: NaiveTime, employee_id: UserId) -> ShiftCreate {
        ShiftCreate {
            employee_id,
            shift_date: d(day),
            start_time: start,
            end_time: end,
            break_minutes: 0,
            notes: None,
            job_role: None,
            requires_approval: false,
        }
    }

    #[test]
    fn overnight_conflict_detected_across_dates() {
        let store = temp_store("overnight");
        let company = company();
        store.insert_company(&company).unwrap();
        let emp = employee(&company);
        store.insert_user(&emp).unwrap();
        let svc = svc(store);

        // Existing overnight shift 2025-06-16 22:00–06:00.
        let (_, conflicts) = svc
            .create(&company, create(16, t(22, 0), t(6, 0), emp.id), None)
            .unwrap();
        assert!(conflicts.is_empty());

        // Candidate 2025-06-17 04:00–12:00 must conflict.
        let (_, conflicts) = svc
            .create(&company, create(17, t(4, 0), t(12, 0), emp.id), None)
            .unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflicting_shift_date, d(16));
    }

    #[test]
    fn cancelled_shifts_do_not_conflict() {
        let store = temp_store("cancelled");
        let company = company();
        store.insert_company(&company).unwrap();
        let emp = employee(&company);
        store.insert_user(&emp).unwrap();
        let svc = svc(store);

        let (shift, _) = svc
            .create(&company, create(16, t(9, 0), t(17, 0), emp.id), None)
            .unwrap();
        svc.update(
            &company,
            shift.id,
            ShiftUpdate {
                status: Some(ShiftStatus::Cancelled),
                ..ShiftUpdate::default()
            },
        )
        .unwrap();

        let (_, conflicts) = svc
            .create(&company, create(16, t(9, 0), t(17, 0), emp.id), None)
            .unwrap();
        assert!(conflicts.is_empty());
    }

    #[test]
    fn update_excludes_itself_from_conflicts() {
        let store = temp_store("exclude_self");
        let company = company();
        store.insert_company(&company).unwrap();
        let emp = employee(&company);
        store.insert_user(&emp).unwrap();
        let svc = svc(store);

        let (shift, _) = svc
            .create(&company, create(16, t(9, 0), t(17, 0), emp.id), None)
            .unwrap();
        let (_, conflicts) = svc
            .update(
                &company,
                shift.id,
                ShiftUpdate {
                    start_time: Some(t(10, 0)),
                    ..ShiftUpdate::default()
                },
            )
            .unwrap();
        assert!(conflicts.is_empty());
    }

    #[test]
    fn list_window_returns_overnight_spill_only_when_it_intersects() {
        let store = temp_store("list_window");
        let company = company();
        store.insert_company(&company).unwrap();
        let emp = employee(&company);
        store.insert_user(&emp).unwrap();
        let svc = svc(store);

        svc.create(&company, create(16, t(22, 0), t(6, 0), emp.id), None)
            .unwrap();
        svc.create(&company, create(15, t(9, 0), t(17, 0), emp.id), None)
            .unwrap();

        // Window covering only the 17th: the overnight spill counts, the
        // plain shift on the 15th does not (despite the widened fetch).
        let (shifts, total) = svc
            .list(
                &company,
                &ShiftFilter {
                    start_date: Some(d(17)),
                    end_date: Some(d(17)),
                    ..ShiftFilter::default()
                },
                0,
                50,
            )
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(shifts[0].shift_date, d(16));
    }

    #[test]
    fn scheduling_admins_is_rejected() {
        let store = temp_store("admin_shift");
        let company = company();
        store.insert_company(&company).unwrap();
        let mut admin = employee(&company);
        admin.role = Role::Admin;
        store.insert_user(&admin).unwrap();
        let svc = svc(store);

        assert!(matches!(
            svc.create(&company, create(16, t(9, 0), t(17, 0), admin.id), None),
            Err(ShiftledgerError::EmployeeNotFound(_))
        ));
    }
}
