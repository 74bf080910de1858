//! Admin and self-service operations on time entries: listing, manual
//! creation, edits, deletion. The punch transitions live in [`crate::punch`].

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;

use shiftledger_core::audit::AuditLog;
use shiftledger_core::clock::Clock;
use shiftledger_core::company::Company;
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::time_entry::{EntrySource, EntryStatus, PunchMeta, TimeEntry};
use shiftledger_core::types::{EntryId, UserId};
use shiftledger_core::tz;
use shiftledger_store::Store;

use crate::rounding::compute_paid_minutes;

#[derive(Clone, Debug, Default)]
pub struct EntryFilter {
    pub employee_id: Option<UserId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<EntryStatus>,
}

/// Fields an admin may change on an entry. A provided `clock_out_at` closes
/// an open entry.
#[derive(Clone, Debug, Default)]
pub struct EntryEdit {
    pub clock_in_at: Option<DateTime<Utc>>,
    pub clock_out_at: Option<DateTime<Utc>>,
    pub break_minutes: Option<i64>,
    pub note: Option<String>,
    pub reason: Option<String>,
}

pub struct TimeEntryService {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
}

impl TimeEntryService {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn in_local_range(
        company: &Company,
        at: DateTime<Utc>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<bool, ShiftledgerError> {
        if from.is_none() && to.is_none() {
            return Ok(true);
        }
        let zone = tz::parse_timezone(&company.settings.timezone)?;
        if let Some(from) = from {
            if at < tz::local_day_start_utc(zone, from) {
                return Ok(false);
            }
        }
        if let Some(to) = to {
            if at > tz::local_day_end_utc(zone, to) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Company-wide listing with filters; newest first.
    pub fn list(
        &self,
        company: &Company,
        filter: &EntryFilter,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<TimeEntry>, usize), ShiftledgerError> {
        let mut entries = Vec::new();
        for entry in self.store.iter_company_entries(&company.id)? {
            if let Some(employee_id) = filter.employee_id {
                if entry.employee_id != employee_id {
                    continue;
                }
            }
            if let Some(status) = filter.status {
                if entry.status != status {
                    continue;
                }
            }
            if !Self::in_local_range(company, entry.clock_in_at, filter.from, filter.to)? {
                continue;
            }
            entries.push(entry);
        }
        entries.sort_by(|a, b| b.clock_in_at.cmp(&a.clock_in_at));
        let total = entries.len();
        let page = entries.into_iter().skip(skip).take(limit).collect();
        Ok((page, total))
    }

    /// An employee's own entries.
    pub fn list_for_employee(
        &self,
        company: &Company,
        employee_id: UserId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<TimeEntry>, usize), ShiftledgerError> {
        let filter = EntryFilter {
            employee_id: Some(employee_id),
            from,
            to,
            status: None,
        };
        self.list(company, &filter, skip, limit)
    }

    /// Paid minutes for an entry under the company's current policy, for
    /// display alongside listings. Open entries have none.
    pub fn rounded_minutes(&self, company: &Company, entry: &TimeEntry) -> Option<i64> {
        entry.clock_out_at?;
        Some(compute_paid_minutes(
            entry.clock_in_at,
            entry.clock_out_at,
            entry.break_minutes,
            company.settings.rounding_policy,
            company.settings.breaks_paid,
        ))
    }

    /// Admin creation of an already-closed entry.
    pub fn create_manual(
        &self,
        company: &Company,
        employee_id: UserId,
        clock_in_at: DateTime<Utc>,
        clock_out_at: DateTime<Utc>,
        break_minutes: i64,
        note: Option<String>,
        actor: UserId,
    ) -> Result<TimeEntry, ShiftledgerError> {
        let employee = self
            .store
            .get_user(&employee_id)?
            .filter(|u| u.company_id == company.id && u.role.is_punch_eligible())
            .ok_or_else(|| ShiftledgerError::EmployeeNotFound(employee_id.to_string()))?;

        if clock_out_at <= clock_in_at {
            return Err(ShiftledgerError::Validation(
                "clock-out must be after clock-in".to_string(),
            ));
        }
        if break_minutes < 0 {
            return Err(ShiftledgerError::Validation(
                "break minutes cannot be negative".to_string(),
            ));
        }

        let now = self.clock.now();
        let entry = TimeEntry {
            id: EntryId::generate(),
            company_id: company.id,
            employee_id: employee.id,
            clock_in_at,
            clock_out_at: Some(clock_out_at),
            break_minutes,
            source: EntrySource::Web,
            status: EntryStatus::Closed,
            note,
            edited_by: Some(actor),
            edit_reason: None,
            clock_in_meta: PunchMeta::default(),
            clock_out_meta: PunchMeta::default(),
            created_at: now,
            updated_at: now,
        };
        self.store.put_entry(&entry)?;
        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(actor),
            "TIME_ENTRY_MANUAL_CREATE",
            "time_entry",
            entry.id,
            json!({
                "employee_id": employee.id.to_string(),
                "clock_in_at": clock_in_at,
                "clock_out_at": clock_out_at,
            }),
            now,
        ))?;
        Ok(entry)
    }

    /// Admin edit. The entry moves to `edited` status and the change is
    /// captured in the audit trail.
    pub fn edit(
        &self,
        company: &Company,
        entry_id: EntryId,
        editor: UserId,
        edit: EntryEdit,
    ) -> Result<TimeEntry, ShiftledgerError> {
        let mut entry = self
            .store
            .get_entry(&entry_id)?
            .filter(|e| e.company_id == company.id)
            .ok_or_else(|| ShiftledgerError::EntryNotFound(entry_id.to_string()))?;

        let was_open = entry.is_open();

        if let Some(clock_in_at) = edit.clock_in_at {
            entry.clock_in_at = clock_in_at;
        }
        if let Some(clock_out_at) = edit.clock_out_at {
            entry.clock_out_at = Some(clock_out_at);
        }
        if let Some(break_minutes) = edit.break_minutes {
            if break_minutes < 0 {
                return Err(ShiftledgerError::Validation(
                    "break minutes cannot be negative".to_string(),
                ));
            }
            entry.break_minutes = break_minutes;
        }
        if let Some(note) = edit.note.clone() {
            entry.note = Some(note);
        }

        if let Some(out) = entry.clock_out_at {
            if out < entry.clock_in_at {
                return Err(ShiftledgerError::Validation(
                    "clock-out must be after clock-in".to_string(),
                ));
            }
        }

        let now = self.clock.now();
        entry.edited_by = Some(editor);
        entry.edit_reason = edit.reason.clone();
        entry.status = EntryStatus::Edited;
        entry.updated_at = now;

        self.store.put_entry(&entry)?;
        if was_open && entry.clock_out_at.is_some() {
            self.store.release_open_entry(&company.id, &entry.employee_id)?;
        }
        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(editor),
            "TIME_ENTRY_EDITED",
            "time_entry",
            entry.id,
            json!({
                "clock_in_at": edit.clock_in_at,
                "clock_out_at": edit.clock_out_at,
                "break_minutes": edit.break_minutes,
                "reason": edit.reason,
            }),
            now,
        ))?;
        Ok(entry)
    }

    /// Admin deletion; removes the attached cash session as well.
    pub fn delete(
        &self,
        company: &Company,
        entry_id: EntryId,
        actor: UserId,
    ) -> Result<(), ShiftledgerError> {
        let entry = self
            .store
            .get_entry(&entry_id)?
            .filter(|e| e.company_id == company.id)
            .ok_or_else(|| ShiftledgerError::EntryNotFound(entry_id.to_string()))?;

        if entry.is_open() {
            self.store.release_open_entry(&company.id, &entry.employee_id)?;
        }
        if let Some(session) = self.store.cash_session_for_entry(&entry_id)? {
            self.store.delete_cash_session(&session)?;
        }
        self.store.delete_entry(&entry_id)?;
        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(actor),
            "TIME_ENTRY_DELETED",
            "time_entry",
            entry_id,
            json!({ "employee_id": entry.employee_id.to_string() }),
            self.clock.now(),
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shiftledger_core::clock::FixedClock;
    use shiftledger_core::company::CompanySettings;
    use shiftledger_core::types::CompanyId;
    use shiftledger_core::user::{PayRateType, Role, User, UserStatus};

    fn temp_store(name: &str) -> Arc<Store> {
        let dir = std::env::temp_dir().join(format!("shiftledger_entries_test_{name}"));
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
            name: "Pat".to_string(),
            email: "pat@example.com".to_string(),
            password_hash: String::new(),
            pin_hash: None,
            role: Role::Housekeeping,
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

    fn service(store: Arc<Store>) -> TimeEntryService {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 20, 12, 0, 0).unwrap(),
        ));
        TimeEntryService::new(store, clock)
    }

    #[test]
    fn manual_entry_requires_ordered_instants() {
        let store = temp_store("manual_order");
        let company = company();
        store.insert_company(&company).unwrap();
        let emp = employee(&company);
        store.insert_user(&emp).unwrap();
        let svc = service(store);

        let t1 = Utc.with_ymd_and_hms(2025, 6, 16, 14, 0, 0).unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 6, 16, 9, 0, 0).unwrap();
        assert!(svc
            .create_manual(&company, emp.id, t1, t0, 0, None, emp.id)
            .is_err());
        let entry = svc
            .create_manual(&company, emp.id, t0, t1, 30, None, emp.id)
            .unwrap();
        assert_eq!(entry.status, EntryStatus::Closed);
        assert_eq!(entry.break_minutes, 30);
    }

    #[test]
    fn edit_marks_entry_edited_and_frees_open_slot() {
        let store = temp_store("edit_open");
        let company = company();
        store.insert_company(&company).unwrap();
        let emp = employee(&company);
        store.insert_user(&emp).unwrap();

        // Seed an open entry the way the punch coordinator would.
        let t0 = Utc.with_ymd_and_hms(2025, 6, 16, 9, 0, 0).unwrap();
        let entry = TimeEntry {
            id: EntryId::generate(),
            company_id: company.id,
            employee_id: emp.id,
            clock_in_at: t0,
            clock_out_at: None,
            break_minutes: 0,
            source: EntrySource::Kiosk,
            status: EntryStatus::Open,
            note: None,
            edited_by: None,
            edit_reason: None,
            clock_in_meta: PunchMeta::default(),
            clock_out_meta: PunchMeta::default(),
            created_at: t0,
            updated_at: t0,
        };
        store.put_entry(&entry).unwrap();
        store.claim_open_entry(&company.id, &emp.id, &entry.id).unwrap();

        let svc = service(store.clone());
        let edited = svc
            .edit(
                &company,
                entry.id,
                emp.id,
                EntryEdit {
                    clock_out_at: Some(t0 + chrono::Duration::hours(8)),
                    reason: Some("forgot to clock out".to_string()),
                    ..EntryEdit::default()
                },
            )
            .unwrap();
        assert_eq!(edited.status, EntryStatus::Edited);
        assert!(store.open_entry_id(&company.id, &emp.id).unwrap().is_none());
    }

    #[test]
    fn listing_filters_by_local_date() {
        let store = temp_store("list_dates");
        let company = company();
        store.insert_company(&company).unwrap();
        let emp = employee(&company);
        store.insert_user(&emp).unwrap();
        let svc = service(store);

        // 2025-06-17 02:00 UTC is 2025-06-16 21:00 in Chicago.
        let in_at = Utc.with_ymd_and_hms(2025, 6, 17, 2, 0, 0).unwrap();
        svc.create_manual(
            &company,
            emp.id,
            in_at,
            in_at + chrono::Duration::hours(2),
            0,
            None,
            emp.id,
        )
        .unwrap();

        let june16 = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        let june17 = NaiveDate::from_ymd_opt(2025, 6, 17).unwrap();

        let (hits, total) = svc
            .list_for_employee(&company, emp.id, Some(june16), Some(june16), 0, 10)
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(hits.len(), 1);

        let (_, total) = svc
            .list_for_employee(&company, emp.id, Some(june17), Some(june17), 0, 10)
            .unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn delete_removes_cash_session() {
        let store = temp_store("delete_cascade");
        let company = company();
        store.insert_company(&company).unwrap();
        let emp = employee(&company);
        store.insert_user(&emp).unwrap();
        let svc = service(store.clone());

        let t0 = Utc.with_ymd_and_hms(2025, 6, 16, 9, 0, 0).unwrap();
        let entry = svc
            .create_manual(&company, emp.id, t0, t0 + chrono::Duration::hours(8), 0, None, emp.id)
            .unwrap();
        let session = shiftledger_core::cash::CashDrawerSession {
            id: shiftledger_core::types::CashSessionId::generate(),
            company_id: company.id,
            time_entry_id: entry.id,
            employee_id: emp.id,
            start_cash_cents: 100,
            start_counted_at: t0,
            start_count_source: shiftledger_core::cash::CountSource::Web,
            end_cash_cents: None,
            end_counted_at: None,
            end_count_source: None,
            collected_cash_cents: None,
            drop_amount_cents: None,
            beverages_cash_cents: None,
            delta_cents: None,
            status: shiftledger_core::cash::CashStatus::Open,
            reviewed_by: None,
            reviewed_at: None,
            review_note: None,
        };
        store.insert_cash_session(&session).unwrap();

        svc.delete(&company, entry.id, emp.id).unwrap();
        assert!(store.get_entry(&entry.id).unwrap().is_none());
        assert!(store.cash_session_for_entry(&entry.id).unwrap().is_none());
    }
}
