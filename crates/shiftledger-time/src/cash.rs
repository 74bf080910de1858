//! Admin operations on cash-drawer sessions: listing, summary, edit under
//! policy, review, and flat export rows.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use shiftledger_core::audit::AuditLog;
use shiftledger_core::cash::{CashAuditAction, CashDrawerAudit, CashDrawerSession, CashStatus};
use shiftledger_core::clock::Clock;
use shiftledger_core::company::Company;
use shiftledger_core::constants::EXPORT_ROW_CAP;
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::types::{CashSessionId, UserId};
use shiftledger_core::tz;
use shiftledger_store::Store;

#[derive(Clone, Debug, Default)]
pub struct CashFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub employee_id: Option<UserId>,
    pub status: Option<CashStatus>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmployeeCashTotal {
    pub employee_id: UserId,
    pub employee_name: String,
    pub total_delta_cents: i64,
    pub session_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CashSummary {
    pub total_sessions: usize,
    pub total_delta_cents: i64,
    pub average_delta_cents: f64,
    pub review_needed_count: usize,
    pub employee_totals: Vec<EmployeeCashTotal>,
}

/// One flat export row (rendering happens elsewhere).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CashExportRow {
    pub session_id: CashSessionId,
    pub employee_name: String,
    pub start_counted_at: DateTime<Utc>,
    pub start_cash_cents: i64,
    pub end_cash_cents: Option<i64>,
    pub collected_cash_cents: Option<i64>,
    pub beverages_cash_cents: Option<i64>,
    pub delta_cents: Option<i64>,
    pub status: CashStatus,
}

pub struct CashDrawerService {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
}

impl CashDrawerService {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn matches(
        company: &Company,
        session: &CashDrawerSession,
        filter: &CashFilter,
    ) -> Result<bool, ShiftledgerError> {
        if let Some(employee_id) = filter.employee_id {
            if session.employee_id != employee_id {
                return Ok(false);
            }
        }
        if let Some(status) = filter.status {
            if session.status != status {
                return Ok(false);
            }
        }
        if filter.from.is_some() || filter.to.is_some() {
            let zone = tz::parse_timezone(&company.settings.timezone)?;
            if let Some(from) = filter.from {
                if session.start_counted_at < tz::local_day_start_utc(zone, from) {
                    return Ok(false);
                }
            }
            if let Some(to) = filter.to {
                if session.start_counted_at > tz::local_day_end_utc(zone, to) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn filtered(
        &self,
        company: &Company,
        filter: &CashFilter,
    ) -> Result<Vec<CashDrawerSession>, ShiftledgerError> {
        let mut sessions = Vec::new();
        for session in self.store.iter_company_cash_sessions(&company.id)? {
            if Self::matches(company, &session, filter)? {
                sessions.push(session);
            }
        }
        sessions.sort_by(|a, b| b.start_counted_at.cmp(&a.start_counted_at));
        Ok(sessions)
    }

    pub fn get(
        &self,
        company: &Company,
        session_id: CashSessionId,
    ) -> Result<CashDrawerSession, ShiftledgerError> {
        self.store
            .get_cash_session(&session_id)?
            .filter(|s| s.company_id == company.id)
            .ok_or_else(|| ShiftledgerError::CashSessionNotFound(session_id.to_string()))
    }

    pub fn list(
        &self,
        company: &Company,
        filter: &CashFilter,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<CashDrawerSession>, usize), ShiftledgerError> {
        let sessions = self.filtered(company, filter)?;
        let total = sessions.len();
        Ok((sessions.into_iter().skip(skip).take(limit).collect(), total))
    }

    /// Aggregate over finished sessions (an end count exists).
    pub fn summary(
        &self,
        company: &Company,
        filter: &CashFilter,
    ) -> Result<CashSummary, ShiftledgerError> {
        let sessions: Vec<_> = self
            .filtered(company, filter)?
            .into_iter()
            .filter(|s| s.end_cash_cents.is_some())
            .collect();

        let total_sessions = sessions.len();
        let total_delta: i64 = sessions.iter().filter_map(|s| s.delta_cents).sum();
        let review_needed = sessions
            .iter()
            .filter(|s| s.status == CashStatus::ReviewNeeded)
            .count();

        let mut per_employee: BTreeMap<UserId, (i64, usize)> = BTreeMap::new();
        for session in &sessions {
            let slot = per_employee.entry(session.employee_id).or_insert((0, 0));
            slot.0 += session.delta_cents.unwrap_or(0);
            slot.1 += 1;
        }
        let mut employee_totals = Vec::with_capacity(per_employee.len());
        for (employee_id, (total_delta_cents, session_count)) in per_employee {
            let employee_name = self
                .store
                .get_user(&employee_id)?
                .map(|u| u.name)
                .unwrap_or_default();
            employee_totals.push(EmployeeCashTotal {
                employee_id,
                employee_name,
                total_delta_cents,
                session_count,
            });
        }

        Ok(CashSummary {
            total_sessions,
            total_delta_cents: total_delta,
            average_delta_cents: if total_sessions > 0 {
                total_delta as f64 / total_sessions as f64
            } else {
                0.0
            },
            review_needed_count: review_needed,
            employee_totals,
        })
    }

    /// Admin edit of the start and/or end count, gated by company policy.
    /// Requires a reason; the delta and status are re-derived.
    pub fn edit(
        &self,
        company: &Company,
        session_id: CashSessionId,
        actor: UserId,
        start_cash_cents: Option<i64>,
        end_cash_cents: Option<i64>,
        reason: &str,
    ) -> Result<CashDrawerSession, ShiftledgerError> {
        if !company.settings.cash_drawer_allow_edit {
            return Err(ShiftledgerError::CashEditDisabled);
        }
        if reason.trim().is_empty() {
            return Err(ShiftledgerError::Validation(
                "reason is required for editing a cash drawer session".to_string(),
            ));
        }
        let mut session = self.get(company, session_id)?;

        let old_values = json!({
            "start_cash_cents": session.start_cash_cents,
            "end_cash_cents": session.end_cash_cents,
            "delta_cents": session.delta_cents,
        });

        let now = self.clock.now();
        let mut actions: Vec<CashAuditAction> = Vec::new();

        if let Some(start) = start_cash_cents {
            if start < 0 {
                return Err(ShiftledgerError::Validation(
                    "start cash amount cannot be negative".to_string(),
                ));
            }
            session.start_cash_cents = start;
            actions.push(CashAuditAction::EditStart);
        }
        if let Some(end) = end_cash_cents {
            if end < 0 {
                return Err(ShiftledgerError::Validation(
                    "end cash amount cannot be negative".to_string(),
                ));
            }
            session.end_cash_cents = Some(end);
            actions.push(CashAuditAction::EditEnd);
        }
        if actions.is_empty() {
            return Err(ShiftledgerError::Validation(
                "nothing to edit".to_string(),
            ));
        }

        if let Some(end) = session.end_cash_cents {
            let delta = end - session.start_cash_cents;
            session.delta_cents = Some(delta);
            session.status = if delta != 0 {
                CashStatus::ReviewNeeded
            } else {
                CashStatus::Closed
            };
        }

        let new_values = json!({
            "start_cash_cents": session.start_cash_cents,
            "end_cash_cents": session.end_cash_cents,
            "delta_cents": session.delta_cents,
            "status": session.status.as_str(),
        });

        self.store.put_cash_session(&session)?;
        for action in &actions {
            self.store.append_cash_audit(&CashDrawerAudit {
                company_id: company.id,
                session_id: session.id,
                actor_user_id: actor,
                action: *action,
                old_values: Some(old_values.clone()),
                new_values: Some(new_values.clone()),
                reason: Some(reason.to_string()),
                at: now,
            })?;
            self.store.append_audit(&AuditLog::new(
                company.id,
                Some(actor),
                format!("CASH_DRAWER_{}", action.as_str()),
                "cash_drawer_session",
                session.id,
                json!({
                    "old_values": old_values,
                    "new_values": new_values,
                    "reason": reason,
                }),
                now,
            ))?;
        }
        Ok(session)
    }

    /// Admin review. Always lands on CLOSED; REVIEW_NEEDED is interim only.
    pub fn review(
        &self,
        company: &Company,
        session_id: CashSessionId,
        reviewer: UserId,
        note: Option<String>,
    ) -> Result<CashDrawerSession, ShiftledgerError> {
        let mut session = self.get(company, session_id)?;
        let now = self.clock.now();
        let old_status = session.status;

        session.reviewed_by = Some(reviewer);
        session.reviewed_at = Some(now);
        session.review_note = note.clone();
        session.status = CashStatus::Closed;

        self.store.put_cash_session(&session)?;
        self.store.append_cash_audit(&CashDrawerAudit {
            company_id: company.id,
            session_id: session.id,
            actor_user_id: reviewer,
            action: CashAuditAction::Review,
            old_values: Some(json!({ "status": old_status.as_str() })),
            new_values: Some(json!({ "status": session.status.as_str(), "note": note })),
            reason: session.review_note.clone(),
            at: now,
        })?;
        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(reviewer),
            "CASH_DRAWER_REVIEW",
            "cash_drawer_session",
            session.id,
            json!({
                "old_status": old_status.as_str(),
                "new_status": session.status.as_str(),
            }),
            now,
        ))?;
        Ok(session)
    }

    /// Flat rows for export rendering, capped.
    pub fn export_rows(
        &self,
        company: &Company,
        filter: &CashFilter,
    ) -> Result<Vec<CashExportRow>, ShiftledgerError> {
        let sessions = self.filtered(company, filter)?;
        let mut rows = Vec::with_capacity(sessions.len().min(EXPORT_ROW_CAP));
        for session in sessions.into_iter().take(EXPORT_ROW_CAP) {
            let employee_name = self
                .store
                .get_user(&session.employee_id)?
                .map(|u| u.name)
                .unwrap_or_default();
            rows.push(CashExportRow {
                session_id: session.id,
                employee_name,
                start_counted_at: session.start_counted_at,
                start_cash_cents: session.start_cash_cents,
                end_cash_cents: session.end_cash_cents,
                collected_cash_cents: session.collected_cash_cents,
                beverages_cash_cents: session.beverages_cash_cents,
                delta_cents: session.delta_cents,
                status: session.status,
            });
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftledger_core::cash::CountSource;
    use shiftledger_core::clock::FixedClock;
    use shiftledger_core::company::CompanySettings;
    use shiftledger_core::types::{CompanyId, EntryId};

    fn temp_store(name: &str) -> Arc<Store> {
        let dir = std::env::temp_dir().join(format!("shiftledger_cash_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        Arc::new(Store::open(&dir).expect("open temp store"))
    }

    fn company(allow_edit: bool) -> Company {
        Company {
            id: CompanyId::generate(),
            name: "Demo".to_string(),
            slug: "demo".to_string(),
            kiosk_enabled: true,
            settings: CompanySettings {
                cash_drawer_enabled: true,
                cash_drawer_allow_edit: allow_edit,
                ..CompanySettings::default()
            },
            created_at: Utc::now(),
        }
    }

    fn seed_session(
        store: &Store,
        company: &Company,
        end: Option<i64>,
        status: CashStatus,
    ) -> CashDrawerSession {
        let session = CashDrawerSession {
            id: CashSessionId::generate(),
            company_id: company.id,
            time_entry_id: EntryId::generate(),
            employee_id: UserId::generate(),
            start_cash_cents: 10_000,
            start_counted_at: Utc::now(),
            start_count_source: CountSource::Kiosk,
            end_cash_cents: end,
            end_counted_at: end.map(|_| Utc::now()),
            end_count_source: end.map(|_| CountSource::Kiosk),
            collected_cash_cents: None,
            drop_amount_cents: None,
            beverages_cash_cents: None,
            delta_cents: end.map(|e| e - 10_000),
            status,
            reviewed_by: None,
            reviewed_at: None,
            review_note: None,
        };
        store.insert_cash_session(&session).unwrap();
        session
    }

    fn service(store: Arc<Store>) -> CashDrawerService {
        CashDrawerService::new(store, Arc::new(FixedClock::new(Utc::now())))
    }

    #[test]
    fn review_always_lands_closed() {
        let store = temp_store("review");
        let company = company(true);
        store.insert_company(&company).unwrap();
        let session = seed_session(&store, &company, Some(11_500), CashStatus::ReviewNeeded);
        let svc = service(store.clone());

        let reviewed = svc
            .review(&company, session.id, UserId::generate(), Some("counted twice".into()))
            .unwrap();
        assert_eq!(reviewed.status, CashStatus::Closed);
        assert!(reviewed.reviewed_by.is_some());

        let audits = store.iter_cash_audits(&session.id).unwrap();
        assert!(audits
            .iter()
            .any(|a| a.action == CashAuditAction::Review));
    }

    #[test]
    fn edit_gated_by_policy() {
        let store = temp_store("edit_gate");
        let company = company(false);
        store.insert_company(&company).unwrap();
        let session = seed_session(&store, &company, Some(10_000), CashStatus::Closed);
        let svc = service(store);

        let err = svc
            .edit(&company, session.id, UserId::generate(), Some(9_000), None, "typo")
            .unwrap_err();
        assert!(matches!(err, ShiftledgerError::CashEditDisabled));
    }

    #[test]
    fn edit_recomputes_delta_and_status() {
        let store = temp_store("edit_delta");
        let company = company(true);
        store.insert_company(&company).unwrap();
        let session = seed_session(&store, &company, Some(11_000), CashStatus::ReviewNeeded);
        let svc = service(store);

        // Correcting the start count to match the end closes the session.
        let edited = svc
            .edit(
                &company,
                session.id,
                UserId::generate(),
                Some(11_000),
                None,
                "recount of opening float",
            )
            .unwrap();
        assert_eq!(edited.delta_cents, Some(0));
        assert_eq!(edited.status, CashStatus::Closed);
    }

    #[test]
    fn edit_requires_reason() {
        let store = temp_store("edit_reason");
        let company = company(true);
        store.insert_company(&company).unwrap();
        let session = seed_session(&store, &company, None, CashStatus::Open);
        let svc = service(store);

        assert!(svc
            .edit(&company, session.id, UserId::generate(), Some(1), None, "  ")
            .is_err());
    }

    #[test]
    fn summary_counts_only_finished_sessions() {
        let store = temp_store("summary");
        let company = company(true);
        store.insert_company(&company).unwrap();
        seed_session(&store, &company, None, CashStatus::Open);
        seed_session(&store, &company, Some(11_500), CashStatus::ReviewNeeded);
        seed_session(&store, &company, Some(10_000), CashStatus::Closed);
        let svc = service(store);

        let summary = svc.summary(&company, &CashFilter::default()).unwrap();
        assert_eq!(summary.total_sessions, 2);
        assert_eq!(summary.total_delta_cents, 1_500);
        assert_eq!(summary.review_needed_count, 1);
        assert_eq!(summary.average_delta_cents, 750.0);
    }
}
