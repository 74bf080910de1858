//! The punch coordinator.
//!
//! State per `(company, employee)` is either Idle (no open entry) or Open.
//! A punch toggles: Idle → Open inserts a time entry (and, when policy
//! requires it, a cash-drawer session); Open → Idle closes both. All writes
//! for one punch are staged first and committed under the per-employee
//! lock, with the open-entry slot's compare-and-swap as the backstop
//! against racing clock-ins.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use shiftledger_core::audit::AuditLog;
use shiftledger_core::cash::{
    CashAuditAction, CashDrawerAudit, CashDrawerSession, CashStatus, CountSource,
};
use shiftledger_core::clock::Clock;
use shiftledger_core::company::Company;
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::time_entry::{EntrySource, EntryStatus, PunchMeta, TimeEntry};
use shiftledger_core::types::{CashSessionId, EntryId, UserId};
use shiftledger_core::user::User;
use shiftledger_crypto::verify_pin;
use shiftledger_store::Store;

/// How the caller identifies the employee.
pub enum PunchTarget {
    ById(UserId),
    ByEmail(String),
}

/// Optional cash counts accompanying a punch.
#[derive(Clone, Debug, Default)]
pub struct CashAmounts {
    pub cash_start_cents: Option<i64>,
    pub cash_end_cents: Option<i64>,
    pub collected_cash_cents: Option<i64>,
    pub drop_amount_cents: Option<i64>,
    pub beverages_cash_cents: Option<i64>,
}

pub struct PunchRequest {
    pub target: PunchTarget,
    pub pin: Option<String>,
    /// Set when the PIN was already verified (kiosk check-pin flow) or the
    /// punch comes from an authenticated web session.
    pub skip_pin_verification: bool,
    pub source: EntrySource,
    pub cash: CashAmounts,
    pub meta: PunchMeta,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PunchDirection {
    ClockIn,
    ClockOut,
}

#[derive(Debug)]
pub struct PunchOutcome {
    pub direction: PunchDirection,
    pub entry: TimeEntry,
    pub cash_session: Option<CashDrawerSession>,
}

fn count_source(source: EntrySource) -> CountSource {
    match source {
        EntrySource::Kiosk => CountSource::Kiosk,
        EntrySource::Web => CountSource::Web,
    }
}

fn check_non_negative(label: &str, cents: Option<i64>) -> Result<(), ShiftledgerError> {
    if let Some(v) = cents {
        if v < 0 {
            return Err(ShiftledgerError::Validation(format!(
                "{label} cannot be negative"
            )));
        }
    }
    Ok(())
}

pub struct PunchCoordinator {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
}

impl PunchCoordinator {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Resolve the punching employee within `company`.
    ///
    /// Only active, punch-eligible users qualify; admins and developers
    /// never punch.
    pub fn resolve_employee(
        &self,
        company: &Company,
        target: &PunchTarget,
    ) -> Result<User, ShiftledgerError> {
        let user = match target {
            PunchTarget::ById(id) => self.store.get_user(id)?,
            PunchTarget::ByEmail(email) => self.store.find_user_by_email(&company.id, email)?,
        };
        let label = match target {
            PunchTarget::ById(id) => id.to_string(),
            PunchTarget::ByEmail(email) => email.clone(),
        };
        match user {
            Some(u) if u.company_id == company.id && u.is_active() && u.role.is_punch_eligible() => {
                Ok(u)
            }
            _ => Err(ShiftledgerError::EmployeeNotFound(label)),
        }
    }

    /// Resolve an employee by verifying `pin` against every configured PIN
    /// of the company's active punch-eligible users.
    pub fn resolve_by_pin(&self, company: &Company, pin: &str) -> Result<User, ShiftledgerError> {
        for user in self.store.iter_pin_users(&company.id)? {
            if let Some(hash) = &user.pin_hash {
                if verify_pin(pin, hash) {
                    return Ok(user);
                }
            }
        }
        Err(ShiftledgerError::PinMismatch)
    }

    /// Whether the employee currently has an open entry.
    pub fn is_clocked_in(&self, company: &Company, employee: &User) -> Result<bool, ShiftledgerError> {
        Ok(self.store.open_entry_id(&company.id, &employee.id)?.is_some())
    }

    /// Toggle the punch state machine for one employee.
    pub async fn punch(
        &self,
        company: &Company,
        request: PunchRequest,
    ) -> Result<PunchOutcome, ShiftledgerError> {
        let employee = self.resolve_employee(company, &request.target)?;

        if !request.skip_pin_verification {
            let pin = request.pin.as_deref().unwrap_or("");
            let hash = employee
                .pin_hash
                .as_deref()
                .ok_or_else(|| ShiftledgerError::PinNotConfigured(employee.email.clone()))?;
            if !verify_pin(pin, hash) {
                return Err(ShiftledgerError::PinMismatch);
            }
        }

        if employee.needs_verification(self.clock.now()) {
            return Err(ShiftledgerError::VerificationRequired {
                email: employee.email.clone(),
            });
        }

        check_non_negative("starting cash", request.cash.cash_start_cents)?;
        check_non_negative("ending cash", request.cash.cash_end_cents)?;
        check_non_negative("collected cash", request.cash.collected_cash_cents)?;
        check_non_negative("drop amount", request.cash.drop_amount_cents)?;
        check_non_negative("beverages cash", request.cash.beverages_cash_cents)?;

        let _guard = self.store.locks.punch_lock(&company.id, &employee.id).await;

        match self.store.open_entry_id(&company.id, &employee.id)? {
            Some(entry_id) => self.clock_out(company, &employee, entry_id, request),
            None => self.clock_in(company, &employee, request),
        }
    }

    // ── Idle → Open ──────────────────────────────────────────────────────────

    fn clock_in(
        &self,
        company: &Company,
        employee: &User,
        request: PunchRequest,
    ) -> Result<PunchOutcome, ShiftledgerError> {
        let now = self.clock.now();
        let cash_required = company.settings.cash_drawer_required_for(employee.role);

        if cash_required && request.cash.cash_start_cents.is_none() {
            return Err(ShiftledgerError::MissingCashStart);
        }

        let entry = TimeEntry {
            id: EntryId::generate(),
            company_id: company.id,
            employee_id: employee.id,
            clock_in_at: now,
            clock_out_at: None,
            break_minutes: 0,
            source: request.source,
            status: EntryStatus::Open,
            note: None,
            edited_by: None,
            edit_reason: None,
            clock_in_meta: request.meta.clone(),
            clock_out_meta: PunchMeta::default(),
            created_at: now,
            updated_at: now,
        };

        let cash_session = if cash_required {
            let start = request.cash.cash_start_cents.unwrap_or(0);
            Some(CashDrawerSession {
                id: CashSessionId::generate(),
                company_id: company.id,
                time_entry_id: entry.id,
                employee_id: employee.id,
                start_cash_cents: start,
                start_counted_at: now,
                start_count_source: count_source(request.source),
                end_cash_cents: None,
                end_counted_at: None,
                end_count_source: None,
                collected_cash_cents: None,
                drop_amount_cents: None,
                beverages_cash_cents: None,
                delta_cents: None,
                status: CashStatus::Open,
                reviewed_by: None,
                reviewed_at: None,
                review_note: None,
            })
        } else {
            None
        };

        // Claim the slot first: it is the guard against racing clock-ins.
        self.store.claim_open_entry(&company.id, &employee.id, &entry.id)?;

        let committed = self.commit_clock_in(company, employee, &entry, cash_session.as_ref(), now);
        if committed.is_err() {
            // The store has no cross-tree transactions; undo every staged
            // row so the entry and its cash session roll back together.
            if let Some(session) = &cash_session {
                let _ = self.store.delete_cash_session(session);
            }
            let _ = self.store.delete_entry(&entry.id);
            let _ = self.store.release_open_entry(&company.id, &employee.id);
        }
        committed?;

        info!(
            company = %company.id,
            employee = %employee.id,
            entry = %entry.id,
            cash = cash_session.is_some(),
            "clock-in"
        );
        Ok(PunchOutcome {
            direction: PunchDirection::ClockIn,
            entry,
            cash_session,
        })
    }

    fn commit_clock_in(
        &self,
        company: &Company,
        employee: &User,
        entry: &TimeEntry,
        cash_session: Option<&CashDrawerSession>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), ShiftledgerError> {
        self.store.put_entry(entry)?;

        if let Some(session) = cash_session {
            self.store.insert_cash_session(session)?;
            self.store.append_cash_audit(&CashDrawerAudit {
                company_id: company.id,
                session_id: session.id,
                actor_user_id: employee.id,
                action: CashAuditAction::CreateStart,
                old_values: None,
                new_values: Some(json!({ "start_cash_cents": session.start_cash_cents })),
                reason: None,
                at: now,
            })?;
            self.store.append_audit(&AuditLog::new(
                company.id,
                Some(employee.id),
                "CASH_DRAWER_CREATE_START",
                "cash_drawer_session",
                session.id,
                json!({
                    "start_cash_cents": session.start_cash_cents,
                    "time_entry_id": entry.id.to_string(),
                }),
                now,
            ))?;
        }

        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(employee.id),
            "TIME_ENTRY_CLOCK_IN",
            "time_entry",
            entry.id,
            json!({ "source": entry.source }),
            now,
        ))
    }

    // ── Open → Idle ──────────────────────────────────────────────────────────

    fn clock_out(
        &self,
        company: &Company,
        employee: &User,
        entry_id: EntryId,
        request: PunchRequest,
    ) -> Result<PunchOutcome, ShiftledgerError> {
        let now = self.clock.now();
        let original_entry = self
            .store
            .get_entry(&entry_id)?
            .ok_or_else(|| ShiftledgerError::Internal(format!("open slot points at missing entry {entry_id}")))?;
        let original_session = self.store.cash_session_for_entry(&entry_id)?;

        // Stage the closed forms in memory; nothing is written until both
        // records validate.
        let mut entry = original_entry.clone();
        let mut cash_session = original_session.clone();
        let mut cash_old_values = None;

        if let Some(session) = cash_session.as_mut() {
            let end = request
                .cash
                .cash_end_cents
                .ok_or(ShiftledgerError::MissingCashEnd)?;
            if session.status != CashStatus::Open {
                return Err(ShiftledgerError::CashSessionNotOpen(
                    session.status.as_str().to_string(),
                ));
            }

            cash_old_values = Some(json!({
                "end_cash_cents": session.end_cash_cents,
                "delta_cents": session.delta_cents,
                "status": session.status.as_str(),
            }));

            session.end_cash_cents = Some(end);
            session.end_counted_at = Some(now);
            session.end_count_source = Some(count_source(request.source));
            session.collected_cash_cents = request.cash.collected_cash_cents;
            session.drop_amount_cents = request.cash.drop_amount_cents;
            session.beverages_cash_cents = request.cash.beverages_cash_cents;

            let delta = end - session.start_cash_cents;
            session.delta_cents = Some(delta);
            session.status = if delta != 0 {
                CashStatus::ReviewNeeded
            } else {
                CashStatus::Closed
            };
        }

        entry.clock_out_at = Some(now);
        entry.status = EntryStatus::Closed;
        entry.clock_out_meta = request.meta;
        entry.updated_at = now;

        let committed = self.commit_clock_out(
            company,
            employee,
            &entry,
            cash_session.as_ref(),
            cash_old_values,
            request.source,
            now,
        );
        if committed.is_err() {
            // The store has no cross-tree transactions; restore the
            // originals so the entry and its cash session stay paired.
            if let Some(original) = &original_session {
                let _ = self.store.put_cash_session(original);
            }
            let _ = self.store.put_entry(&original_entry);
            let _ = self.store.claim_open_entry(&company.id, &employee.id, &entry_id);
        }
        committed?;

        info!(
            company = %company.id,
            employee = %employee.id,
            entry = %entry.id,
            "clock-out"
        );
        Ok(PunchOutcome {
            direction: PunchDirection::ClockOut,
            entry,
            cash_session,
        })
    }

    fn commit_clock_out(
        &self,
        company: &Company,
        employee: &User,
        entry: &TimeEntry,
        cash_session: Option<&CashDrawerSession>,
        cash_old_values: Option<serde_json::Value>,
        source: EntrySource,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), ShiftledgerError> {
        // State rows first, audit rows after: a failed audit append rolls
        // the state back without leaving a half-closed pair behind.
        if let Some(session) = cash_session {
            self.store.put_cash_session(session)?;
        }
        self.store.put_entry(entry)?;
        self.store.release_open_entry(&company.id, &employee.id)?;

        if let Some(session) = cash_session {
            let end = session.end_cash_cents.unwrap_or(0);
            let delta = session.delta_cents.unwrap_or(0);
            self.store.append_cash_audit(&CashDrawerAudit {
                company_id: company.id,
                session_id: session.id,
                actor_user_id: employee.id,
                action: CashAuditAction::SetEnd,
                old_values: cash_old_values,
                new_values: Some(json!({
                    "end_cash_cents": end,
                    "delta_cents": delta,
                    "status": session.status.as_str(),
                })),
                reason: None,
                at: now,
            })?;
            self.store.append_audit(&AuditLog::new(
                company.id,
                Some(employee.id),
                "CASH_DRAWER_SET_END",
                "cash_drawer_session",
                session.id,
                json!({
                    "end_cash_cents": end,
                    "delta_cents": delta,
                    "status": session.status.as_str(),
                    "time_entry_id": entry.id.to_string(),
                }),
                now,
            ))?;
        }

        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(employee.id),
            "TIME_ENTRY_CLOCK_OUT",
            "time_entry",
            entry.id,
            json!({ "source": source }),
            now,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use shiftledger_core::clock::FixedClock;
    use shiftledger_core::company::CompanySettings;
    use shiftledger_core::types::CompanyId;
    use shiftledger_core::user::{PayRateType, Role, UserStatus};
    use shiftledger_crypto::hash_pin;

    fn temp_store(name: &str) -> Arc<Store> {
        let dir = std::env::temp_dir().join(format!("shiftledger_punch_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        Arc::new(Store::open(&dir).expect("open temp store"))
    }

    fn cash_company() -> Company {
        Company {
            id: CompanyId::generate(),
            name: "Demo Hotel".to_string(),
            slug: "demo".to_string(),
            kiosk_enabled: true,
            settings: CompanySettings {
                cash_drawer_enabled: true,
                cash_drawer_required_for_all: true,
                ..CompanySettings::default()
            },
            created_at: Utc::now(),
        }
    }

    fn verified_employee(company: &Company, pin: &str) -> User {
        let now = Utc::now();
        User {
            id: shiftledger_core::types::UserId::generate(),
            company_id: company.id,
            name: "Front Desk".to_string(),
            email: "frontdesk@example.com".to_string(),
            password_hash: String::new(),
            pin_hash: Some(hash_pin(pin).unwrap()),
            role: Role::Frontdesk,
            status: UserStatus::Active,
            job_role: None,
            pay_rate_cents: 2_500,
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

    fn request(pin: &str, cash: CashAmounts, target: PunchTarget) -> PunchRequest {
        PunchRequest {
            target,
            pin: Some(pin.to_string()),
            skip_pin_verification: false,
            source: EntrySource::Kiosk,
            cash,
            meta: PunchMeta::default(),
        }
    }

    #[tokio::test]
    async fn kiosk_cash_flow() {
        let store = temp_store("kiosk_cash_flow");
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap(),
        ));
        let company = cash_company();
        store.insert_company(&company).unwrap();
        let employee = verified_employee(&company, "1234");
        store.insert_user(&employee).unwrap();

        let coordinator = PunchCoordinator::new(store.clone(), clock.clone());

        // Clock-in without a starting count is rejected.
        let err = coordinator
            .punch(
                &company,
                request("1234", CashAmounts::default(), PunchTarget::ById(employee.id)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ShiftledgerError::MissingCashStart));

        // With the count, the entry opens together with its cash session.
        let outcome = coordinator
            .punch(
                &company,
                request(
                    "1234",
                    CashAmounts {
                        cash_start_cents: Some(10_000),
                        ..CashAmounts::default()
                    },
                    PunchTarget::ById(employee.id),
                ),
            )
            .await
            .unwrap();
        assert_eq!(outcome.direction, PunchDirection::ClockIn);
        assert_eq!(outcome.entry.status, EntryStatus::Open);
        let session = outcome.cash_session.unwrap();
        assert_eq!(session.status, CashStatus::Open);
        assert_eq!(session.start_cash_cents, 10_000);

        // Eight hours later: closing without an end count is rejected.
        clock.advance(Duration::hours(8));
        let err = coordinator
            .punch(
                &company,
                request("1234", CashAmounts::default(), PunchTarget::ById(employee.id)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ShiftledgerError::MissingCashEnd));

        // With an end count, a nonzero delta lands in REVIEW_NEEDED.
        let outcome = coordinator
            .punch(
                &company,
                request(
                    "1234",
                    CashAmounts {
                        cash_end_cents: Some(11_500),
                        ..CashAmounts::default()
                    },
                    PunchTarget::ById(employee.id),
                ),
            )
            .await
            .unwrap();
        assert_eq!(outcome.direction, PunchDirection::ClockOut);
        assert_eq!(outcome.entry.status, EntryStatus::Closed);
        let session = outcome.cash_session.unwrap();
        assert_eq!(session.status, CashStatus::ReviewNeeded);
        assert_eq!(session.delta_cents, Some(1_500));

        // The slot is free again.
        assert!(store.open_entry_id(&company.id, &employee.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_delta_closes_clean() {
        let store = temp_store("zero_delta");
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let company = cash_company();
        store.insert_company(&company).unwrap();
        let employee = verified_employee(&company, "4321");
        store.insert_user(&employee).unwrap();
        let coordinator = PunchCoordinator::new(store, clock.clone());

        coordinator
            .punch(
                &company,
                request(
                    "4321",
                    CashAmounts { cash_start_cents: Some(5_000), ..CashAmounts::default() },
                    PunchTarget::ById(employee.id),
                ),
            )
            .await
            .unwrap();
        clock.advance(Duration::hours(4));
        let outcome = coordinator
            .punch(
                &company,
                request(
                    "4321",
                    CashAmounts { cash_end_cents: Some(5_000), ..CashAmounts::default() },
                    PunchTarget::ById(employee.id),
                ),
            )
            .await
            .unwrap();
        let session = outcome.cash_session.unwrap();
        assert_eq!(session.status, CashStatus::Closed);
        assert_eq!(session.delta_cents, Some(0));
    }

    #[tokio::test]
    async fn wrong_pin_rejected() {
        let store = temp_store("wrong_pin");
        let company = cash_company();
        store.insert_company(&company).unwrap();
        let employee = verified_employee(&company, "1234");
        store.insert_user(&employee).unwrap();
        let coordinator = PunchCoordinator::new(store, Arc::new(FixedClock::new(Utc::now())));

        let err = coordinator
            .punch(
                &company,
                request("9999", CashAmounts::default(), PunchTarget::ById(employee.id)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ShiftledgerError::PinMismatch));
    }

    #[tokio::test]
    async fn unverified_employee_is_sent_to_otp_flow() {
        let store = temp_store("unverified");
        let company = cash_company();
        store.insert_company(&company).unwrap();
        let mut employee = verified_employee(&company, "1234");
        employee.email_verified = false;
        employee.last_verified_at = None;
        store.insert_user(&employee).unwrap();
        let coordinator = PunchCoordinator::new(store, Arc::new(FixedClock::new(Utc::now())));

        let err = coordinator
            .punch(
                &company,
                request("1234", CashAmounts::default(), PunchTarget::ById(employee.id)),
            )
            .await
            .unwrap_err();
        match err {
            ShiftledgerError::VerificationRequired { email } => {
                assert_eq!(email, "frontdesk@example.com");
            }
            other => panic!("expected VerificationRequired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn admin_cannot_punch() {
        let store = temp_store("admin_punch");
        let company = cash_company();
        store.insert_company(&company).unwrap();
        let mut admin = verified_employee(&company, "1234");
        admin.role = Role::Admin;
        admin.email = "boss@example.com".to_string();
        store.insert_user(&admin).unwrap();
        let coordinator = PunchCoordinator::new(store, Arc::new(FixedClock::new(Utc::now())));

        let err = coordinator
            .punch(
                &company,
                request("1234", CashAmounts::default(), PunchTarget::ById(admin.id)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ShiftledgerError::EmployeeNotFound(_)));
    }

    #[tokio::test]
    async fn pin_resolution_is_company_scoped() {
        let store = temp_store("pin_scope");
        let company_a = cash_company();
        let mut company_b = cash_company();
        company_b.slug = "other".to_string();
        store.insert_company(&company_a).unwrap();
        store.insert_company(&company_b).unwrap();

        let employee = verified_employee(&company_a, "1234");
        store.insert_user(&employee).unwrap();

        let coordinator = PunchCoordinator::new(store, Arc::new(FixedClock::new(Utc::now())));
        assert!(coordinator.resolve_by_pin(&company_a, "1234").is_ok());
        assert!(matches!(
            coordinator.resolve_by_pin(&company_b, "1234"),
            Err(ShiftledgerError::PinMismatch)
        ));
    }

    #[tokio::test]
    async fn no_cash_session_when_policy_off() {
        let store = temp_store("no_cash");
        let mut company = cash_company();
        company.settings.cash_drawer_enabled = false;
        store.insert_company(&company).unwrap();
        let employee = verified_employee(&company, "1234");
        store.insert_user(&employee).unwrap();
        let coordinator = PunchCoordinator::new(store.clone(), Arc::new(FixedClock::new(Utc::now())));

        let outcome = coordinator
            .punch(
                &company,
                request("1234", CashAmounts::default(), PunchTarget::ById(employee.id)),
            )
            .await
            .unwrap();
        assert!(outcome.cash_session.is_none());
        assert!(store
            .cash_session_for_entry(&outcome.entry.id)
            .unwrap()
            .is_none());
    }
}
