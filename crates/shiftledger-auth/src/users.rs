//! Employee management: CRUD, kiosk PIN lifecycle, invitations.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;

use shiftledger_core::audit::AuditLog;
use shiftledger_core::clock::Clock;
use shiftledger_core::company::Company;
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::types::UserId;
use shiftledger_core::user::{normalize_email, PayRateType, Role, User, UserStatus};
use shiftledger_crypto::{
    hash_password, hash_pin, validate_password_strength, validate_pin_format, verify_pin,
    TokenCodec,
};
use shiftledger_store::Store;

use crate::email::EmailSender;

#[derive(Clone, Debug)]
pub struct EmployeeCreate {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub job_role: Option<String>,
    pub pay_rate_cents: i64,
    pub overtime_multiplier: Option<Decimal>,
    pub pin: Option<String>,
    /// Send a password-setup invitation to the new address.
    pub send_invite: bool,
}

/// `pin: Some("")` clears the PIN; `Some(digits)` sets it; `None` leaves it.
#[derive(Clone, Debug, Default)]
pub struct EmployeeUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub job_role: Option<String>,
    pub pay_rate_cents: Option<i64>,
    pub overtime_multiplier: Option<Decimal>,
    pub pin: Option<String>,
}

pub struct EmployeeService {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    codec: Arc<TokenCodec>,
    email: Arc<dyn EmailSender>,
}

impl EmployeeService {
    pub fn new(
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        codec: Arc<TokenCodec>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        Self { store, clock, codec, email }
    }

    /// Argon2 salts per hash, so equal PINs never produce equal hashes; the
    /// duplicate check verifies the candidate against every configured PIN
    /// of the company's non-admin active users.
    fn check_pin_available(
        &self,
        company: &Company,
        pin: &str,
        exclude: Option<UserId>,
    ) -> Result<(), ShiftledgerError> {
        for user in self.store.iter_company_users(&company.id)? {
            if Some(user.id) == exclude {
                continue;
            }
            if user.role == Role::Admin || !user.is_active() {
                continue;
            }
            if let Some(hash) = &user.pin_hash {
                if verify_pin(pin, hash) {
                    return Err(ShiftledgerError::DuplicatePin);
                }
            }
        }
        Ok(())
    }

    pub fn list(&self, company: &Company) -> Result<Vec<User>, ShiftledgerError> {
        let mut users = self.store.iter_company_users(&company.id)?;
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    pub fn get(&self, company: &Company, user_id: UserId) -> Result<User, ShiftledgerError> {
        self.store
            .get_user(&user_id)?
            .filter(|u| u.company_id == company.id)
            .ok_or_else(|| ShiftledgerError::EmployeeNotFound(user_id.to_string()))
    }

    pub async fn create(
        &self,
        company: &Company,
        data: EmployeeCreate,
        actor: UserId,
    ) -> Result<User, ShiftledgerError> {
        if data.pay_rate_cents < 0 {
            return Err(ShiftledgerError::Validation(
                "pay rate cannot be negative".to_string(),
            ));
        }
        let email = normalize_email(&data.email);
        if !email.contains('@') {
            return Err(ShiftledgerError::Validation("invalid email address".to_string()));
        }

        let pin_hash = match &data.pin {
            Some(pin) if !pin.is_empty() => {
                validate_pin_format(pin)?;
                self.check_pin_available(company, pin, None)?;
                Some(hash_pin(pin)?)
            }
            _ => None,
        };

        let now = self.clock.now();
        let user = User {
            id: UserId::generate(),
            company_id: company.id,
            name: data.name.trim().to_string(),
            email,
            // Unusable until the invitation is redeemed.
            password_hash: String::new(),
            pin_hash,
            role: data.role,
            status: UserStatus::Active,
            job_role: data.job_role,
            pay_rate_cents: data.pay_rate_cents,
            pay_rate_type: PayRateType::Hourly,
            overtime_multiplier: data.overtime_multiplier,
            email_verified: false,
            verification_required: true,
            last_verified_at: None,
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
        };
        self.store.insert_user(&user)?;

        if data.send_invite {
            let token = self.codec.mint_password_setup(user.id, &user.email, now)?;
            // An invitation failure should not roll back the account; the
            // admin can re-invite.
            if let Err(send_err) = self.email.send_password_setup(&user.email, &token).await {
                tracing::warn!(user = %user.id, error = %send_err, "invitation send failed");
            }
        }

        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(actor),
            "EMPLOYEE_CREATE",
            "user",
            user.id,
            json!({ "role": user.role, "pin_set": user.pin_hash.is_some() }),
            now,
        ))?;
        info!(company = %company.id, user = %user.id, "employee created");
        Ok(user)
    }

    pub fn update(
        &self,
        company: &Company,
        user_id: UserId,
        data: EmployeeUpdate,
        actor: UserId,
    ) -> Result<User, ShiftledgerError> {
        let mut user = self.get(company, user_id)?;
        let had_pin = user.pin_hash.is_some();
        let old_email = user.email.clone();

        if let Some(name) = data.name {
            user.name = name.trim().to_string();
        }
        if let Some(role) = data.role {
            user.role = role;
        }
        if let Some(status) = data.status {
            user.status = status;
        }
        if let Some(job_role) = data.job_role {
            user.job_role = Some(job_role);
        }
        if let Some(rate) = data.pay_rate_cents {
            if rate < 0 {
                return Err(ShiftledgerError::Validation(
                    "pay rate cannot be negative".to_string(),
                ));
            }
            user.pay_rate_cents = rate;
        }
        if let Some(multiplier) = data.overtime_multiplier {
            user.overtime_multiplier = Some(multiplier);
        }

        let mut pin_action: Option<&'static str> = None;
        if let Some(pin) = &data.pin {
            if pin.is_empty() {
                user.pin_hash = None;
                if had_pin {
                    pin_action = Some("pin_cleared");
                }
            } else {
                validate_pin_format(pin)?;
                self.check_pin_available(company, pin, Some(user.id))?;
                user.pin_hash = Some(hash_pin(pin)?);
                pin_action = Some(if had_pin { "pin_changed" } else { "pin_set" });
            }
        }

        let now = self.clock.now();
        user.updated_at = now;

        if let Some(email) = data.email {
            let email = normalize_email(&email);
            if email != old_email {
                if !email.contains('@') {
                    return Err(ShiftledgerError::Validation(
                        "invalid email address".to_string(),
                    ));
                }
                user.email = email;
                // A new address must be re-proven.
                user.email_verified = false;
                user.verification_required = true;
                user.last_verified_at = None;
                self.store.reindex_user_email(&user, &old_email)?;
            }
        }

        self.store.put_user(&user)?;

        if let Some(action) = pin_action {
            self.store.append_audit(&AuditLog::new(
                company.id,
                Some(actor),
                action,
                "user",
                user.id,
                json!({}),
                now,
            ))?;
        }
        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(actor),
            "EMPLOYEE_UPDATE",
            "user",
            user.id,
            json!({ "status": user.status, "role": user.role }),
            now,
        ))?;
        Ok(user)
    }

    /// Admin override of an employee's password.
    pub fn set_employee_password(
        &self,
        company: &Company,
        user_id: UserId,
        new_password: &str,
        actor: UserId,
    ) -> Result<(), ShiftledgerError> {
        validate_password_strength(new_password)?;
        let mut user = self.get(company, user_id)?;
        let now = self.clock.now();
        user.password_hash = hash_password(new_password)?;
        user.updated_at = now;
        self.store.put_user(&user)?;
        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(actor),
            "EMPLOYEE_PASSWORD_RESET",
            "user",
            user.id,
            json!({}),
            now,
        ))?;
        Ok(())
    }

    /// Delete an employee and everything they own: time entries (with cash
    /// sessions), leave requests, sessions, payroll line items.
    pub fn delete(
        &self,
        company: &Company,
        user_id: UserId,
        actor: UserId,
    ) -> Result<(), ShiftledgerError> {
        let user = self.get(company, user_id)?;
        if user.id == actor {
            return Err(ShiftledgerError::Validation(
                "cannot delete your own account".to_string(),
            ));
        }

        for entry in self.store.iter_employee_entries(&company.id, &user.id)? {
            if let Some(session) = self.store.cash_session_for_entry(&entry.id)? {
                self.store.delete_cash_session(&session)?;
            }
            self.store.delete_entry(&entry.id)?;
        }
        self.store.release_open_entry(&company.id, &user.id)?;

        for request in self.store.iter_company_leave(&company.id)? {
            if request.employee_id == user.id {
                self.store.delete_leave(&request.id)?;
            }
        }

        for item in self.store.iter_employee_items(&company.id, &user.id)? {
            self.store.delete_line_item(&item.payroll_run_id, &user.id)?;
        }

        self.store.delete_user_sessions(&user.id)?;
        self.store.delete_user(&user)?;

        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(actor),
            "EMPLOYEE_DELETE",
            "user",
            user.id,
            json!({ "email": user.email }),
            self.clock.now(),
        ))?;
        info!(company = %company.id, user = %user.id, "employee deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shiftledger_core::clock::FixedClock;

    use crate::email::{CapturedEmail, CapturingEmailSender};
    use crate::service::AuthService;

    struct Ctx {
        store: Arc<Store>,
        email: Arc<CapturingEmailSender>,
        service: EmployeeService,
        company: Company,
        admin: User,
    }

    fn setup(name: &str) -> Ctx {
        let dir = std::env::temp_dir().join(format!("shiftledger_users_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let store = Arc::new(Store::open(&dir).unwrap());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        ));
        let codec = Arc::new(TokenCodec::new(b"users-test-secret"));
        let email = Arc::new(CapturingEmailSender::new());

        let auth = AuthService::new(store.clone(), clock.clone(), codec.clone());
        let (company, admin, _) = auth
            .register_company("Demo", "Ana", "ana@example.com", "Passw0rd!")
            .unwrap();

        let service = EmployeeService::new(store.clone(), clock, codec, email.clone());
        Ctx { store, email, service, company, admin }
    }

    fn frontdesk_create(email: &str, pin: Option<&str>) -> EmployeeCreate {
        EmployeeCreate {
            name: "Pat".to_string(),
            email: email.to_string(),
            role: Role::Frontdesk,
            job_role: None,
            pay_rate_cents: 2_500,
            overtime_multiplier: None,
            pin: pin.map(String::from),
            send_invite: true,
        }
    }

    #[tokio::test]
    async fn create_sends_invitation() {
        let ctx = setup("invite");
        let user = ctx
            .service
            .create(&ctx.company, frontdesk_create("pat@example.com", Some("1234")), ctx.admin.id)
            .await
            .unwrap();
        assert!(user.pin_hash.is_some());
        assert!(matches!(
            ctx.email.last(),
            Some(CapturedEmail::PasswordSetup { .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_pin_rejected_within_company() {
        let ctx = setup("dup_pin");
        ctx.service
            .create(&ctx.company, frontdesk_create("a@example.com", Some("1234")), ctx.admin.id)
            .await
            .unwrap();

        let err = ctx
            .service
            .create(&ctx.company, frontdesk_create("b@example.com", Some("1234")), ctx.admin.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ShiftledgerError::DuplicatePin));

        // A different PIN is fine.
        ctx.service
            .create(&ctx.company, frontdesk_create("b@example.com", Some("4321")), ctx.admin.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pin_change_audits_and_clears() {
        let ctx = setup("pin_change");
        let user = ctx
            .service
            .create(&ctx.company, frontdesk_create("pat@example.com", Some("1234")), ctx.admin.id)
            .await
            .unwrap();

        // Change.
        ctx.service
            .update(
                &ctx.company,
                user.id,
                EmployeeUpdate { pin: Some("5678".to_string()), ..EmployeeUpdate::default() },
                ctx.admin.id,
            )
            .unwrap();
        // Clear.
        let cleared = ctx
            .service
            .update(
                &ctx.company,
                user.id,
                EmployeeUpdate { pin: Some(String::new()), ..EmployeeUpdate::default() },
                ctx.admin.id,
            )
            .unwrap();
        assert!(cleared.pin_hash.is_none());

        let actions: Vec<_> = ctx
            .store
            .iter_company_audits(&ctx.company.id)
            .unwrap()
            .into_iter()
            .map(|a| a.action)
            .collect();
        assert!(actions.contains(&"pin_changed".to_string()));
        assert!(actions.contains(&"pin_cleared".to_string()));
    }

    #[tokio::test]
    async fn bad_pin_format_rejected() {
        let ctx = setup("pin_format");
        let err = ctx
            .service
            .create(&ctx.company, frontdesk_create("pat@example.com", Some("12ab")), ctx.admin.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ShiftledgerError::InvalidPinFormat));
    }

    #[tokio::test]
    async fn email_change_resets_verification_and_reindexes() {
        let ctx = setup("email_change");
        let user = ctx
            .service
            .create(&ctx.company, frontdesk_create("pat@example.com", None), ctx.admin.id)
            .await
            .unwrap();

        ctx.service
            .update(
                &ctx.company,
                user.id,
                EmployeeUpdate {
                    email: Some("patricia@example.com".to_string()),
                    ..EmployeeUpdate::default()
                },
                ctx.admin.id,
            )
            .unwrap();

        assert!(ctx
            .store
            .find_user_by_email(&ctx.company.id, "pat@example.com")
            .unwrap()
            .is_none());
        let moved = ctx
            .store
            .find_user_by_email(&ctx.company.id, "patricia@example.com")
            .unwrap()
            .unwrap();
        assert!(!moved.email_verified);
    }

    #[tokio::test]
    async fn delete_cascades_everything() {
        let ctx = setup("cascade");
        let user = ctx
            .service
            .create(&ctx.company, frontdesk_create("pat@example.com", None), ctx.admin.id)
            .await
            .unwrap();

        // Seed an entry for them.
        let now = Utc::now();
        let entry = shiftledger_core::time_entry::TimeEntry {
            id: shiftledger_core::types::EntryId::generate(),
            company_id: ctx.company.id,
            employee_id: user.id,
            clock_in_at: now,
            clock_out_at: None,
            break_minutes: 0,
            source: shiftledger_core::time_entry::EntrySource::Web,
            status: shiftledger_core::time_entry::EntryStatus::Open,
            note: None,
            edited_by: None,
            edit_reason: None,
            clock_in_meta: Default::default(),
            clock_out_meta: Default::default(),
            created_at: now,
            updated_at: now,
        };
        ctx.store.put_entry(&entry).unwrap();
        ctx.store
            .claim_open_entry(&ctx.company.id, &user.id, &entry.id)
            .unwrap();

        ctx.service.delete(&ctx.company, user.id, ctx.admin.id).unwrap();

        assert!(ctx.store.get_user(&user.id).unwrap().is_none());
        assert!(ctx.store.get_entry(&entry.id).unwrap().is_none());
        assert!(ctx
            .store
            .open_entry_id(&ctx.company.id, &user.id)
            .unwrap()
            .is_none());
        // The email slot is free again.
        assert!(ctx
            .store
            .find_user_by_email(&ctx.company.id, "pat@example.com")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn self_deletion_refused() {
        let ctx = setup("self_delete");
        let err = ctx
            .service
            .delete(&ctx.company, ctx.admin.id, ctx.admin.id)
            .unwrap_err();
        assert!(matches!(err, ShiftledgerError::Validation(_)));
    }
}
