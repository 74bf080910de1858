use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use shiftledger_core::audit::AuditLog;
use shiftledger_core::clock::Clock;
use shiftledger_core::company::{parse_settings, Company};
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::time_entry::{EntrySource, PunchMeta, TimeEntry};
use shiftledger_core::types::{CashSessionId, EntryId, LeaveRequestId, RunId, ShiftId, UserId};
use shiftledger_core::tz;
use shiftledger_core::user::{Role, User};
use shiftledger_crypto::{TokenCodec, TokenKind};
use shiftledger_auth::{
    AuthService, EmailSender, EmployeeCreate, EmployeeService, EmployeeUpdate,
    PasswordResetService, PermissionService, VerificationService,
};
use shiftledger_payroll::{GenerateRequest, PayrollEngine, RunFilter};
use shiftledger_schedule::{
    BulkWeekRequest, LeaveReview, LeaveService, ScheduleService, ShiftCreate, ShiftFilter,
    ShiftUpdate, TemplateCreate, TemplateService,
};
use shiftledger_store::Store;
use shiftledger_time::cash::CashFilter;
use shiftledger_time::entries::{EntryEdit, EntryFilter, TimeEntryService};
use shiftledger_time::{
    CashAmounts, CashDrawerService, PunchCoordinator, PunchDirection, PunchRequest, PunchTarget,
};

use crate::api::ShiftledgerApiServer;
use crate::types::*;

const DEFAULT_LIMIT: usize = shiftledger_core::constants::DEFAULT_PAGE_SIZE;

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

/// Map an engine error onto the wire: the HTTP-ish status rides in the
/// JSON-RPC error code, and errors that carry a payload attach it as data.
fn to_rpc_err(error: &ShiftledgerError) -> ErrorObject<'static> {
    let code = i32::from(error.status());
    match error {
        ShiftledgerError::VerificationRequired { email } => ErrorObject::owned(
            code,
            error.to_string(),
            Some(json!({ "email": email })),
        ),
        _ => ErrorObject::owned(code, error.to_string(), None::<()>),
    }
}

fn ok<T>(result: Result<T, ShiftledgerError>) -> RpcResult<T> {
    result.map_err(|e| to_rpc_err(&e))
}

/// Shared state passed to the RPC server; the composition root builds the
/// engines once and hands them over.
pub struct RpcServerState {
    pub store: Arc<Store>,
    pub clock: Arc<dyn Clock>,
    pub codec: Arc<TokenCodec>,
    pub email: Arc<dyn EmailSender>,
    pub auth: AuthService,
    pub verification: VerificationService,
    pub reset: PasswordResetService,
    pub employees: EmployeeService,
    pub permissions: PermissionService,
    pub punch: PunchCoordinator,
    pub entries: TimeEntryService,
    pub cash: CashDrawerService,
    pub schedule: ScheduleService,
    pub templates: TemplateService,
    pub leave: LeaveService,
    pub payroll: PayrollEngine,
}

impl RpcServerState {
    pub fn new(
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        codec: Arc<TokenCodec>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            auth: AuthService::new(store.clone(), clock.clone(), codec.clone()),
            verification: VerificationService::new(store.clone(), clock.clone(), email.clone()),
            reset: PasswordResetService::new(store.clone(), clock.clone(), email.clone()),
            employees: EmployeeService::new(
                store.clone(),
                clock.clone(),
                codec.clone(),
                email.clone(),
            ),
            permissions: PermissionService::new(store.clone()),
            punch: PunchCoordinator::new(store.clone(), clock.clone()),
            entries: TimeEntryService::new(store.clone(), clock.clone()),
            cash: CashDrawerService::new(store.clone(), clock.clone()),
            schedule: ScheduleService::new(store.clone(), clock.clone()),
            templates: TemplateService::new(store.clone(), clock.clone()),
            leave: LeaveService::new(store.clone(), clock.clone()),
            payroll: PayrollEngine::new(store.clone(), clock.clone()),
            store,
            clock,
            codec,
            email,
        }
    }
}

pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS headers.
    /// Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }

    // ── Guards ───────────────────────────────────────────────────────────────

    fn authenticate(&self, token: &str) -> RpcResult<(User, Company)> {
        let claims = self
            .state
            .codec
            .verify(token, TokenKind::Access, self.state.clock.now())
            .map_err(|e| to_rpc_err(&e))?;
        let user = ok(self.state.store.require_user(&claims.sub))?;
        if !user.is_active() {
            return Err(to_rpc_err(&ShiftledgerError::AccountInactive));
        }
        let company = ok(self.state.store.require_company(&user.company_id))?;
        Ok((user, company))
    }

    fn require_admin(&self, user: &User) -> RpcResult<()> {
        if user.role != Role::Admin {
            return Err(to_rpc_err(&ShiftledgerError::Forbidden(
                "admin role required".to_string(),
            )));
        }
        Ok(())
    }

    fn require_permission(&self, user: &User, permission: &str) -> RpcResult<()> {
        let allowed = ok(self.state.permissions.user_has_permission(user, permission))?;
        if !allowed {
            return Err(to_rpc_err(&ShiftledgerError::Forbidden(format!(
                "missing permission: {permission}"
            ))));
        }
        Ok(())
    }

    fn require_verified(&self, user: &User) -> RpcResult<()> {
        ok(self.state.verification.ensure_verified(user))
    }

    // ── View helpers ─────────────────────────────────────────────────────────

    fn entry_view(&self, company: &Company, entry: &TimeEntry) -> RpcTimeEntry {
        RpcTimeEntry::from_entry(entry, self.state.entries.rounded_minutes(company, entry))
    }

    fn punch_result(
        &self,
        company: &Company,
        outcome: shiftledger_time::PunchOutcome,
    ) -> RpcPunchResult {
        RpcPunchResult {
            direction: match outcome.direction {
                PunchDirection::ClockIn => "clock_in".to_string(),
                PunchDirection::ClockOut => "clock_out".to_string(),
            },
            entry: self.entry_view(company, &outcome.entry),
            cash_session: outcome.cash_session.as_ref().map(RpcCashSession::from),
        }
    }

    fn kiosk_company(&self, slug: &str) -> RpcResult<Company> {
        let company = ok(self.state.store.get_company_by_slug(slug))?
            .ok_or_else(|| to_rpc_err(&ShiftledgerError::CompanyNotFound(slug.to_string())))?;
        if !company.kiosk_enabled {
            return Err(to_rpc_err(&ShiftledgerError::Forbidden(
                "kiosk is not enabled for this company".to_string(),
            )));
        }
        Ok(company)
    }
}

fn cash_amounts(cash: RpcCashAmounts) -> CashAmounts {
    CashAmounts {
        cash_start_cents: cash.cash_start_cents,
        cash_end_cents: cash.cash_end_cents,
        collected_cash_cents: cash.collected_cash_cents,
        drop_amount_cents: cash.drop_amount_cents,
        beverages_cash_cents: cash.beverages_cash_cents,
    }
}

#[async_trait]
impl ShiftledgerApiServer for RpcServer {
    // ── Auth ─────────────────────────────────────────────────────────────────

    async fn register_company(&self, request: RpcRegisterCompany) -> RpcResult<RpcAuthResponse> {
        let (company, user, pair) = ok(self.state.auth.register_company(
            &request.company_name,
            &request.admin_name,
            &request.admin_email,
            &request.admin_password,
        ))?;
        Ok(RpcAuthResponse {
            user: RpcUser::from(&user),
            company: RpcCompany::from(&company),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        })
    }

    async fn login(&self, request: RpcLogin) -> RpcResult<RpcAuthResponse> {
        let (user, pair) = ok(self.state.auth.login(
            &request.email,
            &request.password,
            request.ip,
            request.user_agent,
        ))?;
        let company = ok(self.state.store.require_company(&user.company_id))?;
        Ok(RpcAuthResponse {
            user: RpcUser::from(&user),
            company: RpcCompany::from(&company),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        })
    }

    async fn refresh(&self, refresh_token: String) -> RpcResult<RpcTokenPair> {
        let pair = ok(self.state.auth.refresh(&refresh_token, None, None))?;
        Ok(RpcTokenPair {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        })
    }

    async fn logout(&self, refresh_token: String) -> RpcResult<bool> {
        ok(self.state.auth.logout(&refresh_token))?;
        Ok(true)
    }

    async fn send_verification_code(&self, email: String) -> RpcResult<bool> {
        match ok(self.state.store.find_user_by_email_global(&email))? {
            // Unknown addresses report success; this surface must not
            // confirm account existence.
            None => Ok(true),
            Some(user) => {
                ok(self.state.verification.send_code(user.id).await)?;
                Ok(true)
            }
        }
    }

    async fn verify_email(&self, email: String, code: String) -> RpcResult<bool> {
        let user = ok(self.state.store.find_user_by_email_global(&email))?.ok_or_else(|| {
            to_rpc_err(&ShiftledgerError::Validation(
                "invalid email or verification code".to_string(),
            ))
        })?;
        ok(self.state.verification.verify_code(user.id, &code).await)?;
        Ok(true)
    }

    async fn forgot_password(&self, email: String) -> RpcResult<bool> {
        ok(self.state.reset.request_reset(&email).await)?;
        Ok(true)
    }

    async fn reset_password(
        &self,
        email: String,
        code: String,
        new_password: String,
    ) -> RpcResult<bool> {
        ok(self
            .state
            .reset
            .reset_password(&email, &code, &new_password)
            .await)?;
        Ok(true)
    }

    async fn password_setup_info(&self, token: String) -> RpcResult<RpcSetupInfo> {
        let user = ok(self.state.auth.password_setup_info(&token))?;
        Ok(RpcSetupInfo {
            email: user.email,
            name: user.name,
        })
    }

    async fn set_password(&self, token: String, new_password: String) -> RpcResult<bool> {
        ok(self.state.auth.set_password(&token, &new_password))?;
        Ok(true)
    }

    // ── Kiosk ────────────────────────────────────────────────────────────────

    async fn kiosk_info(&self, slug: String) -> RpcResult<RpcKioskInfo> {
        let company = ok(self.state.store.get_company_by_slug(&slug))?
            .ok_or_else(|| to_rpc_err(&ShiftledgerError::CompanyNotFound(slug.clone())))?;
        Ok(RpcKioskInfo {
            company_name: company.name.clone(),
            slug: company.slug.clone(),
            kiosk_enabled: company.kiosk_enabled,
            cash_drawer_enabled: company.settings.cash_drawer_enabled,
            cash_drawer_starting_amount_cents: company
                .settings
                .cash_drawer_starting_amount_cents,
        })
    }

    async fn kiosk_check_pin(&self, slug: String, pin: String) -> RpcResult<RpcPinCheck> {
        // Unknown slug, disabled kiosk, and unknown PIN all collapse to an
        // invalid response rather than an error.
        let invalid = RpcPinCheck {
            valid: false,
            employee_name: None,
            clocked_in: None,
            verification_required: None,
            email: None,
        };
        let Some(company) = ok(self.state.store.get_company_by_slug(&slug))? else {
            return Ok(invalid);
        };
        if !company.kiosk_enabled {
            return Ok(invalid);
        }
        let Ok(employee) = self.state.punch.resolve_by_pin(&company, &pin) else {
            return Ok(invalid);
        };

        let needs_verification = employee.needs_verification(self.state.clock.now());
        let clocked_in = ok(self.state.punch.is_clocked_in(&company, &employee))?;
        Ok(RpcPinCheck {
            valid: true,
            employee_name: Some(employee.name.clone()),
            clocked_in: Some(clocked_in),
            verification_required: Some(needs_verification),
            email: needs_verification.then(|| employee.email.clone()),
        })
    }

    async fn kiosk_clock(&self, request: RpcKioskClock) -> RpcResult<RpcPunchResult> {
        let company = self.kiosk_company(&request.company_slug)?;
        let employee = ok(self.state.punch.resolve_by_pin(&company, &request.pin))?;

        let outcome = ok(self
            .state
            .punch
            .punch(
                &company,
                PunchRequest {
                    target: PunchTarget::ById(employee.id),
                    pin: None,
                    // The PIN resolution above already proved it.
                    skip_pin_verification: true,
                    source: EntrySource::Kiosk,
                    cash: cash_amounts(request.cash),
                    meta: PunchMeta {
                        ip: request.ip,
                        user_agent: request.user_agent,
                        latitude: request.latitude,
                        longitude: request.longitude,
                    },
                },
            )
            .await)?;
        Ok(self.punch_result(&company, outcome))
    }

    // ── Time entries ─────────────────────────────────────────────────────────

    async fn time_punch(&self, token: String, request: RpcPunch) -> RpcResult<RpcPunchResult> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_verified(&caller)?;

        let target = match (request.employee_id, request.employee_email) {
            (Some(id), _) => PunchTarget::ById(id),
            (None, Some(email)) => PunchTarget::ByEmail(email),
            (None, None) => {
                return Err(to_rpc_err(&ShiftledgerError::Validation(
                    "either employee_id or employee_email required".to_string(),
                )))
            }
        };
        let outcome = ok(self
            .state
            .punch
            .punch(
                &company,
                PunchRequest {
                    target,
                    pin: request.pin,
                    skip_pin_verification: false,
                    source: EntrySource::Web,
                    cash: cash_amounts(request.cash),
                    meta: PunchMeta::default(),
                },
            )
            .await)?;
        Ok(self.punch_result(&company, outcome))
    }

    async fn time_punch_me(
        &self,
        token: String,
        cash: RpcCashAmounts,
    ) -> RpcResult<RpcPunchResult> {
        let (caller, company) = self.authenticate(&token)?;
        let outcome = ok(self
            .state
            .punch
            .punch(
                &company,
                PunchRequest {
                    target: PunchTarget::ById(caller.id),
                    pin: None,
                    // An authenticated web session stands in for the PIN.
                    skip_pin_verification: true,
                    source: EntrySource::Web,
                    cash: cash_amounts(cash),
                    meta: PunchMeta::default(),
                },
            )
            .await)?;
        Ok(self.punch_result(&company, outcome))
    }

    async fn time_my(&self, token: String, filter: RpcEntryFilter) -> RpcResult<RpcEntryPage> {
        let (caller, company) = self.authenticate(&token)?;
        let (entries, total) = ok(self.state.entries.list_for_employee(
            &company,
            caller.id,
            filter.from,
            filter.to,
            filter.skip,
            filter.limit.unwrap_or(DEFAULT_LIMIT),
        ))?;
        Ok(RpcEntryPage {
            items: entries.iter().map(|e| self.entry_view(&company, e)).collect(),
            total,
        })
    }

    async fn time_admin_list(
        &self,
        token: String,
        filter: RpcEntryFilter,
    ) -> RpcResult<RpcEntryPage> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        let (entries, total) = ok(self.state.entries.list(
            &company,
            &EntryFilter {
                employee_id: filter.employee_id,
                from: filter.from,
                to: filter.to,
                status: filter.status,
            },
            filter.skip,
            filter.limit.unwrap_or(DEFAULT_LIMIT),
        ))?;
        Ok(RpcEntryPage {
            items: entries.iter().map(|e| self.entry_view(&company, e)).collect(),
            total,
        })
    }

    async fn time_admin_edit(
        &self,
        token: String,
        entry_id: EntryId,
        edit: RpcEntryEdit,
    ) -> RpcResult<RpcTimeEntry> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        let entry = ok(self.state.entries.edit(
            &company,
            entry_id,
            caller.id,
            EntryEdit {
                clock_in_at: edit.clock_in_at,
                clock_out_at: edit.clock_out_at,
                break_minutes: edit.break_minutes,
                note: edit.note,
                reason: edit.reason,
            },
        ))?;
        Ok(self.entry_view(&company, &entry))
    }

    async fn time_admin_delete(&self, token: String, entry_id: EntryId) -> RpcResult<bool> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        ok(self.state.entries.delete(&company, entry_id, caller.id))?;
        Ok(true)
    }

    async fn time_admin_create_manual(
        &self,
        token: String,
        request: RpcManualEntry,
    ) -> RpcResult<RpcTimeEntry> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        let entry = ok(self.state.entries.create_manual(
            &company,
            request.employee_id,
            request.clock_in_at,
            request.clock_out_at,
            request.break_minutes,
            request.note,
            caller.id,
        ))?;
        Ok(self.entry_view(&company, &entry))
    }

    // ── Cash drawer ──────────────────────────────────────────────────────────

    async fn cash_list(&self, token: String, filter: RpcCashFilter) -> RpcResult<RpcCashPage> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "cash_drawer.view")?;
        self.require_verified(&caller)?;
        let (sessions, total) = ok(self.state.cash.list(
            &company,
            &CashFilter {
                from: filter.from,
                to: filter.to,
                employee_id: filter.employee_id,
                status: filter.status,
            },
            filter.skip,
            filter.limit.unwrap_or(DEFAULT_LIMIT),
        ))?;
        Ok(RpcCashPage {
            items: sessions.iter().map(RpcCashSession::from).collect(),
            total,
        })
    }

    async fn cash_summary(
        &self,
        token: String,
        filter: RpcCashFilter,
    ) -> RpcResult<RpcCashSummary> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "cash_drawer.view")?;
        self.require_verified(&caller)?;
        ok(self.state.cash.summary(
            &company,
            &CashFilter {
                from: filter.from,
                to: filter.to,
                employee_id: filter.employee_id,
                status: filter.status,
            },
        ))
    }

    async fn cash_get(
        &self,
        token: String,
        session_id: CashSessionId,
    ) -> RpcResult<RpcCashSession> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "cash_drawer.view")?;
        self.require_verified(&caller)?;
        let session = ok(self.state.cash.get(&company, session_id))?;
        Ok(RpcCashSession::from(&session))
    }

    async fn cash_edit(
        &self,
        token: String,
        session_id: CashSessionId,
        edit: RpcCashEdit,
    ) -> RpcResult<RpcCashSession> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        let session = ok(self.state.cash.edit(
            &company,
            session_id,
            caller.id,
            edit.start_cash_cents,
            edit.end_cash_cents,
            &edit.reason,
        ))?;
        Ok(RpcCashSession::from(&session))
    }

    async fn cash_review(
        &self,
        token: String,
        session_id: CashSessionId,
        note: Option<String>,
    ) -> RpcResult<RpcCashSession> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        let session = ok(self.state.cash.review(&company, session_id, caller.id, note))?;
        Ok(RpcCashSession::from(&session))
    }

    async fn cash_export(
        &self,
        token: String,
        filter: RpcCashFilter,
    ) -> RpcResult<Vec<RpcCashExportRow>> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        ok(self.state.cash.export_rows(
            &company,
            &CashFilter {
                from: filter.from,
                to: filter.to,
                employee_id: filter.employee_id,
                status: filter.status,
            },
        ))
    }

    // ── Scheduling ───────────────────────────────────────────────────────────

    async fn shifts_list(&self, token: String, filter: RpcShiftFilter) -> RpcResult<RpcShiftPage> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "schedules.view")?;
        self.require_verified(&caller)?;
        let (shifts, total) = ok(self.state.schedule.list(
            &company,
            &ShiftFilter {
                employee_id: filter.employee_id,
                start_date: filter.start_date,
                end_date: filter.end_date,
                status: filter.status,
            },
            filter.skip,
            filter.limit.unwrap_or(DEFAULT_LIMIT),
        ))?;
        Ok(RpcShiftPage {
            items: shifts.iter().map(RpcShift::from).collect(),
            total,
        })
    }

    async fn shifts_create(
        &self,
        token: String,
        request: RpcShiftCreate,
    ) -> RpcResult<RpcShiftWithConflicts> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "schedules.create")?;
        self.require_verified(&caller)?;
        let (shift, conflicts) = ok(self.state.schedule.create(
            &company,
            ShiftCreate {
                employee_id: request.employee_id,
                shift_date: request.shift_date,
                start_time: request.start_time,
                end_time: request.end_time,
                break_minutes: request.break_minutes,
                notes: request.notes,
                job_role: request.job_role,
                requires_approval: request.requires_approval,
            },
            Some(caller.id),
        ))?;
        Ok(RpcShiftWithConflicts {
            shift: RpcShift::from(&shift),
            conflicts,
        })
    }

    async fn shifts_update(
        &self,
        token: String,
        shift_id: ShiftId,
        update: RpcShiftUpdate,
    ) -> RpcResult<RpcShiftWithConflicts> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "schedules.edit")?;
        self.require_verified(&caller)?;
        let (shift, conflicts) = ok(self.state.schedule.update(
            &company,
            shift_id,
            ShiftUpdate {
                shift_date: update.shift_date,
                start_time: update.start_time,
                end_time: update.end_time,
                break_minutes: update.break_minutes,
                notes: update.notes,
                job_role: update.job_role,
                status: update.status,
                requires_approval: update.requires_approval,
            },
        ))?;
        Ok(RpcShiftWithConflicts {
            shift: RpcShift::from(&shift),
            conflicts,
        })
    }

    async fn shifts_approve(&self, token: String, shift_id: ShiftId) -> RpcResult<RpcShift> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        let shift = ok(self.state.schedule.approve(&company, shift_id, caller.id))?;
        Ok(RpcShift::from(&shift))
    }

    async fn shifts_delete(&self, token: String, shift_id: ShiftId) -> RpcResult<bool> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "schedules.delete")?;
        self.require_verified(&caller)?;
        ok(self.state.schedule.delete(&company, shift_id))?;
        Ok(true)
    }

    async fn shifts_create_template(
        &self,
        token: String,
        request: RpcTemplateCreate,
    ) -> RpcResult<RpcTemplate> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        let template = ok(self.state.templates.create(
            &company,
            TemplateCreate {
                name: request.name,
                description: request.description,
                employee_id: request.employee_id,
                department: request.department,
                job_role: request.job_role,
                template_type: request.template_type,
                day_of_week: request.day_of_week,
                day_of_month: request.day_of_month,
                week_of_month: request.week_of_month,
                start_date: request.start_date,
                end_date: request.end_date,
                start_time: request.start_time,
                end_time: request.end_time,
                break_minutes: request.break_minutes,
                requires_approval: request.requires_approval,
                is_active: request.is_active,
            },
            Some(caller.id),
        ))?;
        Ok(RpcTemplate::from(&template))
    }

    async fn shifts_generate_from_template(
        &self,
        token: String,
        request: RpcGenerateFromTemplate,
    ) -> RpcResult<RpcGeneratedShifts> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        let (shifts, conflicts) = ok(self.state.templates.generate(
            &company,
            request.template_id,
            request.employee_ids,
            request.start_date,
            request.end_date,
        ))?;
        Ok(RpcGeneratedShifts {
            shifts: shifts.iter().map(RpcShift::from).collect(),
            conflicts,
        })
    }

    async fn shifts_bulk_week_preview(
        &self,
        token: String,
        request: RpcBulkWeek,
    ) -> RpcResult<RpcBulkPreview> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        let (shifts, conflicts) = ok(self
            .state
            .schedule
            .preview_bulk_week(&company, &bulk_request(request)))?;
        Ok(RpcBulkPreview { shifts, conflicts })
    }

    async fn shifts_bulk_week(
        &self,
        token: String,
        request: RpcBulkWeek,
    ) -> RpcResult<RpcBulkResult> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;

        let bulk = bulk_request(request);
        match self.state.schedule.create_bulk_week(&company, &bulk, caller.id) {
            Ok(result) => Ok(result),
            // Under the error policy the 409 carries the conflict list.
            Err(ShiftledgerError::ScheduleConflicts(count)) => {
                let (_, conflicts) = ok(self.state.schedule.preview_bulk_week(&company, &bulk))?;
                Err(ErrorObject::owned(
                    409,
                    format!("{count} scheduling conflict(s) detected"),
                    Some(json!({ "conflicts": conflicts })),
                ))
            }
            Err(other) => Err(to_rpc_err(&other)),
        }
    }

    // ── Payroll ──────────────────────────────────────────────────────────────

    async fn payroll_generate(
        &self,
        token: String,
        request: RpcGeneratePayroll,
    ) -> RpcResult<RpcRunDetail> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        let (run, items) = ok(self.state.payroll.generate(
            &company,
            &GenerateRequest {
                payroll_type: request.payroll_type,
                start_date: request.start_date,
                employee_ids: request.employee_ids,
                include_inactive: request.include_inactive,
                allow_duplicate: request.allow_duplicate,
                strict: request.strict,
            },
            caller.id,
        ))?;
        Ok(RpcRunDetail {
            run: RpcRun::from(&run),
            line_items: items.iter().map(RpcLineItem::from).collect(),
        })
    }

    async fn payroll_list(&self, token: String, filter: RpcRunFilter) -> RpcResult<RpcRunPage> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "payroll.view")?;
        self.require_verified(&caller)?;
        let (runs, total) = ok(self.state.payroll.list(
            &company,
            &RunFilter {
                from: filter.from,
                to: filter.to,
                status: filter.status,
                payroll_type: filter.payroll_type,
            },
            filter.skip,
            filter.limit.unwrap_or(DEFAULT_LIMIT),
        ))?;
        Ok(RpcRunPage {
            items: runs.iter().map(RpcRun::from).collect(),
            total,
        })
    }

    async fn payroll_get(&self, token: String, run_id: RunId) -> RpcResult<RpcRunDetail> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "payroll.view")?;
        self.require_verified(&caller)?;
        let (run, items) = ok(self.state.payroll.get(&company, run_id))?;
        Ok(RpcRunDetail {
            run: RpcRun::from(&run),
            line_items: items.iter().map(RpcLineItem::from).collect(),
        })
    }

    async fn payroll_finalize(
        &self,
        token: String,
        run_id: RunId,
        note: Option<String>,
    ) -> RpcResult<RpcRun> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        let run = ok(self.state.payroll.finalize(&company, run_id, caller.id, note))?;
        Ok(RpcRun::from(&run))
    }

    async fn payroll_void(
        &self,
        token: String,
        run_id: RunId,
        reason: String,
    ) -> RpcResult<RpcRun> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        let run = ok(self.state.payroll.void(&company, run_id, caller.id, reason))?;
        Ok(RpcRun::from(&run))
    }

    async fn payroll_delete(&self, token: String, run_id: RunId) -> RpcResult<bool> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        ok(self.state.payroll.delete(&company, run_id, caller.id))?;
        Ok(true)
    }

    async fn payroll_my(&self, token: String) -> RpcResult<Vec<RpcMyPayrollItem>> {
        let (caller, company) = self.authenticate(&token)?;
        let items = ok(self.state.payroll.items_for_employee(&company, caller.id))?;
        Ok(items
            .iter()
            .map(|(run, item)| RpcMyPayrollItem {
                run: RpcRun::from(run),
                line_item: RpcLineItem::from(item),
            })
            .collect())
    }

    async fn payroll_export(
        &self,
        token: String,
        run_id: RunId,
    ) -> RpcResult<Vec<RpcPayrollExportRow>> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "reports.export")?;
        self.require_verified(&caller)?;
        ok(self.state.payroll.export_rows(&company, run_id))
    }

    // ── Company ──────────────────────────────────────────────────────────────

    async fn company_get(&self, token: String) -> RpcResult<RpcCompany> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "settings.view")?;
        Ok(RpcCompany::from(&company))
    }

    async fn company_update_name(&self, token: String, name: String) -> RpcResult<RpcCompany> {
        let (caller, mut company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        if name.trim().is_empty() {
            return Err(to_rpc_err(&ShiftledgerError::Validation(
                "company name is required".to_string(),
            )));
        }
        let old_name = company.name.clone();
        company.name = name.trim().to_string();
        ok(self.state.store.put_company(&company))?;
        ok(self.state.store.append_audit(&AuditLog::new(
            company.id,
            Some(caller.id),
            "COMPANY_NAME_UPDATE",
            "company",
            company.id,
            json!({ "old_name": old_name, "new_name": company.name }),
            self.state.clock.now(),
        )))?;
        Ok(RpcCompany::from(&company))
    }

    async fn company_update_settings(
        &self,
        token: String,
        settings: serde_json::Value,
    ) -> RpcResult<RpcCompany> {
        let (caller, mut company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;

        let parsed = ok(parse_settings(settings))?;
        ok(tz::parse_timezone(&parsed.timezone).map(|_| ()))?;
        if parsed.payroll_week_start_day > 6 {
            return Err(to_rpc_err(&ShiftledgerError::Validation(
                "payroll_week_start_day must be 0-6".to_string(),
            )));
        }

        company.settings = parsed;
        ok(self.state.store.put_company(&company))?;
        ok(self.state.store.append_audit(&AuditLog::new(
            company.id,
            Some(caller.id),
            "COMPANY_SETTINGS_UPDATE",
            "company",
            company.id,
            serde_json::to_value(&company.settings).unwrap_or_default(),
            self.state.clock.now(),
        )))?;
        Ok(RpcCompany::from(&company))
    }

    // ── Users ────────────────────────────────────────────────────────────────

    async fn users_me(&self, token: String) -> RpcResult<RpcUser> {
        let (caller, _) = self.authenticate(&token)?;
        Ok(RpcUser::from(&caller))
    }

    async fn employees_list(&self, token: String) -> RpcResult<Vec<RpcUser>> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "employees.view")?;
        self.require_verified(&caller)?;
        let users = ok(self.state.employees.list(&company))?;
        Ok(users.iter().map(RpcUser::from).collect())
    }

    async fn employees_create(
        &self,
        token: String,
        request: RpcEmployeeCreate,
    ) -> RpcResult<RpcUser> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        let role = ok(Role::parse_strict(&request.role))?;
        let user = ok(self
            .state
            .employees
            .create(
                &company,
                EmployeeCreate {
                    name: request.name,
                    email: request.email,
                    role,
                    job_role: request.job_role,
                    pay_rate_cents: request.pay_rate_cents,
                    overtime_multiplier: request.overtime_multiplier,
                    pin: request.pin,
                    send_invite: request.send_invite,
                },
                caller.id,
            )
            .await)?;
        Ok(RpcUser::from(&user))
    }

    async fn employees_update(
        &self,
        token: String,
        employee_id: UserId,
        update: RpcEmployeeUpdate,
    ) -> RpcResult<RpcUser> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        let role = match update.role {
            Some(name) => Some(ok(Role::parse_strict(&name))?),
            None => None,
        };
        let user = ok(self.state.employees.update(
            &company,
            employee_id,
            EmployeeUpdate {
                name: update.name,
                email: update.email,
                role,
                status: update.status,
                job_role: update.job_role,
                pay_rate_cents: update.pay_rate_cents,
                overtime_multiplier: update.overtime_multiplier,
                pin: update.pin,
            },
            caller.id,
        ))?;
        Ok(RpcUser::from(&user))
    }

    async fn employees_delete(&self, token: String, employee_id: UserId) -> RpcResult<bool> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        self.require_verified(&caller)?;
        ok(self.state.employees.delete(&company, employee_id, caller.id))?;
        Ok(true)
    }

    // ── Leave ────────────────────────────────────────────────────────────────

    async fn leave_create(&self, token: String, request: RpcLeaveCreate) -> RpcResult<RpcLeave> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "leave.create")?;
        self.require_verified(&caller)?;
        let leave = ok(self.state.leave.create(
            &company,
            caller.id,
            request.leave_type,
            request.start_date,
            request.end_date,
            request.partial_day_hours,
            request.reason,
        ))?;
        Ok(RpcLeave::from(&leave))
    }

    async fn leave_my(
        &self,
        token: String,
        skip: usize,
        limit: usize,
    ) -> RpcResult<RpcLeavePage> {
        let (caller, company) = self.authenticate(&token)?;
        let (requests, total) =
            ok(self.state.leave.list_for_employee(&company, caller.id, skip, limit))?;
        Ok(RpcLeavePage {
            items: requests.iter().map(RpcLeave::from).collect(),
            total,
        })
    }

    async fn leave_admin_list(
        &self,
        token: String,
        status: Option<shiftledger_core::leave::LeaveStatus>,
        skip: usize,
        limit: usize,
    ) -> RpcResult<RpcLeavePage> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "leave.approve")?;
        self.require_verified(&caller)?;
        let (requests, total) = ok(self.state.leave.list_admin(&company, status, skip, limit))?;
        Ok(RpcLeavePage {
            items: requests.iter().map(RpcLeave::from).collect(),
            total,
        })
    }

    async fn leave_review(
        &self,
        token: String,
        leave_id: LeaveRequestId,
        approve: bool,
        comment: Option<String>,
    ) -> RpcResult<RpcLeave> {
        let (caller, company) = self.authenticate(&token)?;
        self.require_permission(&caller, "leave.approve")?;
        self.require_verified(&caller)?;
        let decision = if approve { LeaveReview::Approve } else { LeaveReview::Reject };
        let leave = ok(self.state.leave.review(
            &company,
            leave_id,
            caller.id,
            decision,
            comment.clone(),
        ))?;

        // Decision mail is best-effort; the review itself is committed.
        if let Ok(Some(employee)) = self.state.store.get_user(&leave.employee_id) {
            let _ = self
                .state
                .email
                .send_leave_update(&employee.email, approve, comment.as_deref())
                .await;
        }
        Ok(RpcLeave::from(&leave))
    }

    // ── Health ───────────────────────────────────────────────────────────────

    async fn health(&self) -> RpcResult<RpcHealth> {
        Ok(RpcHealth {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    async fn health_ready(&self) -> RpcResult<RpcHealth> {
        if !self.state.store.is_ready() {
            return Err(rpc_err(500, "storage not ready"));
        }
        Ok(RpcHealth {
            status: "ready".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    async fn health_live(&self) -> RpcResult<RpcHealth> {
        Ok(RpcHealth {
            status: "live".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    async fn maintenance_cleanup_verification(&self, token: String) -> RpcResult<usize> {
        let (caller, _) = self.authenticate(&token)?;
        self.require_admin(&caller)?;
        ok(self.state.verification.cleanup_expired())
    }
}

fn bulk_request(request: RpcBulkWeek) -> BulkWeekRequest {
    BulkWeekRequest {
        employee_id: request.employee_id,
        week_start_date: request.week_start_date,
        mode: request.mode,
        template: request.template,
        days: request.days,
        conflict_policy: request.conflict_policy,
    }
}
