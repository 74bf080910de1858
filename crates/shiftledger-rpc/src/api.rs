use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use shiftledger_core::types::{
    CashSessionId, EntryId, LeaveRequestId, RunId, ShiftId, UserId,
};

use crate::types::{
    RpcAuthResponse, RpcBulkPreview, RpcBulkResult, RpcBulkWeek, RpcCashEdit, RpcCashExportRow,
    RpcCashFilter, RpcCashPage, RpcCashSession, RpcCashSummary, RpcCompany, RpcEmployeeCreate,
    RpcEmployeeUpdate, RpcEntryEdit, RpcEntryFilter, RpcEntryPage, RpcGenerateFromTemplate,
    RpcGeneratePayroll, RpcGeneratedShifts, RpcHealth, RpcKioskClock, RpcKioskInfo, RpcLeave,
    RpcLeaveCreate, RpcLeavePage, RpcLogin, RpcManualEntry, RpcMyPayrollItem,
    RpcPayrollExportRow, RpcPinCheck, RpcPunch, RpcPunchResult, RpcRegisterCompany, RpcRun,
    RpcRunDetail, RpcRunFilter, RpcRunPage, RpcSetupInfo, RpcShift, RpcShiftCreate,
    RpcShiftFilter, RpcShiftPage, RpcShiftUpdate, RpcShiftWithConflicts, RpcTemplate,
    RpcTemplateCreate, RpcTimeEntry, RpcTokenPair, RpcUser,
};

/// Shiftledger JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "sl_" via `namespace = "sl"`.
/// Protected methods take the bearer access token as their first parameter;
/// the adapter enforces role/permission and the verified-email gate before
/// touching an engine.
#[rpc(server, namespace = "sl")]
pub trait ShiftledgerApi {
    // ── Auth ─────────────────────────────────────────────────────────────────

    /// Create a company plus its first admin; returns a token pair.
    #[method(name = "registerCompany")]
    async fn register_company(&self, request: RpcRegisterCompany) -> RpcResult<RpcAuthResponse>;

    /// Password login; returns a token pair.
    #[method(name = "login")]
    async fn login(&self, request: RpcLogin) -> RpcResult<RpcAuthResponse>;

    /// Rotate a refresh token. Reuse of a rotated token revokes every live
    /// session for the user.
    #[method(name = "refresh")]
    async fn refresh(&self, refresh_token: String) -> RpcResult<RpcTokenPair>;

    /// Revoke the session behind the presented refresh token.
    #[method(name = "logout")]
    async fn logout(&self, refresh_token: String) -> RpcResult<bool>;

    /// Issue a 6-digit verification code. Unknown addresses report success.
    #[method(name = "sendVerificationCode")]
    async fn send_verification_code(&self, email: String) -> RpcResult<bool>;

    #[method(name = "verifyEmail")]
    async fn verify_email(&self, email: String, code: String) -> RpcResult<bool>;

    /// Always reports success; the account-enumeration surface.
    #[method(name = "forgotPassword")]
    async fn forgot_password(&self, email: String) -> RpcResult<bool>;

    #[method(name = "resetPassword")]
    async fn reset_password(
        &self,
        email: String,
        code: String,
        new_password: String,
    ) -> RpcResult<bool>;

    /// Resolve a password-setup (invitation) token.
    #[method(name = "passwordSetupInfo")]
    async fn password_setup_info(&self, token: String) -> RpcResult<RpcSetupInfo>;

    #[method(name = "setPassword")]
    async fn set_password(&self, token: String, new_password: String) -> RpcResult<bool>;

    // ── Kiosk (public, keyed by slug) ────────────────────────────────────────

    #[method(name = "kioskInfo")]
    async fn kiosk_info(&self, slug: String) -> RpcResult<RpcKioskInfo>;

    /// Validate a PIN and report the employee's punch state.
    #[method(name = "kioskCheckPin")]
    async fn kiosk_check_pin(&self, slug: String, pin: String) -> RpcResult<RpcPinCheck>;

    /// The kiosk punch: toggles clock-in/clock-out for the PIN's owner.
    #[method(name = "kioskClock")]
    async fn kiosk_clock(&self, request: RpcKioskClock) -> RpcResult<RpcPunchResult>;

    // ── Time entries ─────────────────────────────────────────────────────────

    /// Admin-assisted punch for an employee resolved by id or email.
    #[method(name = "timePunch")]
    async fn time_punch(&self, token: String, request: RpcPunch) -> RpcResult<RpcPunchResult>;

    /// Self-service punch for the authenticated employee (no PIN).
    #[method(name = "timePunchMe")]
    async fn time_punch_me(
        &self,
        token: String,
        cash: crate::types::RpcCashAmounts,
    ) -> RpcResult<RpcPunchResult>;

    #[method(name = "timeMy")]
    async fn time_my(&self, token: String, filter: RpcEntryFilter) -> RpcResult<RpcEntryPage>;

    #[method(name = "timeAdminList")]
    async fn time_admin_list(
        &self,
        token: String,
        filter: RpcEntryFilter,
    ) -> RpcResult<RpcEntryPage>;

    #[method(name = "timeAdminEdit")]
    async fn time_admin_edit(
        &self,
        token: String,
        entry_id: EntryId,
        edit: RpcEntryEdit,
    ) -> RpcResult<RpcTimeEntry>;

    #[method(name = "timeAdminDelete")]
    async fn time_admin_delete(&self, token: String, entry_id: EntryId) -> RpcResult<bool>;

    #[method(name = "timeAdminCreateManual")]
    async fn time_admin_create_manual(
        &self,
        token: String,
        request: RpcManualEntry,
    ) -> RpcResult<RpcTimeEntry>;

    // ── Cash drawer (admin) ──────────────────────────────────────────────────

    #[method(name = "cashList")]
    async fn cash_list(&self, token: String, filter: RpcCashFilter) -> RpcResult<RpcCashPage>;

    #[method(name = "cashSummary")]
    async fn cash_summary(
        &self,
        token: String,
        filter: RpcCashFilter,
    ) -> RpcResult<RpcCashSummary>;

    #[method(name = "cashGet")]
    async fn cash_get(&self, token: String, session_id: CashSessionId)
        -> RpcResult<RpcCashSession>;

    /// Gated by the `cash_drawer_allow_edit` company setting.
    #[method(name = "cashEdit")]
    async fn cash_edit(
        &self,
        token: String,
        session_id: CashSessionId,
        edit: RpcCashEdit,
    ) -> RpcResult<RpcCashSession>;

    /// Review always lands the session on CLOSED.
    #[method(name = "cashReview")]
    async fn cash_review(
        &self,
        token: String,
        session_id: CashSessionId,
        note: Option<String>,
    ) -> RpcResult<RpcCashSession>;

    #[method(name = "cashExport")]
    async fn cash_export(
        &self,
        token: String,
        filter: RpcCashFilter,
    ) -> RpcResult<Vec<RpcCashExportRow>>;

    // ── Scheduling ───────────────────────────────────────────────────────────

    #[method(name = "shiftsList")]
    async fn shifts_list(&self, token: String, filter: RpcShiftFilter)
        -> RpcResult<RpcShiftPage>;

    /// Conflicts are returned alongside the saved shift; the save is not
    /// blocked (admin override).
    #[method(name = "shiftsCreate")]
    async fn shifts_create(
        &self,
        token: String,
        request: RpcShiftCreate,
    ) -> RpcResult<RpcShiftWithConflicts>;

    #[method(name = "shiftsUpdate")]
    async fn shifts_update(
        &self,
        token: String,
        shift_id: ShiftId,
        update: RpcShiftUpdate,
    ) -> RpcResult<RpcShiftWithConflicts>;

    #[method(name = "shiftsApprove")]
    async fn shifts_approve(&self, token: String, shift_id: ShiftId) -> RpcResult<RpcShift>;

    #[method(name = "shiftsDelete")]
    async fn shifts_delete(&self, token: String, shift_id: ShiftId) -> RpcResult<bool>;

    #[method(name = "shiftsCreateTemplate")]
    async fn shifts_create_template(
        &self,
        token: String,
        request: RpcTemplateCreate,
    ) -> RpcResult<RpcTemplate>;

    #[method(name = "shiftsGenerateFromTemplate")]
    async fn shifts_generate_from_template(
        &self,
        token: String,
        request: RpcGenerateFromTemplate,
    ) -> RpcResult<RpcGeneratedShifts>;

    /// Identical to `shiftsBulkWeek` but persists nothing.
    #[method(name = "shiftsBulkWeekPreview")]
    async fn shifts_bulk_week_preview(
        &self,
        token: String,
        request: RpcBulkWeek,
    ) -> RpcResult<RpcBulkPreview>;

    #[method(name = "shiftsBulkWeek")]
    async fn shifts_bulk_week(
        &self,
        token: String,
        request: RpcBulkWeek,
    ) -> RpcResult<RpcBulkResult>;

    // ── Payroll ──────────────────────────────────────────────────────────────

    #[method(name = "payrollGenerate")]
    async fn payroll_generate(
        &self,
        token: String,
        request: RpcGeneratePayroll,
    ) -> RpcResult<RpcRunDetail>;

    #[method(name = "payrollList")]
    async fn payroll_list(&self, token: String, filter: RpcRunFilter) -> RpcResult<RpcRunPage>;

    #[method(name = "payrollGet")]
    async fn payroll_get(&self, token: String, run_id: RunId) -> RpcResult<RpcRunDetail>;

    #[method(name = "payrollFinalize")]
    async fn payroll_finalize(
        &self,
        token: String,
        run_id: RunId,
        note: Option<String>,
    ) -> RpcResult<RpcRun>;

    #[method(name = "payrollVoid")]
    async fn payroll_void(&self, token: String, run_id: RunId, reason: String)
        -> RpcResult<RpcRun>;

    #[method(name = "payrollDelete")]
    async fn payroll_delete(&self, token: String, run_id: RunId) -> RpcResult<bool>;

    /// The caller's own line items across non-void runs.
    #[method(name = "payrollMy")]
    async fn payroll_my(&self, token: String) -> RpcResult<Vec<RpcMyPayrollItem>>;

    #[method(name = "payrollExport")]
    async fn payroll_export(
        &self,
        token: String,
        run_id: RunId,
    ) -> RpcResult<Vec<RpcPayrollExportRow>>;

    // ── Company ──────────────────────────────────────────────────────────────

    #[method(name = "companyGet")]
    async fn company_get(&self, token: String) -> RpcResult<RpcCompany>;

    #[method(name = "companyUpdateName")]
    async fn company_update_name(&self, token: String, name: String) -> RpcResult<RpcCompany>;

    /// Full settings replacement; unknown keys are rejected, legacy keys
    /// migrated.
    #[method(name = "companyUpdateSettings")]
    async fn company_update_settings(
        &self,
        token: String,
        settings: serde_json::Value,
    ) -> RpcResult<RpcCompany>;

    // ── Users ────────────────────────────────────────────────────────────────

    #[method(name = "usersMe")]
    async fn users_me(&self, token: String) -> RpcResult<RpcUser>;

    #[method(name = "employeesList")]
    async fn employees_list(&self, token: String) -> RpcResult<Vec<RpcUser>>;

    #[method(name = "employeesCreate")]
    async fn employees_create(
        &self,
        token: String,
        request: RpcEmployeeCreate,
    ) -> RpcResult<RpcUser>;

    #[method(name = "employeesUpdate")]
    async fn employees_update(
        &self,
        token: String,
        employee_id: UserId,
        update: RpcEmployeeUpdate,
    ) -> RpcResult<RpcUser>;

    #[method(name = "employeesDelete")]
    async fn employees_delete(&self, token: String, employee_id: UserId) -> RpcResult<bool>;

    // ── Leave ────────────────────────────────────────────────────────────────

    #[method(name = "leaveCreate")]
    async fn leave_create(&self, token: String, request: RpcLeaveCreate) -> RpcResult<RpcLeave>;

    #[method(name = "leaveMy")]
    async fn leave_my(&self, token: String, skip: usize, limit: usize)
        -> RpcResult<RpcLeavePage>;

    #[method(name = "leaveAdminList")]
    async fn leave_admin_list(
        &self,
        token: String,
        status: Option<shiftledger_core::leave::LeaveStatus>,
        skip: usize,
        limit: usize,
    ) -> RpcResult<RpcLeavePage>;

    #[method(name = "leaveReview")]
    async fn leave_review(
        &self,
        token: String,
        leave_id: LeaveRequestId,
        approve: bool,
        comment: Option<String>,
    ) -> RpcResult<RpcLeave>;

    // ── Health ───────────────────────────────────────────────────────────────

    #[method(name = "health")]
    async fn health(&self) -> RpcResult<RpcHealth>;

    #[method(name = "healthReady")]
    async fn health_ready(&self) -> RpcResult<RpcHealth>;

    #[method(name = "healthLive")]
    async fn health_live(&self) -> RpcResult<RpcHealth>;

    /// Sweep OTP state that expired more than a day ago; meant for an
    /// external scheduler.
    #[method(name = "maintenanceCleanupVerification")]
    async fn maintenance_cleanup_verification(&self, token: String) -> RpcResult<usize>;
}
