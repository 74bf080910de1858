use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use shiftledger_core::audit::AuditLog;
use shiftledger_core::cash::{CashDrawerAudit, CashDrawerSession};
use shiftledger_core::company::Company;
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::leave::LeaveRequest;
use shiftledger_core::payroll::{PayrollLineItem, PayrollRun};
use shiftledger_core::permission::RolePermissions;
use shiftledger_core::session::Session;
use shiftledger_core::shift::{Shift, ShiftTemplate};
use shiftledger_core::time_entry::TimeEntry;
use shiftledger_core::types::{
    CashSessionId, CompanyId, EntryId, LeaveRequestId, RunId, SessionId, ShiftId, TemplateId,
    UserId,
};
use shiftledger_core::user::{normalize_email, Role, User};

use crate::locks::LockTable;

fn storage_err(e: sled::Error) -> ShiftledgerError {
    ShiftledgerError::Storage(e.to_string())
}

fn enc<T: Serialize>(value: &T) -> Result<Vec<u8>, ShiftledgerError> {
    bincode::serialize(value).map_err(|e| ShiftledgerError::Serialization(e.to_string()))
}

fn dec<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ShiftledgerError> {
    bincode::deserialize(bytes).map_err(|e| ShiftledgerError::Serialization(e.to_string()))
}

/// Composite key of two 16-byte ids (tenant prefix + entity).
fn pair_key(a: &[u8; 16], b: &[u8; 16]) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(a);
    key[16..].copy_from_slice(b);
    key
}

/// Composite key of a 16-byte id and a utf8 suffix.
fn scoped_key(id: &[u8; 16], suffix: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + suffix.len());
    key.extend_from_slice(id);
    key.extend_from_slice(suffix.as_bytes());
    key
}

/// Persistent store backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   companies         — CompanyId bytes            → bincode(Company)
///   company_slugs     — slug utf8                  → CompanyId bytes
///   users             — UserId bytes               → bincode(User)
///   user_emails       — (CompanyId + email utf8)   → UserId bytes
///   sessions          — (UserId + SessionId)       → bincode(Session)
///   time_entries      — EntryId bytes              → bincode(TimeEntry)
///   open_entries      — (CompanyId + UserId)       → EntryId bytes (at most one)
///   cash_sessions     — CashSessionId bytes        → bincode(CashDrawerSession)
///   cash_by_entry     — EntryId bytes              → CashSessionId bytes
///   cash_audits       — (CashSessionId + u64 be)   → bincode(CashDrawerAudit)
///   shifts            — ShiftId bytes              → bincode(Shift)
///   shift_templates   — TemplateId bytes           → bincode(ShiftTemplate)
///   payroll_runs      — RunId bytes                → bincode(PayrollRun)
///   payroll_items     — (RunId + UserId)           → bincode(PayrollLineItem)
///   leave_requests    — LeaveRequestId bytes       → bincode(LeaveRequest)
///   role_permissions  — (CompanyId + role utf8)    → bincode(RolePermissions)
///   audit_logs        — (CompanyId + u64 be)       → bincode(AuditLog)
///   meta              — utf8 key bytes             → raw bytes
pub struct Store {
    db: sled::Db,
    companies: sled::Tree,
    company_slugs: sled::Tree,
    users: sled::Tree,
    user_emails: sled::Tree,
    sessions: sled::Tree,
    time_entries: sled::Tree,
    open_entries: sled::Tree,
    cash_sessions: sled::Tree,
    cash_by_entry: sled::Tree,
    cash_audits: sled::Tree,
    shifts: sled::Tree,
    shift_templates: sled::Tree,
    payroll_runs: sled::Tree,
    payroll_items: sled::Tree,
    leave_requests: sled::Tree,
    role_permissions: sled::Tree,
    audit_logs: sled::Tree,
    meta: sled::Tree,
    /// Per-key async locks standing in for row-level `SELECT … FOR UPDATE`.
    pub locks: LockTable,
}

impl Store {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ShiftledgerError> {
        let db = sled::open(path).map_err(storage_err)?;
        let companies        = db.open_tree("companies").map_err(storage_err)?;
        let company_slugs    = db.open_tree("company_slugs").map_err(storage_err)?;
        let users            = db.open_tree("users").map_err(storage_err)?;
        let user_emails      = db.open_tree("user_emails").map_err(storage_err)?;
        let sessions         = db.open_tree("sessions").map_err(storage_err)?;
        let time_entries     = db.open_tree("time_entries").map_err(storage_err)?;
        let open_entries     = db.open_tree("open_entries").map_err(storage_err)?;
        let cash_sessions    = db.open_tree("cash_sessions").map_err(storage_err)?;
        let cash_by_entry    = db.open_tree("cash_by_entry").map_err(storage_err)?;
        let cash_audits      = db.open_tree("cash_audits").map_err(storage_err)?;
        let shifts           = db.open_tree("shifts").map_err(storage_err)?;
        let shift_templates  = db.open_tree("shift_templates").map_err(storage_err)?;
        let payroll_runs     = db.open_tree("payroll_runs").map_err(storage_err)?;
        let payroll_items    = db.open_tree("payroll_items").map_err(storage_err)?;
        let leave_requests   = db.open_tree("leave_requests").map_err(storage_err)?;
        let role_permissions = db.open_tree("role_permissions").map_err(storage_err)?;
        let audit_logs       = db.open_tree("audit_logs").map_err(storage_err)?;
        let meta             = db.open_tree("meta").map_err(storage_err)?;
        Ok(Self {
            db,
            companies,
            company_slugs,
            users,
            user_emails,
            sessions,
            time_entries,
            open_entries,
            cash_sessions,
            cash_by_entry,
            cash_audits,
            shifts,
            shift_templates,
            payroll_runs,
            payroll_items,
            leave_requests,
            role_permissions,
            audit_logs,
            meta,
            locks: LockTable::new(),
        })
    }

    /// Flush dirty buffers to disk.
    pub fn flush(&self) -> Result<(), ShiftledgerError> {
        self.db.flush().map(|_| ()).map_err(storage_err)
    }

    /// Cheap readiness probe: touch the meta tree.
    pub fn is_ready(&self) -> bool {
        self.meta.contains_key(b"__probe").is_ok()
    }

    // ── Companies ────────────────────────────────────────────────────────────

    pub fn get_company(&self, id: &CompanyId) -> Result<Option<Company>, ShiftledgerError> {
        match self.companies.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(dec(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn require_company(&self, id: &CompanyId) -> Result<Company, ShiftledgerError> {
        self.get_company(id)?
            .ok_or_else(|| ShiftledgerError::CompanyNotFound(id.to_string()))
    }

    pub fn get_company_by_slug(&self, slug: &str) -> Result<Option<Company>, ShiftledgerError> {
        match self.company_slugs.get(slug.as_bytes()).map_err(storage_err)? {
            Some(id_bytes) => {
                let mut arr = [0u8; 16];
                arr.copy_from_slice(&id_bytes);
                self.get_company(&CompanyId::from_bytes(arr))
            }
            None => Ok(None),
        }
    }

    pub fn iter_companies(&self) -> Result<Vec<Company>, ShiftledgerError> {
        let mut result = Vec::new();
        for item in self.companies.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            result.push(dec(&bytes)?);
        }
        Ok(result)
    }

    pub fn slug_taken(&self, slug: &str) -> Result<bool, ShiftledgerError> {
        self.company_slugs
            .contains_key(slug.as_bytes())
            .map_err(storage_err)
    }

    /// Insert a new company, claiming its slug atomically.
    pub fn insert_company(&self, company: &Company) -> Result<(), ShiftledgerError> {
        let claimed = self
            .company_slugs
            .compare_and_swap(
                company.slug.as_bytes(),
                None as Option<&[u8]>,
                Some(company.id.as_bytes().as_slice()),
            )
            .map_err(storage_err)?;
        if claimed.is_err() {
            return Err(ShiftledgerError::Validation(format!(
                "slug already in use: {}",
                company.slug
            )));
        }
        self.put_company(company)
    }

    /// Update an existing company record (the slug is immutable).
    pub fn put_company(&self, company: &Company) -> Result<(), ShiftledgerError> {
        self.companies
            .insert(company.id.as_bytes(), enc(company)?)
            .map_err(storage_err)?;
        Ok(())
    }

    // ── Users ────────────────────────────────────────────────────────────────

    pub fn get_user(&self, id: &UserId) -> Result<Option<User>, ShiftledgerError> {
        match self.users.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(dec(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn require_user(&self, id: &UserId) -> Result<User, ShiftledgerError> {
        self.get_user(id)?
            .ok_or_else(|| ShiftledgerError::UserNotFound(id.to_string()))
    }

    /// Insert a new user, claiming the per-company email slot atomically.
    pub fn insert_user(&self, user: &User) -> Result<(), ShiftledgerError> {
        let email_key = scoped_key(user.company_id.as_bytes(), &normalize_email(&user.email));
        let claimed = self
            .user_emails
            .compare_and_swap(
                email_key,
                None as Option<&[u8]>,
                Some(user.id.as_bytes().as_slice()),
            )
            .map_err(storage_err)?;
        if claimed.is_err() {
            return Err(ShiftledgerError::DuplicateEmail(user.email.clone()));
        }
        self.put_user(user)
    }

    /// Update an existing user record without touching the email index.
    pub fn put_user(&self, user: &User) -> Result<(), ShiftledgerError> {
        self.users
            .insert(user.id.as_bytes(), enc(user)?)
            .map_err(storage_err)?;
        Ok(())
    }

    /// Move a user's email-index entry after an address change.
    pub fn reindex_user_email(
        &self,
        user: &User,
        old_email: &str,
    ) -> Result<(), ShiftledgerError> {
        let new_key = scoped_key(user.company_id.as_bytes(), &normalize_email(&user.email));
        let claimed = self
            .user_emails
            .compare_and_swap(
                new_key,
                None as Option<&[u8]>,
                Some(user.id.as_bytes().as_slice()),
            )
            .map_err(storage_err)?;
        if claimed.is_err() {
            return Err(ShiftledgerError::DuplicateEmail(user.email.clone()));
        }
        let old_key = scoped_key(user.company_id.as_bytes(), &normalize_email(old_email));
        self.user_emails.remove(old_key).map_err(storage_err)?;
        Ok(())
    }

    pub fn delete_user(&self, user: &User) -> Result<(), ShiftledgerError> {
        let email_key = scoped_key(user.company_id.as_bytes(), &normalize_email(&user.email));
        self.user_emails.remove(email_key).map_err(storage_err)?;
        self.users.remove(user.id.as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    pub fn find_user_by_email(
        &self,
        company_id: &CompanyId,
        email: &str,
    ) -> Result<Option<User>, ShiftledgerError> {
        let key = scoped_key(company_id.as_bytes(), &normalize_email(email));
        match self.user_emails.get(key).map_err(storage_err)? {
            Some(id_bytes) => {
                let mut arr = [0u8; 16];
                arr.copy_from_slice(&id_bytes);
                self.get_user(&UserId::from_bytes(arr))
            }
            None => Ok(None),
        }
    }

    /// Login has no company context; return the first account matching the
    /// normalized address.
    pub fn find_user_by_email_global(
        &self,
        email: &str,
    ) -> Result<Option<User>, ShiftledgerError> {
        let wanted = normalize_email(email);
        for item in self.users.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let user: User = dec(&bytes)?;
            if user.email == wanted {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    pub fn iter_company_users(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<User>, ShiftledgerError> {
        let mut result = Vec::new();
        for item in self.users.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let user: User = dec(&bytes)?;
            if user.company_id == *company_id {
                result.push(user);
            }
        }
        Ok(result)
    }

    /// Active punch-eligible users of a company that have a PIN configured.
    pub fn iter_pin_users(&self, company_id: &CompanyId) -> Result<Vec<User>, ShiftledgerError> {
        Ok(self
            .iter_company_users(company_id)?
            .into_iter()
            .filter(|u| u.is_active() && u.role.is_punch_eligible() && u.pin_hash.is_some())
            .collect())
    }

    // ── Sessions ─────────────────────────────────────────────────────────────

    pub fn put_session(&self, session: &Session) -> Result<(), ShiftledgerError> {
        let key = pair_key(session.user_id.as_bytes(), session.id.as_bytes());
        self.sessions.insert(key, enc(session)?).map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_user_sessions(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Session>, ShiftledgerError> {
        let mut result = Vec::new();
        for item in self.sessions.scan_prefix(user_id.as_bytes()) {
            let (_, bytes) = item.map_err(storage_err)?;
            result.push(dec(&bytes)?);
        }
        Ok(result)
    }

    pub fn delete_user_sessions(&self, user_id: &UserId) -> Result<(), ShiftledgerError> {
        for session in self.iter_user_sessions(user_id)? {
            let key = pair_key(session.user_id.as_bytes(), session.id.as_bytes());
            self.sessions.remove(key).map_err(storage_err)?;
        }
        Ok(())
    }

    // ── Time entries ─────────────────────────────────────────────────────────

    pub fn get_entry(&self, id: &EntryId) -> Result<Option<TimeEntry>, ShiftledgerError> {
        match self.time_entries.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(dec(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_entry(&self, entry: &TimeEntry) -> Result<(), ShiftledgerError> {
        self.time_entries
            .insert(entry.id.as_bytes(), enc(entry)?)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn delete_entry(&self, id: &EntryId) -> Result<(), ShiftledgerError> {
        self.time_entries.remove(id.as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    /// The employee's currently open entry, if any.
    pub fn open_entry_id(
        &self,
        company_id: &CompanyId,
        employee_id: &UserId,
    ) -> Result<Option<EntryId>, ShiftledgerError> {
        let key = pair_key(company_id.as_bytes(), employee_id.as_bytes());
        match self.open_entries.get(key).map_err(storage_err)? {
            Some(bytes) => {
                let mut arr = [0u8; 16];
                arr.copy_from_slice(&bytes);
                Ok(Some(EntryId::from_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    /// Claim the open-entry slot for an employee.
    ///
    /// The compare-and-swap guarantees that of two concurrent clock-ins
    /// exactly one wins; the loser sees `ShiftAlreadyOpen`.
    pub fn claim_open_entry(
        &self,
        company_id: &CompanyId,
        employee_id: &UserId,
        entry_id: &EntryId,
    ) -> Result<(), ShiftledgerError> {
        let key = pair_key(company_id.as_bytes(), employee_id.as_bytes());
        let swapped = self
            .open_entries
            .compare_and_swap(
                key,
                None as Option<&[u8]>,
                Some(entry_id.as_bytes().as_slice()),
            )
            .map_err(storage_err)?;
        if swapped.is_err() {
            return Err(ShiftledgerError::ShiftAlreadyOpen);
        }
        Ok(())
    }

    pub fn release_open_entry(
        &self,
        company_id: &CompanyId,
        employee_id: &UserId,
    ) -> Result<(), ShiftledgerError> {
        let key = pair_key(company_id.as_bytes(), employee_id.as_bytes());
        self.open_entries.remove(key).map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_employee_entries(
        &self,
        company_id: &CompanyId,
        employee_id: &UserId,
    ) -> Result<Vec<TimeEntry>, ShiftledgerError> {
        let mut result = Vec::new();
        for item in self.time_entries.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let entry: TimeEntry = dec(&bytes)?;
            if entry.company_id == *company_id && entry.employee_id == *employee_id {
                result.push(entry);
            }
        }
        Ok(result)
    }

    pub fn iter_company_entries(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<TimeEntry>, ShiftledgerError> {
        let mut result = Vec::new();
        for item in self.time_entries.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let entry: TimeEntry = dec(&bytes)?;
            if entry.company_id == *company_id {
                result.push(entry);
            }
        }
        Ok(result)
    }

    // ── Cash drawer ──────────────────────────────────────────────────────────

    pub fn get_cash_session(
        &self,
        id: &CashSessionId,
    ) -> Result<Option<CashDrawerSession>, ShiftledgerError> {
        match self.cash_sessions.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(dec(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn cash_session_for_entry(
        &self,
        entry_id: &EntryId,
    ) -> Result<Option<CashDrawerSession>, ShiftledgerError> {
        match self.cash_by_entry.get(entry_id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => {
                let mut arr = [0u8; 16];
                arr.copy_from_slice(&bytes);
                self.get_cash_session(&CashSessionId::from_bytes(arr))
            }
            None => Ok(None),
        }
    }

    /// Insert a new cash session, enforcing one-per-entry.
    pub fn insert_cash_session(
        &self,
        session: &CashDrawerSession,
    ) -> Result<(), ShiftledgerError> {
        let linked = self
            .cash_by_entry
            .compare_and_swap(
                session.time_entry_id.as_bytes(),
                None as Option<&[u8]>,
                Some(session.id.as_bytes().as_slice()),
            )
            .map_err(storage_err)?;
        if linked.is_err() {
            return Err(ShiftledgerError::CashSessionExists);
        }
        self.put_cash_session(session)
    }

    pub fn put_cash_session(
        &self,
        session: &CashDrawerSession,
    ) -> Result<(), ShiftledgerError> {
        self.cash_sessions
            .insert(session.id.as_bytes(), enc(session)?)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn delete_cash_session(
        &self,
        session: &CashDrawerSession,
    ) -> Result<(), ShiftledgerError> {
        self.cash_by_entry
            .remove(session.time_entry_id.as_bytes())
            .map_err(storage_err)?;
        self.cash_sessions
            .remove(session.id.as_bytes())
            .map_err(storage_err)?;
        for item in self.cash_audits.scan_prefix(session.id.as_bytes()) {
            let (key, _) = item.map_err(storage_err)?;
            self.cash_audits.remove(key).map_err(storage_err)?;
        }
        Ok(())
    }

    pub fn append_cash_audit(&self, audit: &CashDrawerAudit) -> Result<(), ShiftledgerError> {
        let seq = self.db.generate_id().map_err(storage_err)?;
        let mut key = Vec::with_capacity(24);
        key.extend_from_slice(audit.session_id.as_bytes());
        key.extend_from_slice(&seq.to_be_bytes());
        self.cash_audits.insert(key, enc(audit)?).map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_cash_audits(
        &self,
        session_id: &CashSessionId,
    ) -> Result<Vec<CashDrawerAudit>, ShiftledgerError> {
        let mut result = Vec::new();
        for item in self.cash_audits.scan_prefix(session_id.as_bytes()) {
            let (_, bytes) = item.map_err(storage_err)?;
            result.push(dec(&bytes)?);
        }
        Ok(result)
    }

    pub fn iter_company_cash_sessions(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<CashDrawerSession>, ShiftledgerError> {
        let mut result = Vec::new();
        for item in self.cash_sessions.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let session: CashDrawerSession = dec(&bytes)?;
            if session.company_id == *company_id {
                result.push(session);
            }
        }
        Ok(result)
    }

    // ── Scheduled shifts ─────────────────────────────────────────────────────

    pub fn get_shift(&self, id: &ShiftId) -> Result<Option<Shift>, ShiftledgerError> {
        match self.shifts.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(dec(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_shift(&self, shift: &Shift) -> Result<(), ShiftledgerError> {
        self.shifts
            .insert(shift.id.as_bytes(), enc(shift)?)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn delete_shift(&self, id: &ShiftId) -> Result<(), ShiftledgerError> {
        self.shifts.remove(id.as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_company_shifts(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<Shift>, ShiftledgerError> {
        let mut result = Vec::new();
        for item in self.shifts.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let shift: Shift = dec(&bytes)?;
            if shift.company_id == *company_id {
                result.push(shift);
            }
        }
        Ok(result)
    }

    pub fn iter_employee_shifts(
        &self,
        company_id: &CompanyId,
        employee_id: &UserId,
    ) -> Result<Vec<Shift>, ShiftledgerError> {
        Ok(self
            .iter_company_shifts(company_id)?
            .into_iter()
            .filter(|s| s.employee_id == *employee_id)
            .collect())
    }

    pub fn get_template(
        &self,
        id: &TemplateId,
    ) -> Result<Option<ShiftTemplate>, ShiftledgerError> {
        match self.shift_templates.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(dec(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_template(&self, template: &ShiftTemplate) -> Result<(), ShiftledgerError> {
        self.shift_templates
            .insert(template.id.as_bytes(), enc(template)?)
            .map_err(storage_err)?;
        Ok(())
    }

    // ── Payroll ──────────────────────────────────────────────────────────────

    pub fn get_run(&self, id: &RunId) -> Result<Option<PayrollRun>, ShiftledgerError> {
        match self.payroll_runs.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(dec(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_run(&self, run: &PayrollRun) -> Result<(), ShiftledgerError> {
        self.payroll_runs
            .insert(run.id.as_bytes(), enc(run)?)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_company_runs(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<PayrollRun>, ShiftledgerError> {
        let mut result = Vec::new();
        for item in self.payroll_runs.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let run: PayrollRun = dec(&bytes)?;
            if run.company_id == *company_id {
                result.push(run);
            }
        }
        Ok(result)
    }

    pub fn put_line_item(&self, item: &PayrollLineItem) -> Result<(), ShiftledgerError> {
        let key = pair_key(item.payroll_run_id.as_bytes(), item.employee_id.as_bytes());
        self.payroll_items.insert(key, enc(item)?).map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_run_items(
        &self,
        run_id: &RunId,
    ) -> Result<Vec<PayrollLineItem>, ShiftledgerError> {
        let mut result = Vec::new();
        for item in self.payroll_items.scan_prefix(run_id.as_bytes()) {
            let (_, bytes) = item.map_err(storage_err)?;
            result.push(dec(&bytes)?);
        }
        Ok(result)
    }

    /// All line items ever generated for one employee (for the self-service
    /// payroll view).
    pub fn iter_employee_items(
        &self,
        company_id: &CompanyId,
        employee_id: &UserId,
    ) -> Result<Vec<PayrollLineItem>, ShiftledgerError> {
        let mut result = Vec::new();
        for item in self.payroll_items.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let li: PayrollLineItem = dec(&bytes)?;
            if li.company_id == *company_id && li.employee_id == *employee_id {
                result.push(li);
            }
        }
        Ok(result)
    }

    pub fn delete_line_item(
        &self,
        run_id: &RunId,
        employee_id: &UserId,
    ) -> Result<(), ShiftledgerError> {
        let key = pair_key(run_id.as_bytes(), employee_id.as_bytes());
        self.payroll_items.remove(key).map_err(storage_err)?;
        Ok(())
    }

    /// Remove a run together with its line items.
    pub fn delete_run(&self, run_id: &RunId) -> Result<(), ShiftledgerError> {
        for item in self.payroll_items.scan_prefix(run_id.as_bytes()) {
            let (key, _) = item.map_err(storage_err)?;
            self.payroll_items.remove(key).map_err(storage_err)?;
        }
        self.payroll_runs.remove(run_id.as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    // ── Leave requests ───────────────────────────────────────────────────────

    pub fn get_leave(
        &self,
        id: &LeaveRequestId,
    ) -> Result<Option<LeaveRequest>, ShiftledgerError> {
        match self.leave_requests.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(dec(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_leave(&self, request: &LeaveRequest) -> Result<(), ShiftledgerError> {
        self.leave_requests
            .insert(request.id.as_bytes(), enc(request)?)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn delete_leave(&self, id: &LeaveRequestId) -> Result<(), ShiftledgerError> {
        self.leave_requests.remove(id.as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_company_leave(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<LeaveRequest>, ShiftledgerError> {
        let mut result = Vec::new();
        for item in self.leave_requests.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let request: LeaveRequest = dec(&bytes)?;
            if request.company_id == *company_id {
                result.push(request);
            }
        }
        Ok(result)
    }

    // ── Role permissions ─────────────────────────────────────────────────────

    pub fn get_role_permissions(
        &self,
        company_id: &CompanyId,
        role: Role,
    ) -> Result<Option<RolePermissions>, ShiftledgerError> {
        let key = scoped_key(company_id.as_bytes(), role.as_str());
        match self.role_permissions.get(key).map_err(storage_err)? {
            Some(bytes) => Ok(Some(dec(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_role_permissions(
        &self,
        grants: &RolePermissions,
    ) -> Result<(), ShiftledgerError> {
        let key = scoped_key(grants.company_id.as_bytes(), grants.role.as_str());
        self.role_permissions
            .insert(key, enc(grants)?)
            .map_err(storage_err)?;
        Ok(())
    }

    // ── Audit log ────────────────────────────────────────────────────────────

    pub fn append_audit(&self, log: &AuditLog) -> Result<(), ShiftledgerError> {
        let seq = self.db.generate_id().map_err(storage_err)?;
        let mut key = Vec::with_capacity(24);
        key.extend_from_slice(log.company_id.as_bytes());
        key.extend_from_slice(&seq.to_be_bytes());
        self.audit_logs.insert(key, enc(log)?).map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_company_audits(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<AuditLog>, ShiftledgerError> {
        let mut result = Vec::new();
        for item in self.audit_logs.scan_prefix(company_id.as_bytes()) {
            let (_, bytes) = item.map_err(storage_err)?;
            result.push(dec(&bytes)?);
        }
        Ok(result)
    }

    // ── Meta ─────────────────────────────────────────────────────────────────

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, ShiftledgerError> {
        Ok(self
            .meta
            .get(key.as_bytes())
            .map_err(storage_err)?
            .map(|v| v.to_vec()))
    }

    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), ShiftledgerError> {
        self.meta.insert(key.as_bytes(), value).map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shiftledger_core::company::CompanySettings;
    use shiftledger_core::time_entry::{EntrySource, EntryStatus, PunchMeta};
    use shiftledger_core::user::{PayRateType, UserStatus};

    fn temp_store(name: &str) -> Store {
        let dir = std::env::temp_dir().join(format!("shiftledger_store_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        Store::open(&dir).expect("open temp store")
    }

    fn make_company(slug: &str) -> Company {
        Company {
            id: CompanyId::generate(),
            name: "Demo Hotel".to_string(),
            slug: slug.to_string(),
            kiosk_enabled: true,
            settings: CompanySettings::default(),
            created_at: Utc::now(),
        }
    }

    fn make_user(company_id: CompanyId, email: &str) -> User {
        let now = Utc::now();
        User {
            id: UserId::generate(),
            company_id,
            name: "Pat".to_string(),
            email: email.to_string(),
            password_hash: String::new(),
            pin_hash: None,
            role: Role::Frontdesk,
            status: UserStatus::Active,
            job_role: None,
            pay_rate_cents: 0,
            pay_rate_type: PayRateType::Hourly,
            overtime_multiplier: None,
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
        }
    }

    #[test]
    fn company_slug_claim_is_exclusive() {
        let store = temp_store("slug");
        let a = make_company("demo");
        let b = make_company("demo");
        store.insert_company(&a).unwrap();
        assert!(store.insert_company(&b).is_err());
        assert_eq!(
            store.get_company_by_slug("demo").unwrap().unwrap().id,
            a.id
        );
    }

    #[test]
    fn email_unique_per_company_not_across() {
        let store = temp_store("emails");
        let c1 = make_company("one");
        let c2 = make_company("two");
        store.insert_company(&c1).unwrap();
        store.insert_company(&c2).unwrap();

        store.insert_user(&make_user(c1.id, "pat@example.com")).unwrap();
        // Same address in the same company is rejected…
        assert!(matches!(
            store.insert_user(&make_user(c1.id, "PAT@example.com")),
            Err(ShiftledgerError::DuplicateEmail(_))
        ));
        // …but fine in a different company.
        store.insert_user(&make_user(c2.id, "pat@example.com")).unwrap();
    }

    #[test]
    fn open_entry_slot_is_single_occupancy() {
        let store = temp_store("open_entry");
        let company = CompanyId::generate();
        let employee = UserId::generate();
        let first = EntryId::generate();
        let second = EntryId::generate();

        store.claim_open_entry(&company, &employee, &first).unwrap();
        assert!(matches!(
            store.claim_open_entry(&company, &employee, &second),
            Err(ShiftledgerError::ShiftAlreadyOpen)
        ));
        assert_eq!(store.open_entry_id(&company, &employee).unwrap(), Some(first));

        store.release_open_entry(&company, &employee).unwrap();
        store.claim_open_entry(&company, &employee, &second).unwrap();
    }

    #[test]
    fn cash_session_one_per_entry() {
        let store = temp_store("cash_link");
        let entry_id = EntryId::generate();
        let session = shiftledger_core::cash::CashDrawerSession {
            id: CashSessionId::generate(),
            company_id: CompanyId::generate(),
            time_entry_id: entry_id,
            employee_id: UserId::generate(),
            start_cash_cents: 10_000,
            start_counted_at: Utc::now(),
            start_count_source: shiftledger_core::cash::CountSource::Kiosk,
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

        let mut dup = session.clone();
        dup.id = CashSessionId::generate();
        assert!(matches!(
            store.insert_cash_session(&dup),
            Err(ShiftledgerError::CashSessionExists)
        ));
    }

    #[test]
    fn entry_round_trip() {
        let store = temp_store("entries");
        let now = Utc::now();
        let entry = TimeEntry {
            id: EntryId::generate(),
            company_id: CompanyId::generate(),
            employee_id: UserId::generate(),
            clock_in_at: now,
            clock_out_at: None,
            break_minutes: 0,
            source: EntrySource::Kiosk,
            status: EntryStatus::Open,
            note: None,
            edited_by: None,
            edit_reason: None,
            clock_in_meta: PunchMeta::default(),
            clock_out_meta: PunchMeta::default(),
            created_at: now,
            updated_at: now,
        };
        store.put_entry(&entry).unwrap();
        let loaded = store.get_entry(&entry.id).unwrap().unwrap();
        assert_eq!(loaded.clock_in_at, entry.clock_in_at);
        assert!(loaded.is_open());
    }
}
