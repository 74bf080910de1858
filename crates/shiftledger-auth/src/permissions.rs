//! Role→permission resolution.
//!
//! ADMIN is a static bypass. Other roles resolve to the company-specific
//! grant row when one exists, else the sentinel (all-zeros company)
//! defaults seeded at first boot.

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;

use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::permission::{RolePermissions, PERMISSIONS};
use shiftledger_core::types::CompanyId;
use shiftledger_core::user::{Role, User};
use shiftledger_store::Store;

static CATALOG: Lazy<HashSet<&'static str>> = Lazy::new(|| PERMISSIONS.iter().copied().collect());

pub struct PermissionService {
    store: Arc<Store>,
}

impl PermissionService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// The effective permission names for a role in a company.
    pub fn permissions_for(
        &self,
        company_id: CompanyId,
        role: Role,
    ) -> Result<Vec<String>, ShiftledgerError> {
        if role == Role::Admin {
            return Ok(PERMISSIONS.iter().map(|p| p.to_string()).collect());
        }
        if let Some(grants) = self.store.get_role_permissions(&company_id, role)? {
            return Ok(grants.permissions);
        }
        match self.store.get_role_permissions(&CompanyId::nil(), role)? {
            Some(defaults) => Ok(defaults.permissions),
            None => Ok(Vec::new()),
        }
    }

    pub fn user_has_permission(
        &self,
        user: &User,
        permission: &str,
    ) -> Result<bool, ShiftledgerError> {
        if user.role == Role::Admin {
            return Ok(true);
        }
        Ok(self
            .permissions_for(user.company_id, user.role)?
            .iter()
            .any(|p| p == permission))
    }

    /// Replace a role's company-specific grants.
    pub fn set_role_permissions(
        &self,
        company_id: CompanyId,
        role: Role,
        permissions: Vec<String>,
    ) -> Result<(), ShiftledgerError> {
        if role == Role::Admin {
            return Err(ShiftledgerError::Validation(
                "ADMIN permissions are implicit and cannot be edited".to_string(),
            ));
        }
        for name in &permissions {
            if !CATALOG.contains(name.as_str()) {
                return Err(ShiftledgerError::Validation(format!(
                    "unknown permission: {name}"
                )));
            }
        }
        self.store.put_role_permissions(&RolePermissions {
            company_id,
            role,
            permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shiftledger_store::seed_defaults;

    fn setup(name: &str) -> (Arc<Store>, PermissionService) {
        let dir = std::env::temp_dir().join(format!("shiftledger_perm_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let store = Arc::new(Store::open(&dir).unwrap());
        seed_defaults(&store, Utc::now()).unwrap();
        let service = PermissionService::new(store.clone());
        (store, service)
    }

    #[test]
    fn sentinel_defaults_apply_when_no_company_row() {
        let (_, service) = setup("fallback");
        let company = CompanyId::generate();
        let perms = service.permissions_for(company, Role::Frontdesk).unwrap();
        assert!(perms.contains(&"cash_drawer.edit".to_string()));
        assert!(!perms.contains(&"payroll.create".to_string()));
    }

    #[test]
    fn company_row_overrides_defaults() {
        let (_, service) = setup("override");
        let company = CompanyId::generate();
        service
            .set_role_permissions(
                company,
                Role::Housekeeping,
                vec!["time_entries.view".to_string()],
            )
            .unwrap();

        let perms = service.permissions_for(company, Role::Housekeeping).unwrap();
        assert_eq!(perms, vec!["time_entries.view".to_string()]);
        // Another company still sees the defaults.
        let other = service
            .permissions_for(CompanyId::generate(), Role::Housekeeping)
            .unwrap();
        assert!(other.contains(&"leave.create".to_string()));
    }

    #[test]
    fn admin_bypasses_rows_entirely() {
        let (_, service) = setup("admin");
        let perms = service
            .permissions_for(CompanyId::generate(), Role::Admin)
            .unwrap();
        assert_eq!(perms.len(), PERMISSIONS.len());
        assert!(service
            .set_role_permissions(CompanyId::generate(), Role::Admin, vec![])
            .is_err());
    }

    #[test]
    fn unknown_permission_rejected_on_write() {
        let (_, service) = setup("unknown");
        assert!(service
            .set_role_permissions(
                CompanyId::generate(),
                Role::Frontdesk,
                vec!["minibar.restock".to_string()],
            )
            .is_err());
    }
}
