//! The flat permission catalog and per-role grant records.
//!
//! Permissions are `category.verb` strings. Grants are stored per
//! `(company, role)`; the all-zeros company id is the sentinel row holding
//! the global defaults, and ADMIN bypasses lookup entirely.

use serde::{Deserialize, Serialize};

use crate::types::CompanyId;
use crate::user::Role;

/// Every permission the system recognizes.
pub const PERMISSIONS: &[&str] = &[
    "admin.all",
    "time_entries.view",
    "time_entries.create",
    "time_entries.edit",
    "time_entries.delete",
    "time_entries.approve",
    "schedules.view",
    "schedules.create",
    "schedules.edit",
    "schedules.delete",
    "leave.view",
    "leave.create",
    "leave.approve",
    "payroll.view",
    "payroll.create",
    "payroll.approve",
    "cash_drawer.view",
    "cash_drawer.edit",
    "cash_drawer.review",
    "employees.view",
    "employees.create",
    "employees.edit",
    "employees.delete",
    "reports.view",
    "reports.export",
    "settings.view",
    "settings.edit",
];

pub fn is_known_permission(name: &str) -> bool {
    PERMISSIONS.contains(&name)
}

/// The granted permission set for one role in one company.
///
/// Stored as a single record per `(company, role)` key; an absent record
/// means "fall back to the sentinel defaults".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RolePermissions {
    pub company_id: CompanyId,
    pub role: Role,
    pub permissions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_no_duplicates() {
        let mut names: Vec<&str> = PERMISSIONS.to_vec();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), PERMISSIONS.len());
    }

    #[test]
    fn known_permission_lookup() {
        assert!(is_known_permission("time_entries.view"));
        assert!(!is_known_permission("time_entries.embezzle"));
    }
}
