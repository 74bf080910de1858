//! First-boot seeding.
//!
//! Creates the system company (the all-zeros id that anchors the sentinel
//! role-permission rows) and the global default grants for each role.
//! Idempotent: a meta marker makes re-runs no-ops.

use chrono::{DateTime, Utc};
use tracing::info;

use shiftledger_core::company::{Company, CompanySettings};
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::permission::RolePermissions;
use shiftledger_core::types::CompanyId;
use shiftledger_core::user::Role;

use crate::db::Store;

const SEED_MARKER: &str = "seeded_v1";

/// Default grants per role. ADMIN is a static bypass and holds no rows.
fn default_grants() -> Vec<(Role, Vec<&'static str>)> {
    vec![
        (
            Role::Frontdesk,
            vec![
                "time_entries.view",
                "time_entries.create",
                "schedules.view",
                "leave.view",
                "leave.create",
                "cash_drawer.view",
                "cash_drawer.edit",
            ],
        ),
        (
            Role::Maintenance,
            vec![
                "time_entries.view",
                "time_entries.create",
                "schedules.view",
                "leave.view",
                "leave.create",
            ],
        ),
        (
            Role::Housekeeping,
            vec![
                "time_entries.view",
                "time_entries.create",
                "schedules.view",
                "leave.view",
                "leave.create",
            ],
        ),
        (
            Role::Developer,
            vec![
                "time_entries.view",
                "schedules.view",
                "leave.view",
                "payroll.view",
                "cash_drawer.view",
                "employees.view",
                "reports.view",
                "settings.view",
            ],
        ),
    ]
}

/// Seed the system company and the sentinel role-permission rows.
///
/// Returns `true` if this call performed the seeding.
pub fn seed_defaults(store: &Store, now: DateTime<Utc>) -> Result<bool, ShiftledgerError> {
    if store.get_meta(SEED_MARKER)?.is_some() {
        return Ok(false);
    }

    // The sentinel company row satisfies the company reference carried by
    // the global-defaults permission rows.
    let system = Company {
        id: CompanyId::nil(),
        name: "System".to_string(),
        slug: "system".to_string(),
        kiosk_enabled: false,
        settings: CompanySettings::default(),
        created_at: now,
    };
    if store.get_company(&system.id)?.is_none() {
        store.insert_company(&system)?;
    }

    for (role, permissions) in default_grants() {
        store.put_role_permissions(&RolePermissions {
            company_id: CompanyId::nil(),
            role,
            permissions: permissions.into_iter().map(String::from).collect(),
        })?;
    }

    store.put_meta(SEED_MARKER, b"1")?;
    info!("seeded system company and default role permissions");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> Store {
        let dir = std::env::temp_dir().join(format!("shiftledger_seed_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        Store::open(&dir).expect("open temp store")
    }

    #[test]
    fn seeding_is_idempotent() {
        let store = temp_store("idempotent");
        assert!(seed_defaults(&store, Utc::now()).unwrap());
        assert!(!seed_defaults(&store, Utc::now()).unwrap());
    }

    #[test]
    fn sentinel_rows_exist_after_seed() {
        let store = temp_store("sentinel");
        seed_defaults(&store, Utc::now()).unwrap();

        let system = store.get_company(&CompanyId::nil()).unwrap().unwrap();
        assert_eq!(system.slug, "system");

        let frontdesk = store
            .get_role_permissions(&CompanyId::nil(), Role::Frontdesk)
            .unwrap()
            .unwrap();
        assert!(frontdesk.permissions.contains(&"cash_drawer.edit".to_string()));

        let housekeeping = store
            .get_role_permissions(&CompanyId::nil(), Role::Housekeeping)
            .unwrap()
            .unwrap();
        assert!(!housekeeping.permissions.contains(&"cash_drawer.edit".to_string()));
    }

    #[test]
    fn seeded_permissions_are_in_catalog() {
        for (_, grants) in default_grants() {
            for name in grants {
                assert!(
                    shiftledger_core::permission::is_known_permission(name),
                    "unknown permission seeded: {name}"
                );
            }
        }
    }
}
