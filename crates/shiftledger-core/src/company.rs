use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{DEFAULT_OVERTIME_THRESHOLD_HOURS, DEFAULT_TIMEZONE};
use crate::error::ShiftledgerError;
use crate::types::CompanyId;
use crate::user::Role;

// ── RoundingPolicy ───────────────────────────────────────────────────────────

/// Minute-rounding policy applied to paid minutes.
///
/// The numeric policies round to the nearest multiple (half up); `15` uses
/// the 7-minute rule instead (≤7 down, ≥8 up).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingPolicy {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "5")]
    Nearest5,
    #[serde(rename = "6")]
    Nearest6,
    #[serde(rename = "10")]
    Nearest10,
    #[serde(rename = "15")]
    Quarter,
    #[serde(rename = "30")]
    Nearest30,
}

impl RoundingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundingPolicy::None => "none",
            RoundingPolicy::Nearest5 => "5",
            RoundingPolicy::Nearest6 => "6",
            RoundingPolicy::Nearest10 => "10",
            RoundingPolicy::Quarter => "15",
            RoundingPolicy::Nearest30 => "30",
        }
    }
}

impl FromStr for RoundingPolicy {
    type Err = ShiftledgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RoundingPolicy::None),
            "5" => Ok(RoundingPolicy::Nearest5),
            "6" => Ok(RoundingPolicy::Nearest6),
            "10" => Ok(RoundingPolicy::Nearest10),
            "15" => Ok(RoundingPolicy::Quarter),
            "30" => Ok(RoundingPolicy::Nearest30),
            other => Err(ShiftledgerError::Validation(format!(
                "unknown rounding policy: {other}"
            ))),
        }
    }
}

impl fmt::Display for RoundingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── CompanySettings ──────────────────────────────────────────────────────────

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_true() -> bool {
    true
}
fn default_overtime_threshold() -> u32 {
    DEFAULT_OVERTIME_THRESHOLD_HOURS
}
fn default_overtime_multiplier() -> Decimal {
    Decimal::new(15, 1) // 1.5
}
fn default_cash_drawer_roles() -> Vec<Role> {
    vec![Role::Frontdesk]
}

/// The per-company settings bag.
///
/// A typed struct rather than a free JSON map: unknown keys are rejected on
/// write, every field has a default, and deprecated keys are migrated in
/// [`parse_settings`] before deserialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompanySettings {
    /// IANA name used for every local-date computation.
    pub timezone: String,
    /// 0 = Monday; anchors the weekly overtime split.
    pub payroll_week_start_day: u8,
    pub biweekly_anchor_date: Option<NaiveDate>,
    pub overtime_enabled: bool,
    pub overtime_threshold_hours_per_week: u32,
    pub overtime_multiplier_default: Decimal,
    pub rounding_policy: RoundingPolicy,
    pub breaks_paid: bool,

    pub cash_drawer_enabled: bool,
    pub cash_drawer_required_for_all: bool,
    /// Consulted only when `cash_drawer_required_for_all` is false.
    pub cash_drawer_required_roles: Vec<Role>,
    /// Kiosk UI default; not enforced server-side.
    pub cash_drawer_starting_amount_cents: i64,
    /// Informational; the review trigger is a nonzero delta.
    pub cash_drawer_variance_threshold_cents: i64,
    pub cash_drawer_allow_edit: bool,
    pub cash_drawer_require_manager_review: bool,
}

impl Default for CompanySettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            payroll_week_start_day: 0,
            biweekly_anchor_date: None,
            overtime_enabled: default_true(),
            overtime_threshold_hours_per_week: default_overtime_threshold(),
            overtime_multiplier_default: default_overtime_multiplier(),
            rounding_policy: RoundingPolicy::None,
            breaks_paid: false,
            cash_drawer_enabled: false,
            cash_drawer_required_for_all: default_true(),
            cash_drawer_required_roles: default_cash_drawer_roles(),
            cash_drawer_starting_amount_cents: 0,
            cash_drawer_variance_threshold_cents: 0,
            cash_drawer_allow_edit: default_true(),
            cash_drawer_require_manager_review: false,
        }
    }
}

impl CompanySettings {
    /// Whether an employee with `role` must count the drawer at punch time.
    pub fn cash_drawer_required_for(&self, role: Role) -> bool {
        if !self.cash_drawer_enabled {
            return false;
        }
        if self.cash_drawer_required_for_all {
            return true;
        }
        self.cash_drawer_required_roles.contains(&role)
    }

    pub fn overtime_threshold_minutes(&self) -> i64 {
        i64::from(self.overtime_threshold_hours_per_week) * 60
    }
}

/// Rename deprecated keys to their modern counterparts in place.
///
/// A modern key already present wins over its legacy alias.
pub fn migrate_legacy_settings(value: &mut serde_json::Value) {
    let Some(map) = value.as_object_mut() else { return };
    for (old, new) in [
        ("week_start_day", "payroll_week_start_day"),
        ("rounding_rule", "rounding_policy"),
        ("overtime_threshold", "overtime_threshold_hours_per_week"),
    ] {
        if let Some(v) = map.remove(old) {
            map.entry(new).or_insert(v);
        }
    }
    // Retired with multi-currency support; no modern counterpart.
    map.remove("cash_drawer_currency");
}

/// Parse a settings JSON object, migrating legacy keys and rejecting
/// unknown ones.
pub fn parse_settings(mut value: serde_json::Value) -> Result<CompanySettings, ShiftledgerError> {
    migrate_legacy_settings(&mut value);
    serde_json::from_value(value)
        .map_err(|e| ShiftledgerError::Validation(format!("invalid settings: {e}")))
}

// ── Company ──────────────────────────────────────────────────────────────────

/// A tenant. Every operational entity is scoped to exactly one company.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    /// URL-safe unique identifier used by public kiosk entry points.
    pub slug: String,
    pub kiosk_enabled: bool,
    pub settings: CompanySettings,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let s = CompanySettings::default();
        assert_eq!(s.timezone, "America/Chicago");
        assert_eq!(s.payroll_week_start_day, 0);
        assert!(s.overtime_enabled);
        assert_eq!(s.overtime_threshold_hours_per_week, 40);
        assert_eq!(s.overtime_multiplier_default, Decimal::new(15, 1));
        assert_eq!(s.rounding_policy, RoundingPolicy::None);
        assert!(!s.breaks_paid);
        assert!(!s.cash_drawer_enabled);
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = parse_settings(json!({"geofence_radius_m": 50}));
        assert!(err.is_err());
    }

    #[test]
    fn legacy_keys_migrate() {
        let s = parse_settings(json!({
            "week_start_day": 1,
            "rounding_rule": "15",
            "overtime_threshold": 44,
        }))
        .unwrap();
        assert_eq!(s.payroll_week_start_day, 1);
        assert_eq!(s.rounding_policy, RoundingPolicy::Quarter);
        assert_eq!(s.overtime_threshold_hours_per_week, 44);
    }

    #[test]
    fn modern_key_wins_over_legacy_alias() {
        let s = parse_settings(json!({
            "week_start_day": 1,
            "payroll_week_start_day": 3,
        }))
        .unwrap();
        assert_eq!(s.payroll_week_start_day, 3);
    }

    #[test]
    fn rounding_policy_round_trips_as_string() {
        let s = parse_settings(json!({"rounding_policy": "30"})).unwrap();
        assert_eq!(s.rounding_policy, RoundingPolicy::Nearest30);
        let out = serde_json::to_value(&s).unwrap();
        assert_eq!(out["rounding_policy"], "30");
    }

    #[test]
    fn cash_drawer_requirement_by_role() {
        let mut s = CompanySettings {
            cash_drawer_enabled: true,
            cash_drawer_required_for_all: false,
            cash_drawer_required_roles: vec![Role::Frontdesk],
            ..CompanySettings::default()
        };
        assert!(s.cash_drawer_required_for(Role::Frontdesk));
        assert!(!s.cash_drawer_required_for(Role::Housekeeping));

        s.cash_drawer_required_for_all = true;
        assert!(s.cash_drawer_required_for(Role::Housekeeping));

        s.cash_drawer_enabled = false;
        assert!(!s.cash_drawer_required_for(Role::Frontdesk));
    }

    #[test]
    fn legacy_employee_in_required_roles_reads_as_frontdesk() {
        let s = parse_settings(json!({
            "cash_drawer_enabled": true,
            "cash_drawer_required_for_all": false,
            "cash_drawer_required_roles": ["EMPLOYEE"],
        }))
        .unwrap();
        assert!(s.cash_drawer_required_for(Role::Frontdesk));
    }
}
