//! Pay-period resolution.

use chrono::{Datelike, Duration, NaiveDate};

use shiftledger_core::company::CompanySettings;
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::payroll::PayrollType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub warning: Option<String>,
}

/// Resolve `[start, end]` for a run beginning on `start_date`.
///
/// Weekly periods whose start does not fall on the configured week-start
/// weekday carry a warning (or are rejected in strict mode). Biweekly
/// periods validate against the anchor date only in strict mode.
pub fn resolve_period(
    payroll_type: PayrollType,
    start_date: NaiveDate,
    settings: &CompanySettings,
    strict: bool,
) -> Result<ResolvedPeriod, ShiftledgerError> {
    let end = start_date + Duration::days(payroll_type.days() - 1);

    match payroll_type {
        PayrollType::Weekly => {
            let configured = u32::from(settings.payroll_week_start_day);
            if start_date.weekday().num_days_from_monday() != configured {
                let warning = format!(
                    "start date {start_date} does not align with configured week start day ({configured})"
                );
                if strict {
                    return Err(ShiftledgerError::Validation(warning));
                }
                return Ok(ResolvedPeriod {
                    start: start_date,
                    end,
                    warning: Some(warning),
                });
            }
            Ok(ResolvedPeriod { start: start_date, end, warning: None })
        }
        PayrollType::Biweekly => {
            if strict {
                if let Some(anchor) = settings.biweekly_anchor_date {
                    if (start_date - anchor).num_days().rem_euclid(14) != 0 {
                        return Err(ShiftledgerError::Validation(format!(
                            "start date {start_date} does not align with biweekly anchor date {anchor}"
                        )));
                    }
                }
            }
            Ok(ResolvedPeriod { start: start_date, end, warning: None })
        }
    }
}
