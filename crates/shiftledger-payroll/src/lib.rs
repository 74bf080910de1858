//! The payroll engine: period resolution, timezone-correct weekly overtime
//! splitting, decimal-safe pay math, and the immutable run lifecycle.

pub mod engine;
pub mod math;
pub mod period;
pub mod weeks;

pub use engine::{GenerateRequest, PayrollEngine, PayrollExportRow, RunFilter};
pub use math::compute_pay_cents;
pub use period::{resolve_period, ResolvedPeriod};
