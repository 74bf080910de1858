//! The punch state machine, its cash-drawer sibling, and the pure
//! minutes/rounding engine.

pub mod cash;
pub mod entries;
pub mod punch;
pub mod rounding;

pub use cash::CashDrawerService;
pub use entries::TimeEntryService;
pub use punch::{CashAmounts, PunchCoordinator, PunchDirection, PunchOutcome, PunchRequest, PunchTarget};
pub use rounding::{apply_rounding, compute_paid_minutes};
