//! Core types for the shiftledger time-and-pay backend.
//!
//! This crate defines the tenant-scoped data model shared by every engine:
//! - [`types`] — Uuid newtype identifiers
//! - [`company`] — the tenant record and its typed settings bag
//! - [`user`] / [`session`] — accounts, roles, and refresh sessions
//! - [`time_entry`] / [`cash`] — the punch record and its cash-drawer sibling
//! - [`shift`] / [`leave`] — scheduling and time-off records
//! - [`payroll`] — immutable pay runs and line items
//! - [`error`] — the single error taxonomy engines raise
//!
//! Entities are plain serde records referenced by id; joins are done
//! explicitly in queries and views are composed at the API boundary.

pub mod audit;
pub mod cash;
pub mod clock;
pub mod company;
pub mod constants;
pub mod error;
pub mod leave;
pub mod payroll;
pub mod permission;
pub mod session;
pub mod shift;
pub mod time_entry;
pub mod types;
pub mod tz;
pub mod user;

pub use clock::{Clock, FixedClock, SystemClock};
pub use company::{Company, CompanySettings, RoundingPolicy};
pub use error::ShiftledgerError;
pub use types::*;
pub use user::{Role, User, UserStatus};
