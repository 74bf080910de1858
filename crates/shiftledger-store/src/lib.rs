//! Persistent store for shiftledger, backed by sled.
//!
//! One [`Store`] per process; engines hold it behind an `Arc`. Writes that
//! must be serialized per entity (punches, OTP state) go through the
//! embedded [`locks::LockTable`].

pub mod db;
pub mod defaults;
pub mod locks;

pub use db::Store;
pub use defaults::seed_defaults;
pub use locks::LockTable;
