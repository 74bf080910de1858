//! Per-key async locks.
//!
//! A single-process stand-in for row-level `SELECT … FOR UPDATE`: the punch
//! coordinator locks `(company, employee)` and the OTP flows lock the user
//! id before reading, mutating, and writing back the row.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use shiftledger_core::types::{CompanyId, UserId};

#[derive(Default)]
pub struct LockTable {
    locks: Mutex<HashMap<Vec<u8>, Arc<AsyncMutex<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for an arbitrary key, creating it on first use.
    pub async fn acquire(&self, key: Vec<u8>) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.locks.lock().expect("lock table poisoned");
            table
                .entry(key)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Serialize punches for one employee of one company.
    pub async fn punch_lock(
        &self,
        company_id: &CompanyId,
        employee_id: &UserId,
    ) -> OwnedMutexGuard<()> {
        let mut key = Vec::with_capacity(33);
        key.push(b'p');
        key.extend_from_slice(company_id.as_bytes());
        key.extend_from_slice(employee_id.as_bytes());
        self.acquire(key).await
    }

    /// Serialize OTP-state mutations for one user.
    pub async fn user_lock(&self, user_id: &UserId) -> OwnedMutexGuard<()> {
        let mut key = Vec::with_capacity(17);
        key.push(b'u');
        key.extend_from_slice(user_id.as_bytes());
        self.acquire(key).await
    }
}
