use crate::domain::{deposit, settlement, DepositRecord, DepositState, SettleStatus, SettlementRecord};
use crate::foundation::{BridgeError, TaskId};
use crate::infrastructure::storage::traits::{Result, TrackingStore};
use ethers::types::H256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

struct MemoryInner {
    deposits: HashMap<H256, DepositRecord>,
    settlements: HashMap<TaskId, SettlementRecord>,
}

/// In-memory engine with the same conditional-update semantics as the
/// RocksDB store; used by tests and nothing else.
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(MemoryInner { deposits: HashMap::new(), settlements: HashMap::new() })) }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner.lock().map_err(|_| BridgeError::storage("lock", "memory store lock poisoned"))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingStore for MemoryStore {
    fn find_deposit(&self, tx_hash: &H256) -> Result<Option<DepositRecord>> {
        Ok(self.lock_inner()?.deposits.get(tx_hash).cloned())
    }

    fn insert_deposit_if_absent(&self, record: &DepositRecord) -> Result<bool> {
        let mut inner = self.lock_inner()?;
        if inner.deposits.contains_key(&record.tx_hash) {
            return Ok(false);
        }
        inner.deposits.insert(record.tx_hash, record.clone());
        Ok(true)
    }

    fn insert_or_get_deposit(&self, record: &DepositRecord) -> Result<DepositRecord> {
        let mut inner = self.lock_inner()?;
        Ok(inner.deposits.entry(record.tx_hash).or_insert_with(|| record.clone()).clone())
    }

    fn update_deposit_where(&self, tx_hash: &H256, expected: DepositState, mutate: &dyn Fn(&mut DepositRecord)) -> Result<bool> {
        let mut inner = self.lock_inner()?;
        let Some(record) = inner.deposits.get_mut(tx_hash) else {
            return Ok(false);
        };
        if record.state != expected {
            return Ok(false);
        }
        let mut updated = record.clone();
        mutate(&mut updated);
        deposit::ensure_valid_transition(tx_hash, expected, updated.state)?;
        *record = updated;
        Ok(true)
    }

    fn mark_deposit_completed(&self, tx_hash: &H256) -> Result<bool> {
        let mut inner = self.lock_inner()?;
        let Some(record) = inner.deposits.get_mut(tx_hash) else {
            return Ok(false);
        };
        if record.state == DepositState::Completed {
            return Ok(false);
        }
        deposit::ensure_valid_transition(tx_hash, record.state, DepositState::Completed)?;
        record.state = DepositState::Completed;
        Ok(true)
    }

    fn find_settlement(&self, task_id: &TaskId) -> Result<Option<SettlementRecord>> {
        Ok(self.lock_inner()?.settlements.get(task_id).cloned())
    }

    fn insert_settlement_if_absent(&self, record: &SettlementRecord) -> Result<bool> {
        let mut inner = self.lock_inner()?;
        if inner.settlements.contains_key(&record.task_id) {
            return Ok(false);
        }
        inner.settlements.insert(record.task_id.clone(), record.clone());
        Ok(true)
    }

    fn update_settlement_where(&self, task_id: &TaskId, expected: SettleStatus, mutate: &dyn Fn(&mut SettlementRecord)) -> Result<bool> {
        let mut inner = self.lock_inner()?;
        let Some(record) = inner.settlements.get_mut(task_id) else {
            return Ok(false);
        };
        if record.status != expected {
            return Ok(false);
        }
        let mut updated = record.clone();
        mutate(&mut updated);
        settlement::ensure_valid_transition(task_id, expected, updated.status)?;
        *record = updated;
        Ok(true)
    }

    fn mark_settlement_confirmed(&self, task_id: &TaskId) -> Result<bool> {
        let mut inner = self.lock_inner()?;
        let Some(record) = inner.settlements.get_mut(task_id) else {
            return Ok(false);
        };
        if record.status == SettleStatus::Confirmed {
            return Ok(false);
        }
        settlement::ensure_valid_transition(task_id, record.status, SettleStatus::Confirmed)?;
        record.status = SettleStatus::Confirmed;
        Ok(true)
    }
}
