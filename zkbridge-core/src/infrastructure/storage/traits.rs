use crate::domain::{DepositRecord, DepositState, SettleStatus, SettlementRecord};
use crate::foundation::{BridgeError, TaskId};
use ethers::types::H256;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Durable record store backing both state machines. The conditional
/// `update_*_where` primitive is the only coordination mechanism the
/// machines rely on: the mutation applies only when the stored state
/// equals `expected`, atomically with respect to other writers, and
/// the resulting transition must be a legal walk.
///
/// Every committed transition is durable before any external side
/// effect that depends on it.
pub trait TrackingStore: Send + Sync {
    fn find_deposit(&self, tx_hash: &H256) -> Result<Option<DepositRecord>>;

    /// Returns false (leaving the stored record untouched) when the
    /// tx hash is already present.
    fn insert_deposit_if_absent(&self, record: &DepositRecord) -> Result<bool>;

    /// Insert `record` unless its tx hash exists; either way, return
    /// the record now in the store.
    fn insert_or_get_deposit(&self, record: &DepositRecord) -> Result<DepositRecord>;

    /// Apply `mutate` iff the stored state equals `expected`; returns
    /// whether the update applied.
    fn update_deposit_where(&self, tx_hash: &H256, expected: DepositState, mutate: &dyn Fn(&mut DepositRecord)) -> Result<bool>;

    /// Idempotent close: sets `completed` unless already there.
    /// Returns whether the state changed.
    fn mark_deposit_completed(&self, tx_hash: &H256) -> Result<bool>;

    fn find_settlement(&self, task_id: &TaskId) -> Result<Option<SettlementRecord>>;

    fn insert_settlement_if_absent(&self, record: &SettlementRecord) -> Result<bool>;

    fn update_settlement_where(&self, task_id: &TaskId, expected: SettleStatus, mutate: &dyn Fn(&mut SettlementRecord)) -> Result<bool>;

    fn mark_settlement_confirmed(&self, task_id: &TaskId) -> Result<bool>;

    fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
