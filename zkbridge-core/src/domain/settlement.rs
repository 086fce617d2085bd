use crate::foundation::{BridgeError, TaskId};
use ethers::types::H256;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Settlement lifecycle of one rollup proof bundle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettleStatus {
    Unsubmitted,
    Submitted,
    Confirmed,
    Failed,
}

const VALID_TRANSITIONS: &[(SettleStatus, SettleStatus)] = &[
    (SettleStatus::Unsubmitted, SettleStatus::Submitted),
    (SettleStatus::Submitted, SettleStatus::Confirmed),
    (SettleStatus::Submitted, SettleStatus::Failed),
    (SettleStatus::Failed, SettleStatus::Submitted),
];

impl SettleStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SettleStatus::Confirmed)
    }
}

impl fmt::Display for SettleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettleStatus::Unsubmitted => "unsubmitted",
            SettleStatus::Submitted => "submitted",
            SettleStatus::Confirmed => "confirmed",
            SettleStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

pub fn validate_transition(from: SettleStatus, to: SettleStatus) -> bool {
    from == to || VALID_TRANSITIONS.contains(&(from, to))
}

pub fn ensure_valid_transition(task_id: &TaskId, from: SettleStatus, to: SettleStatus) -> Result<(), BridgeError> {
    if validate_transition(from, to) {
        info!("settlement state transition task_id={} from_state={} to_state={}", task_id, from, to);
        Ok(())
    } else {
        warn!("invalid settlement state transition task_id={} from_state={} to_state={}", task_id, from, to);
        Err(BridgeError::InvalidStateTransition { from: from.to_string(), to: to.to_string() })
    }
}

/// Durable record of one proof bundle's path onto L1.
///
/// `settle_tx_hash` is set to a zero placeholder when the record turns
/// `submitted` ahead of the broadcast, and replaced with the real hash
/// as soon as the transaction is out.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SettlementRecord {
    pub task_id: TaskId,
    /// Previous state root the bundle settles on top of.
    pub merkle_root: H256,
    pub settle_tx_hash: Option<H256>,
    pub status: SettleStatus,
    pub withdraw_array: Vec<H256>,
}

impl SettlementRecord {
    pub fn new(task_id: TaskId, merkle_root: H256, withdraw_array: Vec<H256>) -> Self {
        Self { task_id, merkle_root, settle_tx_hash: None, status: SettleStatus::Unsubmitted, withdraw_array }
    }

    /// The hash of the broadcast transaction; the zero placeholder
    /// persisted ahead of the broadcast does not count.
    pub fn broadcast_hash(&self) -> Option<H256> {
        self.settle_tx_hash.filter(|hash| *hash != H256::zero())
    }
}
