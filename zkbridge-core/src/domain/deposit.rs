use crate::foundation::BridgeError;
use ethers::types::{H160, H256, U256};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of one observed `TopUp` event, keyed by its L1 tx hash.
///
/// The only legal walks are `pending -> in-progress -> (completed | failed)`
/// with `failed -> in-progress` retry cycles; `completed` is terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepositState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

const VALID_TRANSITIONS: &[(DepositState, DepositState)] = &[
    (DepositState::Pending, DepositState::InProgress),
    (DepositState::Pending, DepositState::Completed),
    (DepositState::InProgress, DepositState::Completed),
    (DepositState::InProgress, DepositState::Failed),
    (DepositState::Failed, DepositState::InProgress),
    (DepositState::Failed, DepositState::Completed),
];

impl DepositState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DepositState::Completed)
    }
}

impl fmt::Display for DepositState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DepositState::Pending => "pending",
            DepositState::InProgress => "in-progress",
            DepositState::Completed => "completed",
            DepositState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for DepositState {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DepositState::Pending),
            "in-progress" => Ok(DepositState::InProgress),
            "completed" => Ok(DepositState::Completed),
            "failed" => Ok(DepositState::Failed),
            other => Err(BridgeError::Message(format!("unknown deposit state: {}", other))),
        }
    }
}

pub fn validate_transition(from: DepositState, to: DepositState) -> bool {
    from == to || VALID_TRANSITIONS.contains(&(from, to))
}

pub fn ensure_valid_transition(tx_hash: &H256, from: DepositState, to: DepositState) -> Result<(), BridgeError> {
    if validate_transition(from, to) {
        info!("deposit state transition tx_hash={:#x} from_state={} to_state={}", tx_hash, from, to);
        Ok(())
    } else {
        warn!("invalid deposit state transition tx_hash={:#x} from_state={} to_state={}", tx_hash, from, to);
        Err(BridgeError::InvalidStateTransition { from: from.to_string(), to: to.to_string() })
    }
}

/// Durable record of one L1 deposit, the source of truth for its
/// progress toward an L2 credit.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct DepositRecord {
    pub tx_hash: H256,
    pub state: DepositState,
    pub l1_token: H160,
    pub beneficiary: H160,
    pub pid_1: u64,
    pub pid_2: u64,
    /// Whole-unit amount after precision scaling, never wei.
    pub amount: u64,
    pub nonce: Option<u64>,
    pub retry_count: u32,
    pub last_retry_ms: Option<u64>,
    pub created_at_ms: u64,
}

impl DepositRecord {
    pub fn new(tx_hash: H256, state: DepositState, l1_token: H160, beneficiary: H160, pid_1: u64, pid_2: u64, amount: u64, created_at_ms: u64) -> Self {
        Self {
            tx_hash,
            state,
            l1_token,
            beneficiary,
            pid_1,
            pid_2,
            amount,
            nonce: None,
            retry_count: 0,
            last_retry_ms: None,
            created_at_ms,
        }
    }
}

/// Convert a wei amount to whole units by integer division with
/// `10^(18 - token_precision)`. Precision 0 is the plain 10^18
/// division; precision 18 passes the raw value through.
pub fn scale_amount(amount_wei: U256, token_precision: u32) -> Result<u64, BridgeError> {
    let scale = 18u32.saturating_sub(token_precision);
    let divisor = U256::exp10(scale as usize);
    let units = amount_wei / divisor;
    if units > U256::from(u64::MAX) {
        return Err(BridgeError::AmountOverflow { amount_wei: amount_wei.to_string(), scale });
    }
    Ok(units.as_u64())
}
