use ethers::types::{H160, H256, U256};

/// Decoded `TopUp(address l1token, address user, uint256 pid_1,
/// uint256 pid_2, uint256 amount)` event payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TopUpEvent {
    pub l1_token: H160,
    pub beneficiary: H160,
    pub pid_1: u64,
    pub pid_2: u64,
    pub amount_wei: U256,
}

/// A `TopUp` event together with its position on L1. Ordering within
/// a scan round is `(block_number, log_index)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ObservedTopUp {
    pub tx_hash: H256,
    pub block_number: u64,
    pub log_index: u64,
    pub event: TopUpEvent,
}
