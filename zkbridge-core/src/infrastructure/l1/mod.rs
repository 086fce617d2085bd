mod contract;

pub use contract::{SettlementProxy, TokenInfo, TopUpFilter};

use crate::domain::{ObservedTopUp, TopUpEvent};
use crate::foundation::BridgeError;
use async_trait::async_trait;
use ethers::contract::LogMeta;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Bytes, H160, H256, U256};
use log::warn;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

pub type Result<T> = std::result::Result<T, BridgeError>;

const RECEIPT_POLL_ATTEMPTS: usize = 20;
const RECEIPT_POLL_DELAY: Duration = Duration::from_secs(3);

/// Read-side view of the settlement contract used by the scanner and
/// the deposit machine.
#[async_trait]
pub trait L1Reader: Send + Sync {
    async fn head_block(&self) -> Result<u64>;

    /// `TopUp` logs in `[from_block, to_block]`, ordered by
    /// `(block_number, log_index)`. Logs whose payload does not fit
    /// the event shape are logged and dropped here.
    async fn topup_logs(&self, from_block: u64, to_block: u64) -> Result<Vec<ObservedTopUp>>;

    /// Position of `l1_token` in the contract's `allTokens()` list,
    /// or None when the token is unknown.
    async fn token_index(&self, l1_token: H160) -> Result<Option<u64>>;
}

/// Calldata for one settlement submission, assembled from a proof
/// bundle without touching the proof bytes themselves.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SettlementPayload {
    pub tx_data: Vec<u8>,
    pub proof: Vec<U256>,
    pub verify_instance: Vec<U256>,
    pub aux: Vec<U256>,
    pub instances: Vec<Vec<U256>>,
}

/// Write-side of the settlement contract. `submit` returns as soon as
/// the transaction is broadcast; `confirm` resolves its receipt.
#[async_trait]
pub trait SettlementSubmitter: Send + Sync {
    async fn submit(&self, payload: &SettlementPayload) -> Result<H256>;

    /// Ok when the receipt reports success; `ReceiptRevert` on status
    /// 0 and `ReceiptMissing` when the transaction never lands.
    async fn confirm(&self, tx_hash: H256) -> Result<()>;
}

fn u256_to_u64(value: U256) -> Option<u64> {
    if value > U256::from(u64::MAX) {
        None
    } else {
        Some(value.as_u64())
    }
}

fn to_observed(event: TopUpFilter, meta: LogMeta) -> Result<ObservedTopUp> {
    let pid_1 = u256_to_u64(event.pid_1).ok_or_else(|| BridgeError::MalformedEvent {
        tx_hash: format!("{:#x}", meta.transaction_hash),
        details: format!("pid_1 {} exceeds u64", event.pid_1),
    })?;
    let pid_2 = u256_to_u64(event.pid_2).ok_or_else(|| BridgeError::MalformedEvent {
        tx_hash: format!("{:#x}", meta.transaction_hash),
        details: format!("pid_2 {} exceeds u64", event.pid_2),
    })?;
    Ok(ObservedTopUp {
        tx_hash: meta.transaction_hash,
        block_number: meta.block_number.as_u64(),
        log_index: meta.log_index.as_u64(),
        event: TopUpEvent { l1_token: event.token, beneficiary: event.user, pid_1, pid_2, amount_wei: event.amount },
    })
}

/// `L1Reader` over a plain HTTP provider.
pub struct EthersL1Client {
    provider: Arc<Provider<Http>>,
    contract: SettlementProxy<Provider<Http>>,
}

impl EthersL1Client {
    pub fn new(rpc_url: &str, contract_address: H160) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|err| BridgeError::ConfigError(format!("bad L1 rpc url {}: {}", rpc_url, err)))?;
        let provider = Arc::new(provider);
        let contract = SettlementProxy::new(contract_address, provider.clone());
        Ok(Self { provider, contract })
    }
}

#[async_trait]
impl L1Reader for EthersL1Client {
    async fn head_block(&self) -> Result<u64> {
        let head = self.provider.get_block_number().await.map_err(|err| BridgeError::provider("get_block_number", err))?;
        Ok(head.as_u64())
    }

    async fn topup_logs(&self, from_block: u64, to_block: u64) -> Result<Vec<ObservedTopUp>> {
        let raw: Vec<(TopUpFilter, LogMeta)> = self
            .contract
            .top_up_filter()
            .from_block(from_block)
            .to_block(to_block)
            .query_with_meta()
            .await
            .map_err(|err| BridgeError::provider("get_logs", err))?;

        let mut observed = Vec::with_capacity(raw.len());
        for (event, meta) in raw {
            match to_observed(event, meta) {
                Ok(log) => observed.push(log),
                Err(err) => warn!("dropping undecodable TopUp log: {}", err),
            }
        }
        observed.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(observed)
    }

    async fn token_index(&self, l1_token: H160) -> Result<Option<u64>> {
        let tokens: Vec<H160> =
            self.contract.all_tokens().call().await.map_err(|err| BridgeError::provider("allTokens", err))?;
        Ok(tokens.iter().position(|token_uid| *token_uid == l1_token).map(|index| index as u64))
    }
}

/// `SettlementSubmitter` over a signing middleware.
pub struct EthersSettlementClient {
    provider: Arc<Provider<Http>>,
    contract: SettlementProxy<SignerMiddleware<Provider<Http>, LocalWallet>>,
}

impl EthersSettlementClient {
    pub fn new(rpc_url: &str, contract_address: H160, settler_private_key: &str, chain_id: Option<u64>) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|err| BridgeError::ConfigError(format!("bad L1 rpc url {}: {}", rpc_url, err)))?;
        let provider = Arc::new(provider);

        let mut wallet = LocalWallet::from_str(settler_private_key)
            .map_err(|err| BridgeError::ConfigError(format!("bad settler private key: {}", err)))?;
        if let Some(chain_id) = chain_id {
            wallet = wallet.with_chain_id(chain_id);
        }

        let middleware = Arc::new(SignerMiddleware::new(provider.as_ref().clone(), wallet));
        let contract = SettlementProxy::new(contract_address, middleware);
        Ok(Self { provider, contract })
    }
}

#[async_trait]
impl SettlementSubmitter for EthersSettlementClient {
    async fn submit(&self, payload: &SettlementPayload) -> Result<H256> {
        let call = self.contract.verify(
            Bytes::from(payload.tx_data.clone()),
            payload.proof.clone(),
            payload.verify_instance.clone(),
            payload.aux.clone(),
            payload.instances.clone(),
        );
        let pending = call.send().await.map_err(|err| BridgeError::provider("verify send", err))?;
        Ok(pending.tx_hash())
    }

    async fn confirm(&self, tx_hash: H256) -> Result<()> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|err| BridgeError::provider("get_transaction_receipt", err))?;
            if let Some(receipt) = receipt {
                if receipt.status == Some(1.into()) {
                    return Ok(());
                }
                return Err(BridgeError::ReceiptRevert { tx_hash: format!("{:#x}", tx_hash) });
            }
            sleep(RECEIPT_POLL_DELAY).await;
        }
        Err(BridgeError::ReceiptMissing { tx_hash: format!("{:#x}", tx_hash) })
    }
}
