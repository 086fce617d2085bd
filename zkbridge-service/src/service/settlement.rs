use log::info;
use std::sync::Arc;
use tokio::sync::watch;
use zkbridge_core::application::settlement::DEFAULT_POLL_INTERVAL;
use zkbridge_core::application::SettlementPoller;
use zkbridge_core::foundation::BridgeError;
use zkbridge_core::infrastructure::config::BridgeConfig;
use zkbridge_core::infrastructure::l1::{EthersSettlementClient, SettlementSubmitter};
use zkbridge_core::infrastructure::l2::{HttpRollupClient, RollupClient};
use zkbridge_core::infrastructure::storage::{RocksStore, TrackingStore};

/// Settlement daemon: poll the rollup's ready queue and reduce it
/// onto the L1 contract until shutdown.
pub async fn run_settlement_service(config: &BridgeConfig, shutdown: watch::Receiver<bool>) -> Result<(), BridgeError> {
    let store_dir = config.settlement_store_dir();
    let store: Arc<dyn TrackingStore> = Arc::new(RocksStore::open(&store_dir)?);
    store.health_check()?;
    info!("tracking store ready path={}", store_dir.display());

    let settler_key = config
        .settler_private_key
        .as_deref()
        .ok_or_else(|| BridgeError::ConfigError("settlement mode requires a settler private key".to_string()))?;
    let submitter: Arc<dyn SettlementSubmitter> = Arc::new(EthersSettlementClient::new(
        &config.rpc_provider,
        config.settlement_contract,
        settler_key,
        config.chain_id,
    )?);
    let l2: Arc<dyn RollupClient> =
        Arc::new(HttpRollupClient::new(&config.rollup_rpc_url, &config.server_admin_key, config.deposit_opcode)?);

    let poller = SettlementPoller::new(store, l2, submitter, DEFAULT_POLL_INTERVAL);
    poller.run_loop(shutdown).await
}
