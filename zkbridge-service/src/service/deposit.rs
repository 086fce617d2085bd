use log::{debug, info};
use std::sync::Arc;
use tokio::sync::watch;
use zkbridge_core::application::{DepositProcessor, L1Scanner, ScannerConfig};
use zkbridge_core::domain::command::create_player_command;
use zkbridge_core::foundation::BridgeError;
use zkbridge_core::infrastructure::config::BridgeConfig;
use zkbridge_core::infrastructure::l1::{EthersL1Client, L1Reader};
use zkbridge_core::infrastructure::l2::{HttpRollupClient, RollupClient};
use zkbridge_core::infrastructure::storage::{RocksStore, TrackingStore};

/// Deposit daemon: open the per-contract tracking store, install the
/// rollup admin player, run one historical sweep, then tail-poll until
/// shutdown.
pub async fn run_deposit_service(config: &BridgeConfig, shutdown: watch::Receiver<bool>) -> Result<(), BridgeError> {
    let store_dir = config.deposit_store_dir();
    let store: Arc<dyn TrackingStore> = Arc::new(RocksStore::open(&store_dir)?);
    store.health_check()?;
    info!("tracking store ready path={}", store_dir.display());

    let l1: Arc<dyn L1Reader> = Arc::new(EthersL1Client::new(&config.rpc_provider, config.settlement_contract)?);
    let l2: Arc<dyn RollupClient> =
        Arc::new(HttpRollupClient::new(&config.rollup_rpc_url, &config.server_admin_key, config.deposit_opcode)?);

    install_admin_player(l2.as_ref()).await?;

    let processor = Arc::new(DepositProcessor::new(store, l1.clone(), l2, config.token_precision));
    let scanner_config = ScannerConfig { start_block: config.start_block, ..Default::default() };
    let mut scanner = L1Scanner::new(l1, processor, scanner_config);

    scanner.historical_sweep().await?;
    scanner.run_poll_loop(shutdown).await
}

/// `CREATE_PLAYER` at nonce 0 registers the admin identity; on a
/// previously-installed rollup the call fails with an already-exists
/// error, which is not an error here.
async fn install_admin_player(l2: &dyn RollupClient) -> Result<(), BridgeError> {
    match l2.send_transaction(&create_player_command()).await {
        Ok(_) => {
            info!("admin player installed");
            Ok(())
        }
        Err(err) if is_already_exists(&err) => {
            debug!("admin player already installed");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn is_already_exists(err: &BridgeError) -> bool {
    let normalized: String = err.to_string().to_ascii_lowercase().chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    normalized.contains("alreadyexist")
}
