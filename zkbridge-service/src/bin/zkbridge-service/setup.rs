use log::info;
use tokio::sync::watch;
use zkbridge_core::foundation::BridgeError;
use zkbridge_core::infrastructure::config::{BridgeConfig, ServiceMode};

pub fn load_config(mode: ServiceMode) -> Result<BridgeConfig, BridgeError> {
    let config = BridgeConfig::from_env()?;
    config.validate(mode)?;
    info!(
        "config loaded settlement_contract={:#x} rollup_rpc_url={} start_block={:?} token_precision={} deposit_opcode={} withdraw_opcode={}",
        config.settlement_contract,
        config.rollup_rpc_url,
        config.start_block,
        config.token_precision,
        config.deposit_opcode,
        config.withdraw_opcode
    );
    Ok(config)
}

/// Cooperative shutdown: flips the watch on ctrl-c; the daemons
/// observe it between rounds and let the current round finish.
pub fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = tx.send(true);
        }
    });
    rx
}
