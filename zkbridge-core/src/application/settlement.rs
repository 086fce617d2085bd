use crate::domain::instance::{reduce_instances, to_hex32};
use crate::domain::{SettleStatus, SettlementRecord};
use crate::foundation::BridgeError;
use crate::infrastructure::l1::{SettlementPayload, SettlementSubmitter};
use crate::infrastructure::l2::{RollupClient, TaskBundle};
use crate::infrastructure::rpc::{retry, RETRY_ATTEMPTS, RETRY_DELAY};
use crate::infrastructure::storage::TrackingStore;
use ethers::types::{H256, U256};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

pub type Result<T> = std::result::Result<T, BridgeError>;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Reduces the rollup's proof ledger onto the L1 settlement contract.
///
/// Bundles are settled in strictly ascending task order; the contract
/// requires each submission to extend the previous state root, so a
/// bundle that cannot advance blocks everything behind it until the
/// next round.
pub struct SettlementPoller {
    store: Arc<dyn TrackingStore>,
    l2: Arc<dyn RollupClient>,
    submitter: Arc<dyn SettlementSubmitter>,
    poll_interval: Duration,
}

fn payload_from_bundle(bundle: &TaskBundle) -> SettlementPayload {
    SettlementPayload {
        tx_data: bundle.tx_data.clone(),
        proof: bundle.proof_arr.clone(),
        verify_instance: bundle.verify_instance_arr.clone(),
        aux: bundle.aux_arr.clone(),
        instances: vec![bundle.inst_arr.iter().map(|limb| U256::from(*limb)).collect()],
    }
}

fn u256_to_h256(value: U256) -> H256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    H256::from(bytes)
}

impl SettlementPoller {
    pub fn new(store: Arc<dyn TrackingStore>, l2: Arc<dyn RollupClient>, submitter: Arc<dyn SettlementSubmitter>, poll_interval: Duration) -> Self {
        Self { store, l2, submitter, poll_interval }
    }

    pub async fn run_loop(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("settlement poller started interval_secs={}", self.poll_interval.as_secs());

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_round().await {
                        Ok(()) => {}
                        Err(err) if err.is_fatal() => return Err(err),
                        Err(err) => warn!("settlement round failed: {}", err),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("settlement poller stopping");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// One settlement round: fetch the ready queue and walk it in
    /// task order until a bundle fails to confirm.
    pub async fn run_round(&self) -> Result<()> {
        let mut bundles = retry("getTaskBundles", RETRY_ATTEMPTS, RETRY_DELAY, || self.l2.ready_bundles()).await?;
        bundles.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        debug!("settlement round bundles={}", bundles.len());

        for bundle in &bundles {
            match self.process_bundle(bundle).await {
                Ok(true) => {}
                Ok(false) => {
                    info!("bundle task_id={} not confirmed; holding queue until next round", bundle.task_id);
                    return Ok(());
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!("bundle task_id={} blocked: {}", bundle.task_id, err);
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Returns whether the bundle is confirmed on L1.
    async fn process_bundle(&self, bundle: &TaskBundle) -> Result<bool> {
        let record = match self.store.find_settlement(&bundle.task_id)? {
            Some(existing) => existing,
            None => {
                let fresh = SettlementRecord::new(bundle.task_id.clone(), bundle.merkle_root, bundle.withdraw_array.clone());
                self.store.insert_settlement_if_absent(&fresh)?;
                fresh
            }
        };
        if record.status == SettleStatus::Confirmed {
            return Ok(true);
        }

        let roots = reduce_instances(&bundle.inst_arr)?;
        debug!(
            "bundle task_id={} merkle_root={} new_merkle_root={} sha_hash={}",
            bundle.task_id,
            to_hex32(roots.merkle_root),
            to_hex32(roots.new_merkle_root),
            to_hex32(roots.sha_hash)
        );
        if u256_to_h256(roots.merkle_root) != record.merkle_root {
            warn!(
                "bundle task_id={} instance root {} disagrees with recorded root {:#x}",
                bundle.task_id,
                to_hex32(roots.merkle_root),
                record.merkle_root
            );
        }

        match record.status {
            SettleStatus::Confirmed => Ok(true),
            SettleStatus::Submitted => match record.broadcast_hash() {
                // Crash recovery: the transaction went out, its fate is unknown.
                Some(tx_hash) => self.resolve_receipt(bundle, tx_hash).await,
                // Placeholder hash: the process died between the durable
                // marker and the broadcast. The contract rejects a stale
                // previous root, so resubmitting is safe.
                None => {
                    self.store.update_settlement_where(&bundle.task_id, SettleStatus::Submitted, &|r| {
                        r.status = SettleStatus::Failed;
                    })?;
                    Ok(false)
                }
            },
            SettleStatus::Unsubmitted | SettleStatus::Failed => self.submit_bundle(bundle, record.status).await,
        }
    }

    async fn submit_bundle(&self, bundle: &TaskBundle, from: SettleStatus) -> Result<bool> {
        let moved = self.store.update_settlement_where(&bundle.task_id, from, &|r| {
            r.status = SettleStatus::Submitted;
            r.settle_tx_hash = Some(H256::zero());
        })?;
        if !moved {
            debug!("bundle task_id={} moved concurrently; skipping", bundle.task_id);
            return Ok(false);
        }

        let payload = payload_from_bundle(bundle);
        let tx_hash = match self.submitter.submit(&payload).await {
            Ok(tx_hash) => tx_hash,
            Err(err) => {
                warn!("settlement submission failed task_id={}: {}", bundle.task_id, err);
                self.store.update_settlement_where(&bundle.task_id, SettleStatus::Submitted, &|r| {
                    r.status = SettleStatus::Failed;
                })?;
                return Ok(false);
            }
        };
        self.store.update_settlement_where(&bundle.task_id, SettleStatus::Submitted, &|r| {
            r.settle_tx_hash = Some(tx_hash);
        })?;
        info!("settlement submitted task_id={} tx_hash={:#x}", bundle.task_id, tx_hash);

        self.resolve_receipt(bundle, tx_hash).await
    }

    async fn resolve_receipt(&self, bundle: &TaskBundle, tx_hash: H256) -> Result<bool> {
        match self.submitter.confirm(tx_hash).await {
            Ok(()) => {
                self.store.mark_settlement_confirmed(&bundle.task_id)?;
                info!("settlement confirmed task_id={} tx_hash={:#x}", bundle.task_id, tx_hash);
                Ok(true)
            }
            Err(err) => {
                warn!("settlement not confirmed task_id={} tx_hash={:#x}: {}", bundle.task_id, tx_hash, err);
                self.store.update_settlement_where(&bundle.task_id, SettleStatus::Submitted, &|r| {
                    r.status = SettleStatus::Failed;
                })?;
                Ok(false)
            }
        }
    }
}
