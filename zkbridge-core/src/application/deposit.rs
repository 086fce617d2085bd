use crate::application::nonce::NonceSource;
use crate::domain::deposit::{scale_amount, DepositRecord, DepositState};
use crate::domain::ObservedTopUp;
use crate::foundation::util::time::now_ms;
use crate::foundation::BridgeError;
use crate::infrastructure::l1::L1Reader;
use crate::infrastructure::l2::RollupClient;
use crate::infrastructure::rpc::{retry, RETRY_ATTEMPTS, RETRY_DELAY};
use crate::infrastructure::storage::TrackingStore;
use ethers::types::H256;
use log::{debug, info, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Per-transaction deposit state machine.
///
/// Exactly one instance drives submissions per process, one event at
/// a time; the `submitting` flag turns any violation of that into a
/// fatal error, because a concurrent submission would defeat the
/// verify-then-retry guarantee.
pub struct DepositProcessor {
    store: Arc<dyn TrackingStore>,
    l1: Arc<dyn L1Reader>,
    l2: Arc<dyn RollupClient>,
    nonces: NonceSource,
    token_precision: u32,
    submitting: AtomicBool,
}

struct SubmitArgs {
    tx_hash: H256,
    nonce: u64,
    pid_1: u64,
    pid_2: u64,
    token_index: u64,
    amount: u64,
}

impl DepositProcessor {
    pub fn new(store: Arc<dyn TrackingStore>, l1: Arc<dyn L1Reader>, l2: Arc<dyn RollupClient>, token_precision: u32) -> Self {
        let nonces = NonceSource::new(l2.clone());
        Self { store, l1, l2, nonces, token_precision, submitting: AtomicBool::new(false) }
    }

    /// Drive one observed `TopUp` through the state machine. Safe to
    /// call any number of times for the same tx hash; the tracking
    /// store plus `checkDeposit` keep the credit at-most-once.
    pub async fn handle(&self, observed: &ObservedTopUp) -> Result<()> {
        let event = &observed.event;
        let tx_hash = observed.tx_hash;

        let token_index =
            match retry("allTokens", RETRY_ATTEMPTS, RETRY_DELAY, || self.l1.token_index(event.l1_token)).await? {
                Some(index) => index,
                None => {
                    debug!("ignoring TopUp with unknown token tx_hash={:#x} token={:#x}", tx_hash, event.l1_token);
                    return Ok(());
                }
            };

        let amount = scale_amount(event.amount_wei, self.token_precision)?;

        let record = match self.store.find_deposit(&tx_hash)? {
            Some(existing) => existing,
            None => {
                let state = if amount < 1 { DepositState::Completed } else { DepositState::Pending };
                let fresh = DepositRecord::new(
                    tx_hash,
                    state,
                    event.l1_token,
                    event.beneficiary,
                    event.pid_1,
                    event.pid_2,
                    amount,
                    now_ms(),
                );
                let stored = self.store.insert_or_get_deposit(&fresh)?;
                if state == DepositState::Completed {
                    info!("dust deposit acknowledged tx_hash={:#x} amount_wei={}", tx_hash, event.amount_wei);
                }
                stored
            }
        };

        match record.state {
            DepositState::Completed => {
                trace!("deposit already completed tx_hash={:#x}", tx_hash);
                Ok(())
            }
            DepositState::Pending => self.advance_pending(&record, token_index).await,
            DepositState::InProgress | DepositState::Failed => self.verify_then_retry(&record, token_index).await,
        }
    }

    async fn advance_pending(&self, record: &DepositRecord, token_index: u64) -> Result<()> {
        if record.amount < 1 {
            self.store.mark_deposit_completed(&record.tx_hash)?;
            return Ok(());
        }

        let nonce = self.nonces.next_nonce().await?;
        let moved = self.store.update_deposit_where(&record.tx_hash, DepositState::Pending, &|r| {
            r.nonce = Some(nonce);
            r.state = DepositState::InProgress;
        })?;
        if !moved {
            debug!("deposit left pending concurrently tx_hash={:#x}; skipping", record.tx_hash);
            return Ok(());
        }

        self.submit(SubmitArgs {
            tx_hash: record.tx_hash,
            nonce,
            pid_1: record.pid_1,
            pid_2: record.pid_2,
            token_index,
            amount: record.amount,
        })
        .await
    }

    /// Resume path for `in-progress` and `failed` records. A crash
    /// between "deposit submitted" and "state updated" is
    /// indistinguishable from a failed submission, so the rollup's
    /// `checkDeposit` is consulted before any resubmission.
    async fn verify_then_retry(&self, record: &DepositRecord, token_index: u64) -> Result<()> {
        let Some(nonce) = record.nonce else {
            return Err(BridgeError::FatalInvariant(format!(
                "deposit tx_hash={:#x} is {} without a nonce",
                record.tx_hash, record.state
            )));
        };

        let verified = retry("checkDeposit", RETRY_ATTEMPTS, RETRY_DELAY, || {
            self.l2.check_deposit(nonce, record.pid_1, record.pid_2, token_index, record.amount)
        })
        .await?;
        if verified {
            self.store.mark_deposit_completed(&record.tx_hash)?;
            info!("deposit verified on rollup tx_hash={:#x} nonce={}", record.tx_hash, nonce);
            return Ok(());
        }

        let fresh_nonce = self.nonces.next_nonce().await?;
        let moved = self.store.update_deposit_where(&record.tx_hash, record.state, &|r| {
            r.nonce = Some(fresh_nonce);
            r.retry_count += 1;
            r.last_retry_ms = Some(now_ms());
            r.state = DepositState::InProgress;
        })?;
        if !moved {
            debug!("deposit state moved concurrently tx_hash={:#x}; skipping retry", record.tx_hash);
            return Ok(());
        }
        info!(
            "retrying deposit tx_hash={:#x} retry_count={} nonce={}",
            record.tx_hash,
            record.retry_count + 1,
            fresh_nonce
        );

        self.submit(SubmitArgs {
            tx_hash: record.tx_hash,
            nonce: fresh_nonce,
            pid_1: record.pid_1,
            pid_2: record.pid_2,
            token_index,
            amount: record.amount,
        })
        .await
    }

    /// Submit the credit command, exactly one attempt. The record is
    /// already durable as `in-progress` with its nonce, so a crash or
    /// failure anywhere in here lands in the verify-first path, which
    /// is the only safe place to retry from.
    async fn submit(&self, args: SubmitArgs) -> Result<()> {
        if self.submitting.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::FatalInvariant(format!(
                "reentrant deposit submission detected tx_hash={:#x}",
                args.tx_hash
            )));
        }
        let result = self.l2.deposit(args.nonce, args.pid_1, args.pid_2, args.token_index, args.amount).await;
        self.submitting.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                self.store.mark_deposit_completed(&args.tx_hash)?;
                info!(
                    "deposit credited tx_hash={:#x} nonce={} pid_1={} pid_2={} token_index={} amount={}",
                    args.tx_hash, args.nonce, args.pid_1, args.pid_2, args.token_index, args.amount
                );
                Ok(())
            }
            Err(err) => {
                warn!("deposit submission failed tx_hash={:#x} nonce={}: {}", args.tx_hash, args.nonce, err);
                self.store.update_deposit_where(&args.tx_hash, DepositState::InProgress, &|r| {
                    r.state = DepositState::Failed;
                })?;
                Ok(())
            }
        }
    }
}
