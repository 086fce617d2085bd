use crate::application::deposit::DepositProcessor;
use crate::foundation::BridgeError;
use crate::infrastructure::l1::L1Reader;
use crate::infrastructure::rpc::{retry, RETRY_ATTEMPTS, RETRY_DELAY};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// How a failed batch affects the rest of the round.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BatchErrorPolicy {
    /// Historical sweep: log, keep scanning later batches, but stop
    /// advancing `last_processed` so nothing is skipped for good.
    Continue,
    /// Tail poll: end the round; the next round re-reads the range.
    StopRound,
}

#[derive(Clone, Copy, Debug)]
pub struct ScannerConfig {
    pub start_block: Option<u64>,
    /// Upper bound on blocks per `getLogs` call.
    pub batch_span: u64,
    /// How far behind head the sweep starts when no start block is
    /// configured.
    pub lookback: u64,
    pub poll_interval: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self { start_block: None, batch_span: 25_000, lookback: 200_000, poll_interval: Duration::from_secs(30) }
    }
}

/// Paginated historical sweep plus periodic tail poll over the
/// settlement contract's `TopUp` logs. Events are handed to the
/// deposit machine one at a time in `(block, log_index)` order, and
/// `last_processed` never moves past a block whose events have not
/// all been handed over.
pub struct L1Scanner {
    l1: Arc<dyn L1Reader>,
    processor: Arc<DepositProcessor>,
    config: ScannerConfig,
    last_processed: u64,
    busy: AtomicBool,
}

impl L1Scanner {
    pub fn new(l1: Arc<dyn L1Reader>, processor: Arc<DepositProcessor>, config: ScannerConfig) -> Self {
        Self { l1, processor, config, last_processed: 0, busy: AtomicBool::new(false) }
    }

    pub fn last_processed(&self) -> u64 {
        self.last_processed
    }

    /// One pass from the configured start block (or `head - lookback`)
    /// to the current head. Skipped entirely when the configured start
    /// sits beyond the head; the tail poll then waits for the chain to
    /// reach it.
    pub async fn historical_sweep(&mut self) -> Result<()> {
        let head = retry("get_block_number", RETRY_ATTEMPTS, RETRY_DELAY, || self.l1.head_block()).await?;
        let start = match self.config.start_block {
            Some(start) if start > head => {
                info!("historical sweep skipped: start_block={} is beyond head={}", start, head);
                self.last_processed = start.saturating_sub(1);
                return Ok(());
            }
            Some(start) => start,
            None => head.saturating_sub(self.config.lookback),
        };
        info!("historical sweep start_block={} head={}", start, head);
        self.scan_range(start, head, BatchErrorPolicy::Continue).await
    }

    /// Tail poll until shutdown. A tick that fires while the previous
    /// round is still running is skipped, never queued.
    pub async fn run_poll_loop(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("tail poll started interval_secs={} last_processed={}", self.config.poll_interval.as_secs(), self.last_processed);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.busy.swap(true, Ordering::SeqCst) {
                        debug!("previous poll round still running; skipping this tick");
                        continue;
                    }
                    let result = self.poll_round().await;
                    self.busy.store(false, Ordering::SeqCst);
                    match result {
                        Ok(()) => {}
                        Err(err) if err.is_fatal() => return Err(err),
                        Err(err) => warn!("poll round failed: {}", err),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scanner stopping last_processed={}", self.last_processed);
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn poll_round(&mut self) -> Result<()> {
        let head = retry("get_block_number", RETRY_ATTEMPTS, RETRY_DELAY, || self.l1.head_block()).await?;
        if head <= self.last_processed {
            return Ok(());
        }
        self.scan_range(self.last_processed + 1, head, BatchErrorPolicy::StopRound).await
    }

    async fn scan_range(&mut self, from_block: u64, to_block: u64, policy: BatchErrorPolicy) -> Result<()> {
        let mut advance = true;
        let mut from = from_block;
        while from <= to_block {
            let to = to_block.min(from + self.config.batch_span - 1);
            match self.process_batch(from, to).await {
                Ok(()) => {
                    if advance {
                        self.last_processed = to;
                    }
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!("batch {}..={} failed: {}", from, to, err);
                    if policy == BatchErrorPolicy::StopRound {
                        return Ok(());
                    }
                    advance = false;
                }
            }
            from = to + 1;
        }
        Ok(())
    }

    async fn process_batch(&self, from_block: u64, to_block: u64) -> Result<()> {
        let logs = retry("get_logs", RETRY_ATTEMPTS, RETRY_DELAY, || self.l1.topup_logs(from_block, to_block)).await?;
        debug!("batch {}..={} events={}", from_block, to_block, logs.len());
        for log in &logs {
            match self.processor.handle(log).await {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => warn!("event failed tx_hash={:#x} block={}: {}", log.tx_hash, log.block_number, err),
            }
        }
        Ok(())
    }
}
