use crate::fixtures::*;
use ethers::types::U256;
use std::sync::Arc;
use zkbridge_core::application::DepositProcessor;
use zkbridge_core::domain::{DepositRecord, DepositState};
use zkbridge_core::infrastructure::storage::{MemoryStore, TrackingStore};

fn setup() -> (Arc<MemoryStore>, Arc<MockL1>, Arc<MockRollup>, DepositProcessor) {
    let store = Arc::new(MemoryStore::new());
    let l1 = Arc::new(MockL1::new(1_000, vec![token(0x70), token(0x71)]));
    let l2 = Arc::new(MockRollup::new());
    let processor = DepositProcessor::new(store.clone(), l1.clone(), l2.clone(), 0);
    (store, l1, l2, processor)
}

#[tokio::test]
async fn fresh_credit_walks_to_completed() {
    let (store, _l1, l2, processor) = setup();
    let event = topup(1, 10, 0, token(0x70), 1, 2, wei(2));

    processor.handle(&event).await.expect("handle");

    let record = store.find_deposit(&tx_hash(1)).expect("find").expect("record");
    assert_eq!(record.state, DepositState::Completed);
    assert_eq!(record.amount, 2);
    assert_eq!(record.nonce, Some(0));
    assert_eq!(l2.credits(), vec![(0, 1, 2, 0, 2)]);
}

#[tokio::test]
async fn redelivery_never_credits_twice() {
    let (_store, _l1, l2, processor) = setup();
    let event = topup(1, 10, 0, token(0x70), 1, 2, wei(2));

    for _ in 0..3 {
        processor.handle(&event).await.expect("handle");
    }

    assert_eq!(l2.credits().len(), 1);
    assert_eq!(l2.deposit_calls.lock().expect("calls").len(), 1);
}

#[tokio::test]
async fn dust_is_acknowledged_but_never_credited() {
    let (store, _l1, l2, processor) = setup();
    let event = topup(2, 10, 0, token(0x70), 1, 2, U256::exp10(17));

    processor.handle(&event).await.expect("handle");

    let record = store.find_deposit(&tx_hash(2)).expect("find").expect("record");
    assert_eq!(record.state, DepositState::Completed);
    assert_eq!(record.amount, 0);
    assert_eq!(record.nonce, None);
    assert!(l2.deposit_calls.lock().expect("calls").is_empty());
}

#[tokio::test]
async fn exactly_one_whole_unit_is_credited() {
    let (store, _l1, l2, processor) = setup();
    let event = topup(3, 10, 0, token(0x70), 1, 2, U256::exp10(18));

    processor.handle(&event).await.expect("handle");

    assert_eq!(store.find_deposit(&tx_hash(3)).expect("find").expect("record").amount, 1);
    assert_eq!(l2.credits(), vec![(0, 1, 2, 0, 1)]);
}

#[tokio::test]
async fn crash_between_submit_and_mark_is_verified_not_resubmitted() {
    let (store, _l1, l2, processor) = setup();

    // The credit landed on the rollup, but the process died before the
    // record could close.
    let mut record = DepositRecord::new(tx_hash(4), DepositState::InProgress, token(0x70), token(0xbe), 1, 2, 2, 0);
    record.nonce = Some(5);
    assert!(store.insert_deposit_if_absent(&record).expect("seed"));
    l2.seed_credit(5, 1, 2, 0, 2);

    let event = topup(4, 10, 0, token(0x70), 1, 2, wei(2));
    processor.handle(&event).await.expect("handle");

    let record = store.find_deposit(&tx_hash(4)).expect("find").expect("record");
    assert_eq!(record.state, DepositState::Completed);
    assert!(l2.deposit_calls.lock().expect("calls").is_empty());
    assert_eq!(l2.credits().len(), 1);
}

#[tokio::test]
async fn transient_failure_marks_failed_then_retries_with_fresh_nonce() {
    let (store, _l1, l2, processor) = setup();
    l2.fail_deposits.store(1, std::sync::atomic::Ordering::SeqCst);
    let event = topup(5, 10, 0, token(0x70), 1, 2, wei(2));

    processor.handle(&event).await.expect("first delivery");
    let record = store.find_deposit(&tx_hash(5)).expect("find").expect("record");
    assert_eq!(record.state, DepositState::Failed);
    assert_eq!(record.retry_count, 0);
    assert!(l2.credits().is_empty());

    processor.handle(&event).await.expect("second delivery");
    let record = store.find_deposit(&tx_hash(5)).expect("find").expect("record");
    assert_eq!(record.state, DepositState::Completed);
    assert_eq!(record.retry_count, 1);
    assert_eq!(l2.credits().len(), 1);
    assert_eq!(l2.deposit_calls.lock().expect("calls").len(), 2);
}

#[tokio::test]
async fn unknown_token_writes_nothing() {
    let (store, _l1, l2, processor) = setup();
    let event = topup(6, 10, 0, token(0xff), 1, 2, wei(2));

    processor.handle(&event).await.expect("handle");

    assert!(store.find_deposit(&tx_hash(6)).expect("find").is_none());
    assert!(l2.deposit_calls.lock().expect("calls").is_empty());
    assert!(l2.sent_commands.lock().expect("sent").is_empty());
}

#[tokio::test]
async fn missing_nonce_after_pending_is_fatal() {
    let (store, _l1, _l2, processor) = setup();
    let record = DepositRecord::new(tx_hash(7), DepositState::Failed, token(0x70), token(0xbe), 1, 2, 2, 0);
    assert!(record.nonce.is_none());
    assert!(store.insert_deposit_if_absent(&record).expect("seed"));

    let event = topup(7, 10, 0, token(0x70), 1, 2, wei(2));
    let err = processor.handle(&event).await.expect_err("fatal");
    assert!(err.is_fatal());
}
