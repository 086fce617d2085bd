use crate::fixtures::*;
use ethers::types::H256;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use zkbridge_core::application::SettlementPoller;
use zkbridge_core::domain::{SettleStatus, SettlementRecord};
use zkbridge_core::foundation::TaskId;
use zkbridge_core::infrastructure::storage::{MemoryStore, TrackingStore};

fn setup() -> (Arc<MemoryStore>, Arc<MockRollup>, Arc<MockSubmitter>, SettlementPoller) {
    let store = Arc::new(MemoryStore::new());
    let l2 = Arc::new(MockRollup::new());
    let submitter = Arc::new(MockSubmitter::new());
    let poller = SettlementPoller::new(store.clone(), l2.clone(), submitter.clone(), Duration::from_millis(10));
    (store, l2, submitter, poller)
}

fn full_inst() -> Vec<u64> {
    (1..=12).collect()
}

#[tokio::test]
async fn bundle_walks_to_confirmed() {
    let (store, l2, submitter, poller) = setup();
    l2.bundles.lock().expect("bundles").push(bundle("task-a", full_inst()));

    poller.run_round().await.expect("round");

    let record = store.find_settlement(&TaskId::from("task-a")).expect("find").expect("record");
    assert_eq!(record.status, SettleStatus::Confirmed);
    let tx = record.settle_tx_hash.expect("tx hash");
    assert_ne!(tx, H256::zero());
    assert_eq!(submitter.submission_count(), 1);
    assert_eq!(submitter.confirmed.lock().expect("confirmed").as_slice(), &[tx]);

    // Confirmed is terminal: another round does nothing.
    poller.run_round().await.expect("second round");
    assert_eq!(submitter.submission_count(), 1);
}

#[tokio::test]
async fn bundles_settle_in_task_order_and_a_blocker_holds_the_queue() {
    let (store, l2, submitter, poller) = setup();
    // Queue order from the rollup is not trusted; task order is.
    l2.bundles.lock().expect("bundles").push(bundle("task-b", full_inst()));
    l2.bundles.lock().expect("bundles").push(bundle("task-a", full_inst()));
    submitter.revert_confirms.store(1, Ordering::SeqCst);

    poller.run_round().await.expect("first round");

    // task-a was tried first and reverted; task-b was never touched.
    assert_eq!(submitter.submission_count(), 1);
    assert_eq!(submitter.submissions.lock().expect("subs")[0].tx_data, b"task-a".to_vec());
    let a = store.find_settlement(&TaskId::from("task-a")).expect("find").expect("record");
    assert_eq!(a.status, SettleStatus::Failed);
    assert!(store.find_settlement(&TaskId::from("task-b")).expect("find").is_none());

    poller.run_round().await.expect("second round");

    let order: Vec<Vec<u8>> = submitter.submissions.lock().expect("subs").iter().map(|p| p.tx_data.clone()).collect();
    assert_eq!(order, vec![b"task-a".to_vec(), b"task-a".to_vec(), b"task-b".to_vec()]);
    assert_eq!(store.find_settlement(&TaskId::from("task-a")).expect("find").expect("record").status, SettleStatus::Confirmed);
    assert_eq!(store.find_settlement(&TaskId::from("task-b")).expect("find").expect("record").status, SettleStatus::Confirmed);
}

#[tokio::test]
async fn short_instance_array_blocks_without_advancing() {
    let (store, l2, submitter, poller) = setup();
    l2.bundles.lock().expect("bundles").push(bundle("task-a", (1..=8).collect()));
    l2.bundles.lock().expect("bundles").push(bundle("task-b", full_inst()));

    poller.run_round().await.expect("round");

    assert_eq!(submitter.submission_count(), 0);
    let record = store.find_settlement(&TaskId::from("task-a")).expect("find").expect("record");
    assert_eq!(record.status, SettleStatus::Unsubmitted);
    // The broken bundle blocks its successors too.
    assert!(store.find_settlement(&TaskId::from("task-b")).expect("find").is_none());
}

#[tokio::test]
async fn failed_submission_is_retried_next_round() {
    let (store, l2, submitter, poller) = setup();
    l2.bundles.lock().expect("bundles").push(bundle("task-a", full_inst()));
    submitter.fail_submits.store(1, Ordering::SeqCst);

    poller.run_round().await.expect("first round");
    assert_eq!(store.find_settlement(&TaskId::from("task-a")).expect("find").expect("record").status, SettleStatus::Failed);

    poller.run_round().await.expect("second round");
    assert_eq!(store.find_settlement(&TaskId::from("task-a")).expect("find").expect("record").status, SettleStatus::Confirmed);
}

#[tokio::test]
async fn broadcast_hash_from_a_previous_run_is_confirmed_not_resubmitted() {
    let (store, l2, submitter, poller) = setup();
    l2.bundles.lock().expect("bundles").push(bundle("task-a", full_inst()));

    let mut record =
        SettlementRecord::new(TaskId::from("task-a"), bundle("task-a", full_inst()).merkle_root, vec![]);
    record.status = SettleStatus::Submitted;
    record.settle_tx_hash = Some(H256::from_low_u64_be(0x99));
    assert!(store.insert_settlement_if_absent(&record).expect("seed"));

    poller.run_round().await.expect("round");

    assert_eq!(submitter.submission_count(), 0);
    assert_eq!(submitter.confirmed.lock().expect("confirmed").as_slice(), &[H256::from_low_u64_be(0x99)]);
    assert_eq!(store.find_settlement(&TaskId::from("task-a")).expect("find").expect("record").status, SettleStatus::Confirmed);
}

#[tokio::test]
async fn placeholder_hash_from_a_dead_run_is_resubmitted() {
    let (store, l2, submitter, poller) = setup();
    l2.bundles.lock().expect("bundles").push(bundle("task-a", full_inst()));

    // Durable `submitted` marker written, process died before broadcast.
    let mut record =
        SettlementRecord::new(TaskId::from("task-a"), bundle("task-a", full_inst()).merkle_root, vec![]);
    record.status = SettleStatus::Submitted;
    record.settle_tx_hash = Some(H256::zero());
    assert!(store.insert_settlement_if_absent(&record).expect("seed"));

    poller.run_round().await.expect("first round");
    assert_eq!(store.find_settlement(&TaskId::from("task-a")).expect("find").expect("record").status, SettleStatus::Failed);
    assert_eq!(submitter.submission_count(), 0);

    poller.run_round().await.expect("second round");
    assert_eq!(store.find_settlement(&TaskId::from("task-a")).expect("find").expect("record").status, SettleStatus::Confirmed);
    assert_eq!(submitter.submission_count(), 1);
}
